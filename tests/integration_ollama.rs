#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance with the configured models pulled
// Run with: cargo test --test integration_ollama -- --ignored

use std::env;
use std::time::Duration;
use synapse::config::OllamaConfig;
use synapse::embeddings::{EmbeddingProvider, OllamaClient, OllamaEmbedder};
use synapse::generation::{GenerativeModel, OllamaGenerator};
use tracing::info;

fn integration_config() -> OllamaConfig {
    let mut config = OllamaConfig::default();
    if let Ok(host) = env::var("OLLAMA_HOST") {
        config.host = host;
    }
    if let Some(port) = env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    config
}

fn create_integration_test_client() -> OllamaClient {
    OllamaClient::new(&integration_config())
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(120))
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Ollama instance"]
async fn real_ollama_embeddings_have_configured_dimension() {
    init_test_tracing();
    let config = integration_config();

    let embedder = OllamaEmbedder::connect(
        create_integration_test_client(),
        config.embedding_dimension as usize,
    )
    .await
    .expect("embedding model should load");

    let texts = vec![
        "The sky is blue.".to_string(),
        "Grass is green.".to_string(),
    ];
    let first = embedder.embed_batch(&texts).await.expect("should embed");
    let second = embedder.embed_batch(&texts).await.expect("should embed");

    info!("Embedded {} texts", first.len());
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|v| v.len() == config.embedding_dimension as usize));
    assert_eq!(first, second, "embeddings should be deterministic");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Ollama instance"]
async fn real_ollama_generation_is_deterministic() {
    init_test_tracing();
    let generator = OllamaGenerator::new(create_integration_test_client());
    let prompt = "Answer with a single word. What color is a clear daytime sky?";

    let first = generator.generate(prompt).await.expect("should generate");
    let second = generator.generate(prompt).await.expect("should generate");

    info!("Model answered: {}", first);
    assert!(!first.trim().is_empty());
    assert_eq!(first, second);
}
