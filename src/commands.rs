use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{info, warn};

use crate::config::Config;
use crate::document::{DocumentParser, ExtensionParser};
use crate::embeddings::{EmbeddingProvider, LazyEmbeddingProvider, OllamaClient, OllamaEmbedder};
use crate::generation::OllamaGenerator;
use crate::index::{LanceIndex, VectorIndex};
use crate::pipeline::{AnsweringEngine, IngestionPipeline};
use crate::server::{self, AppState};

/// Load and validate the configuration stored under `base_dir`
#[inline]
pub fn load_config(base_dir: &Path) -> Result<Config> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Process-wide embedding provider; the Ollama model is connected on first use
#[inline]
pub fn embedding_provider(config: &Config) -> Result<Arc<LazyEmbeddingProvider>> {
    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    let dimension = config.ollama.embedding_dimension as usize;
    let model_name = client.embedding_model().to_string();

    Ok(Arc::new(LazyEmbeddingProvider::new(
        model_name,
        dimension,
        move || {
            let client = client.clone();
            async move {
                OllamaEmbedder::connect(client, dimension)
                    .await
                    .map(|embedder| Arc::new(embedder) as Arc<dyn EmbeddingProvider>)
            }
        },
    )))
}

/// Wire the parser, embedder, index and generator described by `config`
#[inline]
pub async fn build_state(config: &Config) -> Result<AppState> {
    let embedder = embedding_provider(config)?;
    let index: Arc<dyn VectorIndex> = Arc::new(
        LanceIndex::open(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
        )
        .await
        .context("Failed to open vector index")?,
    );
    let generator = Arc::new(OllamaGenerator::new(
        OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?,
    ));

    let pipeline = IngestionPipeline::new(
        Arc::new(ExtensionParser),
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        Arc::clone(&index),
        config.chunking.clone(),
    );
    let engine = AnsweringEngine::new(embedder, Arc::clone(&index), generator)
        .with_top_k(config.retrieval.top_k)
        .with_preview_length(config.retrieval.preview_length);

    Ok(AppState {
        pipeline,
        engine,
        index,
        upload_dir: config.upload_dir(),
    })
}

/// Run the HTTP API until interrupted
#[inline]
pub async fn serve(base_dir: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config(base_dir)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!(
        "Starting Synapse API with embedding model {} and generation model {}",
        config.ollama.embedding_model, config.ollama.generation_model
    );

    let state = Arc::new(build_state(&config).await?);

    eprintln!(
        "{} http://{}:{}",
        style("🚀 Synapse API listening on").bold().green(),
        host,
        port
    );
    eprintln!("Press Ctrl+C to stop the server");

    server::serve(state, &host, port, config.server.max_upload_bytes).await
}

/// Ingest a single document into the vector index
#[inline]
pub async fn ingest(base_dir: &Path, path: &Path, name: Option<String>) -> Result<()> {
    let config = load_config(base_dir)?;
    let state = build_state(&config).await?;
    let source = name.unwrap_or_else(|| {
        path.file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
    });

    let bar = spinner(format!("Ingesting {}", source));
    let result = state.pipeline.ingest_named(path, &source).await;
    bar.finish_and_clear();

    let report = result.with_context(|| format!("Failed to ingest {}", path.display()))?;
    if report.chunks == 0 {
        eprintln!(
            "{}",
            style(format!(
                "⚠ '{}' contained no extractable text; nothing was indexed",
                report.source
            ))
            .yellow()
        );
    } else {
        eprintln!(
            "{} '{}': {} pages, {} chunks",
            style("✓ Indexed").green(),
            report.source,
            report.pages,
            report.chunks
        );
    }

    Ok(())
}

/// Answer a question from the indexed documents
#[inline]
pub async fn ask(base_dir: &Path, question: &str) -> Result<()> {
    let config = load_config(base_dir)?;
    let state = build_state(&config).await?;

    let bar = spinner("Thinking".to_string());
    let result = state.engine.answer(question).await;
    bar.finish_and_clear();

    let answer = result.context("Failed to answer question")?;
    println!("{}", answer.answer);

    if answer.sources.is_empty() {
        eprintln!();
        eprintln!("{}", style("No indexed documents matched this question.").dim());
        return Ok(());
    }

    eprintln!();
    eprintln!("{}", style("Sources:").bold().yellow());
    for (rank, source) in answer.sources.iter().enumerate() {
        eprintln!(
            "  {}. {} (page {}, score {:.3})",
            rank + 1,
            style(&source.source).cyan(),
            source.page,
            source.score
        );
        eprintln!("     {}", style(source.page_content.replace('\n', " ")).dim());
    }

    Ok(())
}

/// Suggest questions worth asking about a document
#[inline]
pub async fn suggest(base_dir: &Path, path: &Path, count: usize) -> Result<()> {
    let config = load_config(base_dir)?;
    let state = build_state(&config).await?;

    let pages = ExtensionParser
        .parse(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = pages.iter().map(|page| page.text.as_str()).join("\n\n");

    let bar = spinner("Reading document".to_string());
    let result = state.engine.suggest_questions(&text, count).await;
    bar.finish_and_clear();

    let questions = result.context("Failed to suggest questions")?;
    if questions.is_empty() {
        warn!("Model returned no usable questions");
    }
    for (i, question) in questions.iter().enumerate() {
        println!("{}. {}", i + 1, question);
    }

    Ok(())
}

/// Report model server and vector index health
#[inline]
pub async fn show_status(base_dir: &Path) -> Result<()> {
    let (config, load_error) = status_config(base_dir);

    eprintln!("{}", style("📊 Synapse Status").bold().cyan());
    eprintln!("{}", "=".repeat(50));
    eprintln!();

    if let Some(problem) = load_error {
        warn!("Ignoring unusable configuration: {}", problem);
        eprintln!(
            "{}",
            style(format!(
                "⚠ Could not load configuration ({}). Showing defaults.",
                problem
            ))
            .yellow()
        );
        eprintln!();
    }

    eprintln!("{}", style("🤖 Ollama:").bold().yellow());
    let client = OllamaClient::new(&config.ollama)?;
    let models = task::spawn_blocking(move || client.list_models()).await?;
    match models {
        Ok(models) => {
            eprintln!(
                "   ✅ Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
            eprintln!(
                "   📋 Embedding model: {} ({} dimensions)",
                config.ollama.embedding_model, config.ollama.embedding_dimension
            );
            eprintln!("   💬 Generation model: {}", config.ollama.generation_model);
            eprintln!(
                "   📦 Available: {}",
                models.iter().map(|m| m.name.as_str()).sorted().join(", ")
            );
        }
        Err(e) => eprintln!("   ❌ Unreachable: {:#}", e),
    }

    eprintln!();
    eprintln!("{}", style("🔍 Vector Index:").bold().yellow());
    let index_path = config.vector_database_path();
    if !index_path.exists() {
        eprintln!("   💤 Empty (nothing ingested yet)");
        return Ok(());
    }

    match LanceIndex::open_existing(&index_path).await {
        Ok(index) => {
            let entries = index.count().await?;
            eprintln!("   ✅ {} entries", entries);
            eprintln!("   🔢 Dimension: {}", index.dimension());
            if index.dimension() != config.ollama.embedding_dimension as usize {
                eprintln!(
                    "   {}",
                    style(format!(
                        "⚠ Configured embedding dimension is {}; queries will fail until they match",
                        config.ollama.embedding_dimension
                    ))
                    .yellow()
                );
            }
        }
        Err(e) => eprintln!("   ❌ {}", e),
    }
    eprintln!("   📁 {}", style(index_path.display()).dim());

    Ok(())
}

/// Configuration for the status report. An unusable `config.toml` falls back to
/// defaults and the load error is returned for display.
fn status_config(base_dir: &Path) -> (Config, Option<String>) {
    match Config::load(base_dir) {
        Ok(config) => (config, None),
        Err(e) => (Config::with_base_dir(base_dir), Some(format!("{:#}", e))),
    }
}

fn spinner(message: String) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}...")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn status_config_reports_unusable_file() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        std::fs::write(temp_dir.path().join("config.toml"), "[ollama\nport = ")
            .expect("should write config file");

        let (config, problem) = status_config(temp_dir.path());

        assert_eq!(config, Config::with_base_dir(temp_dir.path()));
        let problem = problem.expect("broken config should be reported");
        assert!(problem.contains("config.toml"));
    }

    #[test]
    fn status_config_without_file_is_silent() {
        let temp_dir = TempDir::new().expect("should create temp dir");

        let (config, problem) = status_config(temp_dir.path());

        assert_eq!(config.ollama.port, 11434);
        assert!(problem.is_none());
    }
}
