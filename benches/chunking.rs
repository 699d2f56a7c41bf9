use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use synapse::embeddings::{ChunkingConfig, split_text};

fn sample_document() -> String {
    let paragraph = "Retrieval-augmented generation grounds a language model in your own documents. \
        Text is split into overlapping chunks, each chunk is embedded, and the closest chunks \
        are handed to the model as context when a question arrives.\n\n";
    paragraph.repeat(400)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = sample_document();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| split_text(black_box(&document), black_box(&config)))
    });

    let small = ChunkingConfig::new(200, 20);
    c.bench_function("chunking_small_windows", |b| {
        b.iter(|| split_text(black_box(&document), black_box(&small)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
