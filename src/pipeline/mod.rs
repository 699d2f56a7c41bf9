// Pipeline module
// Ingestion (parse -> chunk -> embed -> index) and retrieval-augmented answering

pub mod answer;
pub mod ingest;


pub use answer::{Answer, AnsweringEngine, DEFAULT_QUESTION_COUNT, Source};
pub use ingest::{IngestReport, IngestionPipeline};
