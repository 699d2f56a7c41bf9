use thiserror::Error;

pub type Result<T> = std::result::Result<T, SynapseError>;

#[derive(Error, Debug)]
pub enum SynapseError {
    #[error("Unreadable document '{path}': {reason}")]
    UnreadableDocument { path: String, reason: String },

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index write failed: {0}")]
    IndexWriteFailed(String),

    #[error("Index read failed: {0}")]
    IndexReadFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SynapseError {
    /// Whether the failure was caused by the caller's input rather than the service
    #[inline]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<config::ConfigError> for SynapseError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod pipeline;
pub mod server;
