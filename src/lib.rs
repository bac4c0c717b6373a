use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session log error: {0}")]
    SessionLog(String),

    #[error("Vector dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod config;
pub mod embeddings;
pub mod extractor;
pub mod index;
pub mod indexer;
pub mod memory;
pub mod retriever;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::{ConversationMemory, IndexStats, initialize};
