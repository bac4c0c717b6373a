// Embeddings module
// Turns conversation text into vectors via an external embedding service

pub mod ollama;


pub use ollama::OllamaClient;

/// Outcome of embedding a piece of text.
///
/// A `Degraded` embedding is the all-zero placeholder produced when the
/// embedding service could not be reached or answered with something
/// unusable. It still has the fallback dimension so the pipeline can keep
/// going, but it carries no semantic signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Generated(Vec<f32>),
    Degraded { vector: Vec<f32>, reason: String },
}

impl Embedding {
    #[inline]
    pub fn degraded(dimension: usize, reason: impl Into<String>) -> Self {
        Self::Degraded {
            vector: vec![0.0; dimension],
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn vector(&self) -> &[f32] {
        match self {
            Self::Generated(vector) | Self::Degraded { vector, .. } => vector,
        }
    }

    #[inline]
    pub fn into_vector(self) -> Vec<f32> {
        match self {
            Self::Generated(vector) | Self::Degraded { vector, .. } => vector,
        }
    }

    #[inline]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Source of embeddings for indexing and retrieval.
///
/// Implementations never fail: any problem reaching the backing model is
/// reported as [`Embedding::Degraded`].
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Embedding;
}
