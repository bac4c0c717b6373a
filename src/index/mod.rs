// Conversation index state
// Vector rows, their turn metadata and the file change tracker, kept in lockstep

pub mod store;
pub mod tracker;
pub mod vector;


use crate::extractor::ConversationTurn;
use crate::{MemoryError, Result};

pub use store::IndexStore;
pub use tracker::{ChangeTracker, fingerprint, tracking_key};
pub use vector::{FlatIndex, Neighbor};

/// Everything the memory index knows.
///
/// Row `i` of `vectors` is the embedding of `metadata[i]`. Both only grow,
/// and only together through [`IndexState::append`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexState {
    vectors: FlatIndex,
    metadata: Vec<ConversationTurn>,
    tracker: ChangeTracker,
}

impl IndexState {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble state read from a snapshot
    #[inline]
    pub fn from_parts(
        vectors: FlatIndex,
        metadata: Vec<ConversationTurn>,
        tracker: ChangeTracker,
    ) -> Result<Self> {
        if vectors.len() != metadata.len() {
            return Err(MemoryError::Storage(format!(
                "index holds {} vectors but {} metadata entries",
                vectors.len(),
                metadata.len()
            )));
        }

        Ok(Self {
            vectors,
            metadata,
            tracker,
        })
    }

    /// Add one turn with its embedding, returning the new row index
    #[inline]
    pub fn append(&mut self, turn: ConversationTurn, vector: &[f32]) -> Result<usize> {
        let row = self.vectors.add(vector)?;
        self.metadata.push(turn);
        debug_assert_eq!(self.vectors.len(), self.metadata.len());
        Ok(row)
    }

    #[inline]
    pub fn vectors(&self) -> &FlatIndex {
        &self.vectors
    }

    #[inline]
    pub fn metadata(&self) -> &[ConversationTurn] {
        &self.metadata
    }

    #[inline]
    pub fn turn(&self, row: usize) -> Option<&ConversationTurn> {
        self.metadata.get(row)
    }

    #[inline]
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    #[inline]
    pub fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.vectors.dimension()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}
