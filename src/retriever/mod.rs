// Retrieval module
// Finds the past turns closest to a new query and renders them as agent context


use std::borrow::Cow;

use tracing::{debug, warn};

use crate::Result;
use crate::embeddings::Embedder;
use crate::extractor::ConversationTurn;
use crate::index::IndexState;

pub const CONTEXT_HEADER: &str = "📚 Relevant Past Conversations:\n";
pub const CONTEXT_FOOTER: &str = "\n---\n";
pub const TRUNCATION_MARKER: &str = "...";

/// How many candidates to fetch per requested result, leaving room for the
/// session filter
const OVERFETCH_FACTOR: usize = 2;

/// A past turn matched by a search. Owns its copy of the stored metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub turn: ConversationTurn,
    /// Squared Euclidean distance to the query; lower is more similar
    pub distance: f32,
}

pub struct Retriever<'a> {
    state: &'a IndexState,
    embedder: &'a dyn Embedder,
    top_k: usize,
}

impl<'a> Retriever<'a> {
    #[inline]
    pub fn new(state: &'a IndexState, embedder: &'a dyn Embedder, top_k: usize) -> Self {
        Self {
            state,
            embedder,
            top_k,
        }
    }

    /// The `top_k` turns nearest to `query`, skipping `exclude_session`
    #[inline]
    pub fn search(&self, query: &str, exclude_session: Option<&str>) -> Result<Vec<SearchResult>> {
        if self.state.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query);
        if embedding.is_degraded() {
            warn!("Searching past conversations with a degraded query embedding");
        }

        self.search_vector(embedding.vector(), exclude_session)
    }

    /// Like [`Retriever::search`] for an already embedded query
    #[inline]
    pub fn search_vector(
        &self,
        query: &[f32],
        exclude_session: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let candidates = self
            .state
            .vectors()
            .search(query, self.top_k.saturating_mul(OVERFETCH_FACTOR))?;

        let results: Vec<SearchResult> = candidates
            .into_iter()
            .filter_map(|neighbor| {
                self.state.turn(neighbor.row).map(|turn| SearchResult {
                    turn: turn.clone(),
                    distance: neighbor.distance,
                })
            })
            .filter(|result| exclude_session != Some(result.turn.session_id.as_str()))
            .take(self.top_k)
            .collect();

        debug!(
            "Found {} relevant past conversations (excluding {:?})",
            results.len(),
            exclude_session
        );
        Ok(results)
    }
}

/// Render search results as a plain-text block for the agent prompt.
///
/// Answers longer than `max_answer_chars` characters are cut and marked.
#[inline]
pub fn format_context(results: &[SearchResult], max_answer_chars: usize) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut parts: Vec<Cow<'_, str>> = Vec::with_capacity(results.len() * 3 + 2);
    parts.push(Cow::Borrowed(CONTEXT_HEADER));

    for (i, result) in results.iter().enumerate() {
        let turn = &result.turn;
        parts.push(Cow::Owned(format!("\n{}. [{}]", i + 1, turn.date)));
        parts.push(Cow::Owned(format!("   Query: {}", turn.query)));
        parts.push(Cow::Owned(format!(
            "   Answer: {}",
            truncate_answer(&turn.answer, max_answer_chars)
        )));
    }

    parts.push(Cow::Borrowed(CONTEXT_FOOTER));
    parts.join("\n")
}

/// The first `max_chars` characters of `answer`, followed by the truncation
/// marker if anything was cut
#[inline]
pub fn truncate_answer(answer: &str, max_chars: usize) -> Cow<'_, str> {
    match answer.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let (kept, _) = answer.split_at(cut);
            Cow::Owned(format!("{}{}", kept, TRUNCATION_MARKER))
        }
        None => Cow::Borrowed(answer),
    }
}
