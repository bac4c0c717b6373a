// Conversation memory handle
// Entry points the agent loop uses: open or build the index, then search it for context


use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::Result;
use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::index::{IndexState, IndexStore};
use crate::indexer::{IndexReport, Indexer};
use crate::retriever::{Retriever, SearchResult, format_context};

/// Statistics about the loaded index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_conversations: usize,
    pub index_size: usize,
    pub dimension: Option<usize>,
    pub cached_files: usize,
    pub index_file_exists: bool,
    pub metadata_file_exists: bool,
}

/// Long-term memory over past agent sessions.
///
/// Owns the index state exclusively. Indexing needs `&mut self`, searching
/// `&self`; share a handle between threads behind a single lock.
pub struct ConversationMemory {
    config: Config,
    store: IndexStore,
    state: IndexState,
    embedder: Box<dyn Embedder>,
}

/// Open the memory index and, with `auto_index`, bring it up to date with
/// the configured session log directory.
///
/// A failed indexing pass is logged and the handle is still returned.
#[inline]
pub fn initialize(config: Config, auto_index: bool) -> Result<ConversationMemory> {
    let mut memory = ConversationMemory::open(config)?;

    if auto_index {
        if let Err(e) = memory.index_all(false) {
            warn!("Conversation indexing failed, continuing with loaded index: {}", e);
        }
    }

    Ok(memory)
}

impl ConversationMemory {
    /// Open the index described by `config`, embedding through Ollama
    #[inline]
    pub fn open(config: Config) -> Result<Self> {
        let client =
            OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
        Self::with_embedder(config, Box::new(client))
    }

    /// Open the index with a caller-supplied embedder
    #[inline]
    pub fn with_embedder(config: Config, embedder: Box<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        let store = IndexStore::open(&config.memory.index_dir)?;
        let state = store.load();

        Ok(Self {
            config,
            store,
            state,
            embedder,
        })
    }

    /// Incrementally index the configured session log directory
    #[inline]
    pub fn index_all(&mut self, force: bool) -> Result<IndexReport> {
        let root = self.config.memory.memory_dir.clone();
        self.index_directory(&root, force)
    }

    /// Incrementally index `root`, persisting the snapshot if anything changed
    #[inline]
    pub fn index_directory(&mut self, root: &Path, force: bool) -> Result<IndexReport> {
        let report = Indexer::new(&mut self.state, self.embedder.as_ref(), &self.config.memory)
            .index_all(root, force);

        if report.has_changes() {
            self.store.persist(&self.state)?;
        }

        Ok(report)
    }

    /// Past turns most relevant to `query`, excluding `exclude_session`
    #[inline]
    pub fn search(&self, query: &str, exclude_session: Option<&str>) -> Result<Vec<SearchResult>> {
        self.retriever().search(query, exclude_session)
    }

    #[inline]
    pub fn format_context(&self, results: &[SearchResult]) -> String {
        format_context(results, self.config.memory.answer_preview_chars)
    }

    /// Search and render in one step.
    ///
    /// Never fails: a search error is logged and yields no context.
    #[inline]
    pub fn search_context(
        &self,
        query: &str,
        exclude_session: Option<&str>,
    ) -> (Vec<SearchResult>, String) {
        match self.search(query, exclude_session) {
            Ok(results) => {
                let context = self.format_context(&results);
                if !results.is_empty() {
                    info!("Found {} relevant past conversations", results.len());
                }
                (results, context)
            }
            Err(e) => {
                error!("Search error: {}", e);
                (Vec::new(), String::new())
            }
        }
    }

    #[inline]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_conversations: self.state.len(),
            index_size: self.state.vectors().len(),
            dimension: self.state.dimension(),
            cached_files: self.state.tracker().len(),
            index_file_exists: self.store.index_file_exists(),
            metadata_file_exists: self.store.metadata_file_exists(),
        }
    }

    #[inline]
    pub fn state(&self) -> &IndexState {
        &self.state
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn retriever(&self) -> Retriever<'_> {
        Retriever::new(&self.state, self.embedder.as_ref(), self.config.memory.top_k)
    }
}
