// Shared test fixtures: deterministic embedders and session log writers

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use crate::embeddings::{Embedder, Embedding};
use crate::extractor::{FINAL_ANSWER_MARKER, SESSION_START_MARKER};

/// Looks embeddings up by exact text, degrading for anything unknown
#[derive(Debug, Default)]
pub(crate) struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    fallback_dimension: usize,
    calls: AtomicUsize,
}

impl TableEmbedder {
    pub(crate) fn new(fallback_dimension: usize) -> Self {
        Self {
            fallback_dimension,
            ..Self::default()
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for TableEmbedder {
    fn embed(&self, text: &str) -> Embedding {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table.get(text).map_or_else(
            || Embedding::degraded(self.fallback_dimension, format!("no embedding for {:?}", text)),
            |vector| Embedding::Generated(vector.clone()),
        )
    }
}

/// Embeds text by its length, so every text gets a genuine vector
#[derive(Debug)]
pub(crate) struct LengthEmbedder {
    pub(crate) dimension: usize,
}

impl Embedder for LengthEmbedder {
    fn embed(&self, text: &str) -> Embedding {
        Embedding::Generated(vec![text.len() as f32; self.dimension])
    }
}

/// An embedding service that is always down
#[derive(Debug)]
pub(crate) struct UnavailableEmbedder {
    pub(crate) dimension: usize,
}

impl Embedder for UnavailableEmbedder {
    fn embed(&self, _text: &str) -> Embedding {
        Embedding::degraded(self.dimension, "connection refused")
    }
}

/// Session log records for the given (query, answer, timestamp) turns
pub(crate) fn session_records(turns: &[(&str, &str, f64)]) -> serde_json::Value {
    let mut records = Vec::new();
    for (query, answer, timestamp) in turns {
        records.push(json!({
            "type": "run_metadata",
            "text": format!("{} {}", SESSION_START_MARKER, query),
            "timestamp": timestamp - 1.0,
        }));
        records.push(json!({
            "type": "tool_call",
            "tool": "search_documents",
        }));
        records.push(json!({
            "type": "tool_output",
            "tool_result": { "result": format!("{} {}", FINAL_ANSWER_MARKER, answer) },
            "timestamp": timestamp,
        }));
    }
    serde_json::Value::Array(records)
}

/// Write `<dir>/<session_id>.json` holding the given turns
pub(crate) fn write_session(dir: &Path, session_id: &str, turns: &[(&str, &str, f64)]) -> PathBuf {
    fs::create_dir_all(dir).expect("should create session dir");
    let path = dir.join(format!("{}.json", session_id));
    let body = serde_json::to_string_pretty(&session_records(turns)).expect("encode session");
    fs::write(&path, body).expect("should write session file");
    path
}

/// The searchable text the extractor builds for a turn
pub(crate) fn turn_text(query: &str, answer: &str) -> String {
    format!("Query: {}\nAnswer: {}", query, answer)
}
