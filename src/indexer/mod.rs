// Indexer module
// Incrementally feeds session logs through extraction and embedding into the index


use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::MemoryConfig;
use crate::embeddings::Embedder;
use crate::extractor::{ConversationTurn, extract_from_bytes, session_id_from_path};
use crate::index::{IndexState, fingerprint, tracking_key};
use crate::{MemoryError, Result};

/// Summary of one indexing pass
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Files parsed and appended to the index
    pub files_indexed: usize,
    /// Files skipped because their content had not changed
    pub files_unchanged: usize,
    pub failures: Vec<FileFailure>,
    pub turns_added: usize,
    /// Turns stored with a zero vector because embedding failed
    pub degraded_turns: usize,
}

/// A session log that could not be indexed
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: MemoryError,
}

impl IndexReport {
    /// Whether the pass changed the index state and it needs persisting
    #[inline]
    pub fn has_changes(&self) -> bool {
        self.files_indexed > 0
    }
}

enum FileOutcome {
    Unchanged,
    Indexed { turns: usize, degraded: usize },
}

/// Runs an indexing pass over a directory of session logs.
///
/// Borrows the state mutably for the whole pass, so nothing can search
/// the index while rows are being appended.
pub struct Indexer<'a> {
    state: &'a mut IndexState,
    embedder: &'a dyn Embedder,
    settings: &'a MemoryConfig,
}

impl<'a> Indexer<'a> {
    #[inline]
    pub fn new(
        state: &'a mut IndexState,
        embedder: &'a dyn Embedder,
        settings: &'a MemoryConfig,
    ) -> Self {
        Self {
            state,
            embedder,
            settings,
        }
    }

    /// Every session log under `root`, recursively, in file name order
    #[inline]
    pub fn discover_session_files(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                self.settings
                    .is_session_file(&entry.file_name().to_string_lossy())
            })
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    /// Index every new or changed session log under `root`.
    ///
    /// With `force`, unchanged files are processed again. Turns from a
    /// previous pass over the same file are not removed first.
    #[inline]
    pub fn index_all(&mut self, root: &Path, force: bool) -> IndexReport {
        let mut report = IndexReport::default();

        info!("Scanning conversation history in {}", root.display());
        if !root.is_dir() {
            warn!("Memory directory not found: {}", root.display());
            return report;
        }

        for path in self.discover_session_files(root) {
            match self.index_file(&path, force) {
                Ok(FileOutcome::Unchanged) => report.files_unchanged += 1,
                Ok(FileOutcome::Indexed { turns, degraded }) => {
                    report.files_indexed += 1;
                    report.turns_added += turns;
                    report.degraded_turns += degraded;
                }
                Err(error) => {
                    if matches!(error, MemoryError::DimensionMismatch { .. }) {
                        error!("Not indexing {}: {}", path.display(), error);
                    } else {
                        warn!("Error indexing {}: {}", path.display(), error);
                    }
                    report.failures.push(FileFailure { path, error });
                }
            }
        }

        if report.has_changes() {
            info!(
                "Indexed {} conversations from {} files, skipped {} unchanged",
                report.turns_added, report.files_indexed, report.files_unchanged
            );
        } else {
            info!(
                "No new conversations to index (skipped {})",
                report.files_unchanged
            );
        }
        if report.degraded_turns > 0 {
            warn!(
                "{} turns were indexed without a usable embedding",
                report.degraded_turns
            );
        }

        report
    }

    fn index_file(&mut self, path: &Path, force: bool) -> Result<FileOutcome> {
        let bytes = fs::read(path)?;
        let key = tracking_key(path);
        let current = fingerprint(&bytes);

        if !force && self.state.tracker().is_unchanged(&key, &current) {
            debug!("Unchanged, skipping {}", path.display());
            return Ok(FileOutcome::Unchanged);
        }

        let session_id = session_id_from_path(path);
        let turns = extract_from_bytes(&bytes, &session_id)?;

        let embedded = self.embed_turns(turns)?;
        let degraded = embedded.iter().filter(|(_, is_degraded, _)| *is_degraded).count();
        let count = embedded.len();

        for (turn, _, vector) in embedded {
            self.state.append(turn, &vector)?;
        }
        self.state.tracker_mut().record(key, current);

        debug!(
            "Indexed {} turns from {} ({} degraded)",
            count,
            path.display(),
            degraded
        );
        Ok(FileOutcome::Indexed {
            turns: count,
            degraded,
        })
    }

    /// Embed every turn of a file, checking all of them against the index
    /// dimension before any is appended
    fn embed_turns(
        &self,
        turns: Vec<ConversationTurn>,
    ) -> Result<Vec<(ConversationTurn, bool, Vec<f32>)>> {
        let mut expected = self.state.dimension();
        let mut embedded = Vec::with_capacity(turns.len());

        for turn in turns {
            let embedding = self.embedder.embed(&turn.text);
            let is_degraded = embedding.is_degraded();
            let vector = embedding.into_vector();

            match expected {
                Some(dim) if dim != vector.len() => {
                    return Err(MemoryError::DimensionMismatch {
                        expected: dim,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => {
                    self.state.vectors().check_dimension(vector.len())?;
                    expected = Some(vector.len());
                }
            }

            embedded.push((turn, is_degraded, vector));
        }

        Ok(embedded)
    }
}
