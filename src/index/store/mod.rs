
use anyhow::{Context, Result as AnyResult};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{ChangeTracker, FlatIndex, IndexState};
use crate::extractor::ConversationTurn;
use crate::{MemoryError, Result};

pub const INDEX_FILE: &str = "conversations.index";
pub const METADATA_FILE: &str = "conversations_metadata.json";
pub const CACHE_FILE: &str = "index_cache.json";

/// On-disk snapshot of an [`IndexState`].
///
/// Three artifacts live in the index directory: the bincode vector index,
/// the JSON metadata list and the JSON fingerprint cache.
#[derive(Debug, Clone)]
pub struct IndexStore {
    index_dir: PathBuf,
}

impl IndexStore {
    /// Open the store, creating the index directory if needed
    #[inline]
    pub fn open<P: AsRef<Path>>(index_dir: P) -> Result<Self> {
        let index_dir = index_dir.as_ref().to_path_buf();
        fs::create_dir_all(&index_dir).with_context(|| {
            format!(
                "Failed to create index directory: {}",
                index_dir.display()
            )
        })?;
        Ok(Self { index_dir })
    }

    #[inline]
    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.index_dir.join(INDEX_FILE)
    }

    #[inline]
    pub fn metadata_path(&self) -> PathBuf {
        self.index_dir.join(METADATA_FILE)
    }

    #[inline]
    pub fn cache_path(&self) -> PathBuf {
        self.index_dir.join(CACHE_FILE)
    }

    /// Load the snapshot, falling back to an empty state.
    ///
    /// A missing snapshot is normal on first run. An unreadable or
    /// inconsistent one is discarded with a warning; it will be replaced by
    /// the next successful persist.
    #[inline]
    pub fn load(&self) -> IndexState {
        match self.try_load() {
            Ok(Some(state)) => {
                info!("Loaded conversation index with {} entries", state.len());
                state
            }
            Ok(None) => {
                info!("Created new conversation index");
                IndexState::new()
            }
            Err(e) => {
                warn!(
                    "Error loading conversation index from {}: {:#}. Creating new index.",
                    self.index_dir.display(),
                    e
                );
                IndexState::new()
            }
        }
    }

    /// Read all three artifacts.
    ///
    /// Returns `Ok(None)` when the vector index or metadata file is absent.
    /// The fingerprint cache is optional.
    #[inline]
    pub fn try_load(&self) -> AnyResult<Option<IndexState>> {
        let index_path = self.index_path();
        let metadata_path = self.metadata_path();
        if !index_path.exists() || !metadata_path.exists() {
            return Ok(None);
        }

        let vectors = FlatIndex::read_from(BufReader::new(open(&index_path)?))
            .with_context(|| format!("Failed to read {}", index_path.display()))?;

        let metadata: Vec<ConversationTurn> =
            serde_json::from_reader(BufReader::new(open(&metadata_path)?))
                .with_context(|| format!("Failed to parse {}", metadata_path.display()))?;

        let cache_path = self.cache_path();
        let tracker = if cache_path.exists() {
            serde_json::from_reader(BufReader::new(open(&cache_path)?))
                .with_context(|| format!("Failed to parse {}", cache_path.display()))?
        } else {
            ChangeTracker::new()
        };

        let state = IndexState::from_parts(vectors, metadata, tracker)?;
        debug!(
            "Read snapshot: {} rows, dimension {:?}, {} tracked files",
            state.len(),
            state.dimension(),
            state.tracker().len()
        );
        Ok(Some(state))
    }

    /// Write all three artifacts.
    ///
    /// Each artifact is written in full to a temporary sibling first; only
    /// once all three are on disk are they renamed over the live files.
    /// The live files are backed up before the first rename, and if any
    /// rename fails every artifact is rolled back to its previous contents.
    /// Temporaries and backups are removed on any exit.
    #[inline]
    pub fn persist(&self, state: &IndexState) -> Result<()> {
        let mut index = StagedFile::new(self.index_path());
        index.write_with(|w| state.vectors().write_to(w))?;

        let mut metadata = StagedFile::new(self.metadata_path());
        metadata.write_with(|w| {
            serde_json::to_writer_pretty(w, state.metadata()).context("Failed to encode metadata")
        })?;

        let mut cache = StagedFile::new(self.cache_path());
        cache.write_with(|w| {
            serde_json::to_writer_pretty(w, state.tracker())
                .context("Failed to encode fingerprint cache")
        })?;

        let mut staged = [index, metadata, cache];
        let mut backups = staged
            .iter()
            .map(|file| Backup::take(&file.dest))
            .collect::<Result<Vec<_>>>()?;

        for file in &mut staged {
            if let Err(e) = file.commit() {
                warn!("Rolling back conversation index snapshot: {}", e);
                for backup in &mut backups {
                    backup.restore();
                }
                return Err(e);
            }
        }

        info!("Saved conversation index ({} entries)", state.len());
        Ok(())
    }

    #[inline]
    pub fn index_file_exists(&self) -> bool {
        self.index_path().exists()
    }

    #[inline]
    pub fn metadata_file_exists(&self) -> bool {
        self.metadata_path().exists()
    }
}

fn open(path: &Path) -> AnyResult<File> {
    File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

/// A file written under a temporary name and moved into place on commit
struct StagedFile {
    temp: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn new(dest: PathBuf) -> Self {
        Self {
            temp: sibling(&dest, ".tmp"),
            dest,
            committed: false,
        }
    }

    fn write_with<F>(&mut self, write: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> AnyResult<()>,
    {
        let file = File::create(&self.temp)
            .map_err(|e| storage_error("create", &self.temp, &e))?;
        let mut writer = BufWriter::new(file);

        write(&mut writer).map_err(|e| {
            MemoryError::Storage(format!("Failed to write {}: {:#}", self.temp.display(), e))
        })?;
        writer
            .flush()
            .map_err(|e| storage_error("flush", &self.temp, &e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| storage_error("sync", &self.temp, &e))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        fs::rename(&self.temp, &self.dest).map_err(|e| storage_error("rename", &self.temp, &e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// A copy of a live artifact, taken before it is replaced
struct Backup {
    dest: PathBuf,
    copy: Option<PathBuf>,
}

impl Backup {
    fn take(dest: &Path) -> Result<Self> {
        if !dest.exists() {
            return Ok(Self {
                dest: dest.to_path_buf(),
                copy: None,
            });
        }

        let copy = sibling(dest, ".bak");
        if let Err(e) = fs::copy(dest, &copy) {
            let _ = fs::remove_file(&copy);
            return Err(storage_error("back up", dest, &e));
        }
        Ok(Self {
            dest: dest.to_path_buf(),
            copy: Some(copy),
        })
    }

    /// Put the previous contents back. An artifact that did not exist
    /// before is removed.
    fn restore(&mut self) {
        let outcome = match self.copy.take() {
            Some(copy) => fs::rename(&copy, &self.dest),
            None => match fs::remove_file(&self.dest) {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = outcome {
            warn!("Failed to restore {}: {}", self.dest.display(), e);
        }
    }
}

impl Drop for Backup {
    fn drop(&mut self) {
        if let Some(copy) = &self.copy {
            let _ = fs::remove_file(copy);
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn storage_error(action: &str, path: &Path, error: &std::io::Error) -> MemoryError {
    MemoryError::Storage(format!("Failed to {} {}: {}", action, path.display(), error))
}
