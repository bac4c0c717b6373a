
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Hex-encoded SHA-256 of a file's raw bytes
#[inline]
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Key under which a file's fingerprint is tracked.
///
/// Canonicalized when possible so the same log reached through different
/// relative paths is tracked once.
#[inline]
pub fn tracking_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Remembers the content fingerprint each session log had when it was last indexed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeTracker {
    fingerprints: BTreeMap<String, String>,
}

impl ChangeTracker {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_unchanged(&self, key: &str, fingerprint: &str) -> bool {
        self.fingerprints
            .get(key)
            .is_some_and(|known| known == fingerprint)
    }

    #[inline]
    pub fn record(&mut self, key: String, fingerprint: String) {
        self.fingerprints.insert(key, fingerprint);
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fingerprints.get(key).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}
