//! Persisted record of what the mirror holds.
//!
//! The index maps each synchronized path to the remote marker it was fetched
//! or pushed at, so `get` and `pull` can skip content transfers when nothing
//! changed. The file is always rewritten as a whole snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contract::Marker;
use crate::error::Result;
use crate::fsutil::write_atomic;
use crate::path::RelativePath;

/// What the mirror holds for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Marker the local copy corresponds to. `None` never matches a remote marker.
    pub updated_at: Option<Marker>,
    pub bytes: usize,
}

impl CacheEntry {
    pub fn new(updated_at: Option<Marker>, bytes: usize) -> Self {
        Self { updated_at, bytes }
    }

    /// The local copy corresponds to `marker`.
    pub fn matches(&self, marker: &Marker) -> bool {
        self.updated_at.as_ref() == Some(marker)
    }
}

/// In-memory snapshot of the index file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    #[serde(default)]
    files: BTreeMap<String, CacheEntry>,
}

impl IndexSnapshot {
    pub fn get(&self, path: &RelativePath) -> Option<&CacheEntry> {
        self.files.get(path.as_str())
    }

    /// Insert or replace the entry for `path`.
    pub fn put(&mut self, path: &RelativePath, entry: CacheEntry) {
        self.files.insert(path.as_str().to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Handle on the index file.
#[derive(Debug, Clone)]
pub struct CacheIndex {
    path: PathBuf,
}

impl CacheIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing or unparsable file yields an empty index.
    pub fn load(&self) -> IndexSnapshot {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No cache index, starting empty");
                return IndexSnapshot::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable cache index");
                IndexSnapshot::default()
            }
        }
    }

    /// Replace the file with `snapshot`.
    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &json, false)?;
        debug!(path = %self.path.display(), entries = snapshot.len(), "Saved cache index");
        Ok(())
    }
}
