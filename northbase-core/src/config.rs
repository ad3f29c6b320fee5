use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Worker pool width used by `pull` when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Largest file, in bytes, that is fetched or pushed.
pub const MAX_BYTES: usize = 500_000;

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the session, the cache index and the mirror.
    pub config_dir: PathBuf,
    pub concurrency: usize,
    pub debug: bool,
}

impl Settings {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            debug: false,
        }
    }

    /// Root of the mirrored file tree.
    pub fn files_dir(&self) -> PathBuf {
        self.config_dir.join("files")
    }

    pub fn index_path(&self) -> PathBuf {
        self.config_dir.join("index.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.config_dir.join("session.json")
    }

    pub fn trace_loaded(&self) {
        info!(
            config_dir = %self.config_dir.display(),
            concurrency = self.concurrency,
            "Loaded settings"
        );
        debug!(?self, "Settings loaded (full debug)");
    }
}
