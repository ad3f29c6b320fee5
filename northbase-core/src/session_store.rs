use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::contract::Session;
use crate::error::{NorthbaseError, Result};
use crate::fsutil::write_atomic;

/// Owner of the on-disk session file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. Missing, unreadable and incomplete files all
    /// count as not logged in.
    pub fn load(&self) -> Result<Session> {
        let raw = std::fs::read(&self.path).map_err(|e| {
            debug!(path = %self.path.display(), error = %e, "No session file");
            NorthbaseError::NotAuthenticated
        })?;
        let session: Session = serde_json::from_slice(&raw).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Unreadable session file");
            NorthbaseError::NotAuthenticated
        })?;
        if !session.is_complete() {
            warn!(path = %self.path.display(), "Session file lacks a token");
            return Err(NorthbaseError::NotAuthenticated);
        }
        Ok(session.normalized())
    }

    /// Normalize and persist `session` with owner-only permissions.
    /// Returns what was written.
    pub fn save(&self, session: &Session) -> Result<Session> {
        let session = session.clone().normalized();
        if !session.is_complete() {
            return Err(NorthbaseError::IncompleteSession);
        }
        let json = serde_json::to_vec_pretty(&session)?;
        write_atomic(&self.path, &json, true)?;
        debug!(path = %self.path.display(), expires_at = session.expires_at, "Saved session");
        Ok(session)
    }

    /// Remove the session file. Absence is not an error.
    pub fn delete(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Deleted session"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not delete session file"),
        }
    }
}
