use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a [`crate::contract::RemoteStore`] implementation.
///
/// The session manager branches on `InvalidGrant` and `InvalidSession`; every
/// other variant is propagated as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The refresh token itself is invalid, expired or already used.
    #[error("refresh token rejected: {0}")]
    InvalidGrant(String),

    /// The access token was rejected by the remote authentication check.
    #[error("session rejected: {0}")]
    InvalidSession(String),

    /// Credentials were rejected during a sign-in exchange.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request never produced a usable response (connect, timeout, 5xx).
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered but refused the operation.
    #[error("store error: {0}")]
    Store(String),

    /// The response body could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether retrying the same call later could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

/// Error type shared by every northbase operation.
#[derive(Error, Debug)]
pub enum NorthbaseError {
    /// Path rejected by the sanitizer.
    #[error("Unsafe path: {path:?}")]
    InvalidPath { path: String },

    /// No usable local session.
    #[error("Not logged in. Run `northbase login`.")]
    NotAuthenticated,

    /// Refresh token rejected; the local session has been removed.
    #[error("Session expired or revoked. Run `northbase login` again.")]
    SessionRevoked,

    /// Refresh failed for a reason unrelated to the token; the local session is intact.
    #[error("Session refresh failed, try again: {reason}")]
    SessionRefreshFailed { reason: String },

    /// Any other remote store failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Content exceeds the transfer bound.
    #[error("File too large ({bytes} bytes, limit {limit})")]
    FileTooLarge { bytes: usize, limit: usize },

    /// The remote has no record for a path that had to be fetched.
    #[error("No remote file at {path}")]
    RemoteNotFound { path: String },

    /// A credential without both tokens was about to be persisted.
    #[error("Refusing to store a session without both access and refresh tokens")]
    IncompleteSession,

    /// Filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization failed.
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl NorthbaseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NorthbaseError::Io {
            path: path.into(),
            source,
        }
    }

    /// Transient failures the user may simply retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            NorthbaseError::SessionRefreshFailed { .. } => true,
            NorthbaseError::Remote(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NorthbaseError>;
