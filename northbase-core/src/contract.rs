//! # contract: the remote record store seen from the client
//!
//! This module defines the single trait ([`RemoteStore`]) through which northbase
//! talks to the remote, authenticated store of files keyed by path, plus the
//! plain data types that cross that boundary.
//!
//! ## Interface
//! - Authentication: `authenticate`, `refresh`, `apply_session`, `sign_out`.
//! - Records: `fetch_marker`, `fetch_content`, `upsert`, `list`.
//! - All methods are async and return [`RemoteError`] on failure.
//! - `apply_session` binds a credential to the client; record operations made
//!   afterwards run as that user. Implementations keep that state behind
//!   interior mutability so the trait stays `&self` and shareable.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so tests (and downstream crates with
//!   the `test-export-mocks` feature) get a `MockRemoteStore`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::RemoteError;

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Opaque last-modified token for a remote path. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(pub String);

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Marker {
    fn from(s: &str) -> Self {
        Marker(s.to_string())
    }
}

/// Identity of the signed-in user, as far as the client cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Access + refresh token pair with its expiry.
///
/// Unknown fields are ignored on read, so session files holding a complete
/// auth response still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Seconds since the epoch; 0 when the server never told us.
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserIdentity>,
}

impl Session {
    /// Both tokens are present.
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }

    /// Bring `expires_at` to seconds.
    pub fn normalized(mut self) -> Self {
        if self.expires_at > MILLIS_THRESHOLD {
            self.expires_at /= 1000;
        }
        self
    }
}

/// One row of a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub path: String,
    pub marker: Marker,
}

/// Full content of a remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    pub marker: Option<Marker>,
}

/// Remote, authenticated record store keyed by path.
///
/// Implemented by the HTTP client in the CLI crate and by `MockRemoteStore` in
/// tests. The trait is `Send + Sync` and intended for async/await usage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Exchange email and password for a fresh session.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, RemoteError>;

    /// Exchange a refresh token for a new session. The returned refresh token
    /// may differ from the one passed in.
    ///
    /// Must return [`RemoteError::InvalidGrant`] when the token itself is rejected.
    async fn refresh(&self, refresh_token: &str) -> Result<Session, RemoteError>;

    /// Bind the tokens to this client after checking them with the auth server.
    ///
    /// Must return [`RemoteError::InvalidSession`] when the access token is rejected.
    async fn apply_session(&self, access_token: &str, refresh_token: &str)
        -> Result<(), RemoteError>;

    /// Current marker for a path, or `None` when the remote has no such record.
    async fn fetch_marker(&self, path: &str) -> Result<Option<Marker>, RemoteError>;

    /// Content and marker for a path, or `None` when the remote has no such record.
    async fn fetch_content(&self, path: &str) -> Result<Option<RemoteFile>, RemoteError>;

    /// Insert or replace the record at `path`.
    async fn upsert(&self, path: &str, content: &[u8]) -> Result<(), RemoteError>;

    /// All records (optionally only those whose path starts with `prefix`),
    /// ordered by path.
    async fn list(&self, prefix: Option<String>) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// End the remote session.
    async fn sign_out(&self) -> Result<(), RemoteError>;
}
