//! High-level operations: conditional get, write-through put, bulk pull.
//!
//! # Responsibilities
//! - Keep the mirror under `files_dir` coherent with the remote store, using the
//!   cache index to avoid content transfers when the remote marker is unchanged.
//! - Remote confirmation always precedes the local write and the index update,
//!   so the index never points at content the remote does not have.
//! - `pull` fans out over [`run_bounded`]; the index is saved once, after all
//!   units have finished or the batch has failed.
//!
//! # Error Handling
//! Every remote and filesystem failure propagates to the caller. In `pull` the
//! first failed unit fails the whole batch.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, error, info};

use crate::cache_index::{CacheEntry, CacheIndex, IndexSnapshot};
use crate::config::{Settings, MAX_BYTES};
use crate::contract::{Marker, RemoteStore};
use crate::error::{NorthbaseError, Result};
use crate::executor::run_bounded;
use crate::path::{sanitize, sanitize_prefix, RelativePath};
use crate::session::SessionManager;
use crate::session_store::SessionStore;

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReport {
    pub path: RelativePath,
    pub bytes: usize,
    pub updated_at: Option<Marker>,
}

/// Counters reported by `pull`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullReport {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
}

/// One remote path as reported by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub path: String,
    pub updated_at: Marker,
    /// The cache index records this exact marker.
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Downloaded,
    Skipped,
}

fn ensure_within_limit(bytes: usize) -> Result<()> {
    if bytes > MAX_BYTES {
        return Err(NorthbaseError::FileTooLarge {
            bytes,
            limit: MAX_BYTES,
        });
    }
    Ok(())
}

/// Ties the session manager, the cache index and the mirror together.
pub struct SyncEngine<S> {
    sessions: SessionManager<S>,
    index: CacheIndex,
    files_dir: PathBuf,
    concurrency: usize,
}

impl<S: RemoteStore> SyncEngine<S> {
    pub fn new(
        sessions: SessionManager<S>,
        index: CacheIndex,
        files_dir: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Self {
        Self {
            sessions,
            index,
            files_dir: files_dir.into(),
            concurrency,
        }
    }

    /// Engine over the standard layout of `settings.config_dir`.
    pub fn from_settings(remote: S, settings: &Settings) -> Self {
        let sessions = SessionManager::new(remote, SessionStore::new(settings.session_path()));
        Self::new(
            sessions,
            CacheIndex::new(settings.index_path()),
            settings.files_dir(),
            settings.concurrency,
        )
    }

    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Local mirror location of a sanitized path.
    pub fn local_path(&self, rel: &RelativePath) -> PathBuf {
        rel.under(&self.files_dir)
    }

    async fn read_local(&self, rel: &RelativePath) -> Result<Option<Vec<u8>>> {
        let full = self.local_path(rel);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NorthbaseError::io(full, e)),
        }
    }

    async fn write_local(&self, rel: &RelativePath, content: &[u8]) -> Result<()> {
        let full = self.local_path(rel);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| NorthbaseError::io(parent, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| NorthbaseError::io(full, e))
    }

    /// Fetch full content for `rel`, enforce the size bound, write the mirror.
    /// Returns the content and the entry to record in the index.
    async fn download(&self, remote: &S, rel: &RelativePath) -> Result<(Vec<u8>, CacheEntry)> {
        let file = remote
            .fetch_content(rel.as_str())
            .await?
            .ok_or_else(|| NorthbaseError::RemoteNotFound {
                path: rel.to_string(),
            })?;
        ensure_within_limit(file.content.len())?;
        self.write_local(rel, &file.content).await?;
        let entry = CacheEntry::new(file.marker, file.content.len());
        Ok((file.content, entry))
    }

    /// Return the content at `path`, transferring it only when the local copy
    /// is missing or its cached marker differs from the remote one.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let rel = sanitize(path)?;
        let handle = self.sessions.acquire_handle().await?;
        let mut snapshot = self.index.load();

        let Some(local) = self.read_local(&rel).await? else {
            info!(path = %rel, "GET remote-refresh (no local copy)");
            let (content, entry) = self.download(&handle, &rel).await?;
            snapshot.put(&rel, entry);
            self.index.save(&snapshot)?;
            return Ok(content);
        };

        let Some(remote_marker) = handle.fetch_marker(rel.as_str()).await? else {
            debug!(path = %rel, "Remote has no record, serving local copy");
            return Ok(local);
        };

        if snapshot.get(&rel).is_some_and(|entry| entry.matches(&remote_marker)) {
            info!(path = %rel, "GET local-hit");
            return Ok(local);
        }

        info!(path = %rel, marker = %remote_marker, "GET remote-refresh");
        let (content, entry) = self.download(&handle, &rel).await?;
        snapshot.put(&rel, entry);
        self.index.save(&snapshot)?;
        Ok(content)
    }

    /// Upsert `content` at `path`, then mirror it locally under the marker the
    /// store assigned.
    pub async fn put(&self, path: &str, content: &[u8]) -> Result<PutReport> {
        let rel = sanitize(path)?;
        ensure_within_limit(content.len())?;

        let handle = self.sessions.acquire_handle().await?;
        handle.upsert(rel.as_str(), content).await?;
        let updated_at = handle.fetch_marker(rel.as_str()).await?;

        self.write_local(&rel, content).await?;
        let mut snapshot = self.index.load();
        snapshot.put(&rel, CacheEntry::new(updated_at.clone(), content.len()));
        self.index.save(&snapshot)?;

        info!(path = %rel, bytes = content.len(), updated_at = ?updated_at, "PUT");
        Ok(PutReport {
            path: rel,
            bytes: content.len(),
            updated_at,
        })
    }

    /// Remote paths under `prefix` with a flag for whether the mirror is current.
    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<ListedFile>> {
        let prefix = normalized_prefix(prefix)?;
        let handle = self.sessions.acquire_handle().await?;
        let snapshot = self.index.load();
        let entries = handle.list(prefix).await?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let cached = sanitize(&entry.path)
                    .ok()
                    .and_then(|rel| snapshot.get(&rel).map(|c| c.matches(&entry.marker)))
                    .unwrap_or(false);
                ListedFile {
                    path: entry.path,
                    updated_at: entry.marker,
                    cached,
                }
            })
            .collect())
    }

    /// Bring every remote path under `prefix` into the mirror.
    pub async fn pull(&self, prefix: Option<&str>) -> Result<PullReport> {
        let prefix = normalized_prefix(prefix)?;
        let handle = self.sessions.acquire_handle().await?;
        let listed = handle.list(prefix).await?;
        let mut entries = listed
            .into_iter()
            .map(|entry| Ok((sanitize(&entry.path)?, entry.marker)))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        let total = entries.len();
        info!(total, concurrency = self.concurrency, "Pull starting");

        let snapshot = Mutex::new(self.index.load());
        let remote: &S = &handle;
        let shared = &snapshot;

        let outcome = run_bounded(entries, self.concurrency, move |(rel, marker)| async move {
            let current = shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&rel)
                .is_some_and(|cached| cached.matches(&marker));
            if current {
                debug!(path = %rel, "Pull skip, marker unchanged");
                return Ok(UnitOutcome::Skipped);
            }
            let (_, entry) = self.download(remote, &rel).await?;
            shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .put(&rel, entry);
            debug!(path = %rel, "Pull downloaded");
            Ok::<_, NorthbaseError>(UnitOutcome::Downloaded)
        })
        .await;

        let snapshot: IndexSnapshot = snapshot.into_inner().unwrap_or_else(PoisonError::into_inner);
        self.index.save(&snapshot)?;

        let outcomes = outcome.map_err(|e| {
            error!(error = %e, "Pull failed");
            e
        })?;
        let downloaded = outcomes
            .iter()
            .filter(|o| **o == UnitOutcome::Downloaded)
            .count();
        let report = PullReport {
            total,
            downloaded,
            skipped: total - downloaded,
        };
        info!(?report, "Pull complete");
        Ok(report)
    }
}

fn normalized_prefix(prefix: Option<&str>) -> Result<Option<String>> {
    match prefix {
        None => Ok(None),
        Some(raw) => {
            let cleaned = sanitize_prefix(raw)?;
            Ok((!cleaned.is_empty()).then_some(cleaned))
        }
    }
}
