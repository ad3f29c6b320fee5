//! Session lifecycle: load, validate, refresh and rotate the stored credential.
//!
//! Per invocation a credential moves through
//! `Unloaded -> Loaded -> {Valid, NeedsRefresh} -> Refreshed | RevokedFailed`.
//! [`SessionManager::acquire_handle`] is the only way the rest of the crate
//! gets at the remote store.

use std::ops::Deref;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::contract::{RemoteStore, Session, UserIdentity};
use crate::error::{NorthbaseError, RemoteError, Result};
use crate::session_store::SessionStore;

/// Sessions expiring within this many seconds are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Outcome of the local expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Valid,
    NeedsRefresh,
}

/// Decide from the expiry alone whether `session` must be refreshed at `now`.
pub fn freshness(session: &Session, now: i64) -> Freshness {
    if session.expires_at == 0 || session.expires_at.saturating_sub(now) <= REFRESH_MARGIN_SECS {
        Freshness::NeedsRefresh
    } else {
        Freshness::Valid
    }
}

/// Local view of the stored session, no network involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub user: Option<UserIdentity>,
    pub expires_at: i64,
    pub seconds_remaining: i64,
    pub freshness: Freshness,
}

/// Remote store access bound to the session actually in use.
pub struct AuthenticatedHandle<'a, S: ?Sized> {
    remote: &'a S,
    session: Session,
}

impl<'a, S: ?Sized> AuthenticatedHandle<'a, S> {
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl<S: ?Sized> Deref for AuthenticatedHandle<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.remote
    }
}

pub struct SessionManager<S> {
    remote: S,
    store: SessionStore,
}

impl<S: RemoteStore> SessionManager<S> {
    pub fn new(remote: S, store: SessionStore) -> Self {
        Self { remote, store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Load the stored session, refresh it if needed, and bind it to the remote.
    ///
    /// On success the session file holds exactly the tokens the handle uses.
    pub async fn acquire_handle(&self) -> Result<AuthenticatedHandle<'_, S>> {
        let stored = self.store.load()?;

        match freshness(&stored, now_epoch_seconds()) {
            Freshness::Valid => {
                match self
                    .remote
                    .apply_session(&stored.access_token, &stored.refresh_token)
                    .await
                {
                    Ok(()) => {
                        debug!(expires_at = stored.expires_at, "Stored session accepted");
                        Ok(self.handle(stored))
                    }
                    Err(RemoteError::InvalidSession(reason)) => {
                        info!(%reason, "Stored session rejected, refreshing");
                        self.refresh(&stored).await
                    }
                    Err(e) => {
                        warn!(error = %e, "Session check failed, keeping local session");
                        Err(e.into())
                    }
                }
            }
            Freshness::NeedsRefresh => {
                info!(expires_at = stored.expires_at, "Session expiring, refreshing");
                self.refresh(&stored).await
            }
        }
    }

    async fn refresh(&self, stored: &Session) -> Result<AuthenticatedHandle<'_, S>> {
        let fresh = match self.remote.refresh(&stored.refresh_token).await {
            Ok(fresh) => fresh,
            Err(RemoteError::InvalidGrant(reason)) => {
                warn!(%reason, "Refresh token rejected, removing local session");
                self.store.delete();
                return Err(NorthbaseError::SessionRevoked);
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, keeping local session");
                return Err(NorthbaseError::SessionRefreshFailed {
                    reason: e.to_string(),
                });
            }
        };

        let mut fresh = fresh;
        if fresh.user.is_none() {
            fresh.user = stored.user.clone();
        }
        let saved = self.store.save(&fresh)?;
        if saved.refresh_token != stored.refresh_token {
            debug!("Refresh token rotated");
        }

        self.remote
            .apply_session(&saved.access_token, &saved.refresh_token)
            .await?;
        info!(expires_at = saved.expires_at, "Session refreshed");
        Ok(self.handle(saved))
    }

    fn handle(&self, session: Session) -> AuthenticatedHandle<'_, S> {
        AuthenticatedHandle {
            remote: &self.remote,
            session,
        }
    }

    /// Sign in with email and password, replacing any stored session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.remote.authenticate(email, password).await?;
        let saved = self.store.save(&session)?;
        info!(email, "Logged in");
        Ok(saved)
    }

    /// Best-effort remote sign-out, then unconditional local removal.
    pub async fn logout(&self) {
        match self.acquire_handle().await {
            Ok(handle) => {
                if let Err(e) = handle.sign_out().await {
                    debug!(error = %e, "Remote sign-out failed, ignoring");
                }
            }
            Err(e) => debug!(error = %e, "No usable session to sign out remotely"),
        }
        self.store.delete();
        info!("Logged out");
    }

    /// Stored user, without touching the network.
    pub fn whoami(&self) -> Result<Option<UserIdentity>> {
        Ok(self.store.load()?.user)
    }

    /// Local session status, without touching the network.
    pub fn status(&self) -> Result<SessionStatus> {
        let stored = self.store.load()?;
        let now = now_epoch_seconds();
        Ok(SessionStatus {
            user: stored.user.clone(),
            expires_at: stored.expires_at,
            seconds_remaining: stored.expires_at.saturating_sub(now),
            freshness: freshness(&stored, now),
        })
    }
}
