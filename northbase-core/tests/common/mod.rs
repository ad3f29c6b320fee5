#![allow(dead_code)]

use std::path::Path;

use northbase_core::config::Settings;
use northbase_core::contract::{MockRemoteStore, Session, UserIdentity};
use northbase_core::session::now_epoch_seconds;
use northbase_core::session_store::SessionStore;
use northbase_core::synchronise::SyncEngine;

/// Settings rooted at `dir` with the given pool width.
pub fn settings(dir: &Path, concurrency: usize) -> Settings {
    let mut settings = Settings::new(dir);
    settings.concurrency = concurrency;
    settings
}

pub fn session_expiring_in(secs: i64) -> Session {
    Session {
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at: now_epoch_seconds() + secs,
        user: Some(UserIdentity {
            id: Some("user-1".to_string()),
            email: Some("ada@example.com".to_string()),
        }),
    }
}

/// Persist a session valid for an hour.
pub fn seed_valid_session(settings: &Settings) {
    SessionStore::new(settings.session_path())
        .save(&session_expiring_in(3600))
        .expect("seed session");
}

/// Mock that accepts any stored session.
pub fn accepting_remote() -> MockRemoteStore {
    let mut remote = MockRemoteStore::new();
    remote.expect_apply_session().returning(|_, _| Ok(()));
    remote
}

pub fn engine(remote: MockRemoteStore, settings: &Settings) -> SyncEngine<MockRemoteStore> {
    SyncEngine::from_settings(remote, settings)
}
