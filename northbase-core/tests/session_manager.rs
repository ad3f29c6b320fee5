mod common;

use std::fs;

use northbase_core::contract::{MockRemoteStore, Session};
use northbase_core::session::{freshness, now_epoch_seconds, Freshness, SessionManager};
use northbase_core::session_store::SessionStore;
use northbase_core::{NorthbaseError, RemoteError};
use tempfile::tempdir;

use common::session_expiring_in;

fn rotated_session() -> Session {
    Session {
        access_token: "access-2".into(),
        refresh_token: "refresh-2".into(),
        expires_at: now_epoch_seconds() + 3600,
        user: None,
    }
}

#[test]
fn test_freshness_thresholds() {
    let now = 1_000_000;
    let at = |expires_at| Session {
        expires_at,
        ..session_expiring_in(0)
    };
    assert_eq!(freshness(&at(0), now), Freshness::NeedsRefresh);
    assert_eq!(freshness(&at(now + 30), now), Freshness::NeedsRefresh);
    assert_eq!(freshness(&at(now + 60), now), Freshness::NeedsRefresh);
    assert_eq!(freshness(&at(now + 61), now), Freshness::Valid);
    assert_eq!(freshness(&at(now + 600), now), Freshness::Valid);
    assert_eq!(freshness(&at(now - 10), now), Freshness::NeedsRefresh);
    assert_eq!(freshness(&at(i64::MIN), now), Freshness::NeedsRefresh);
}

#[tokio::test]
async fn test_acquire_without_session_is_not_authenticated() {
    let dir = tempdir().unwrap();
    let manager = SessionManager::new(
        MockRemoteStore::new(),
        SessionStore::new(dir.path().join("session.json")),
    );
    let err = manager.acquire_handle().await.err().unwrap();
    assert!(matches!(err, NorthbaseError::NotAuthenticated));
}

#[tokio::test]
async fn test_session_far_from_expiry_is_used_without_refresh() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(600)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote.expect_refresh().times(0);
    remote
        .expect_apply_session()
        .times(1)
        .returning(|access: &str, refresh: &str| {
            assert_eq!((access, refresh), ("access-1", "refresh-1"));
            Ok(())
        });

    let manager = SessionManager::new(remote, store);
    let handle = manager.acquire_handle().await.unwrap();
    assert_eq!(handle.session().access_token, "access-1");
}

#[tokio::test]
async fn test_session_near_expiry_is_refreshed_before_use() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(30)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_refresh()
        .times(1)
        .returning(|token: &str| {
            assert_eq!(token, "refresh-1");
            Ok(rotated_session())
        });
    remote
        .expect_apply_session()
        .times(1)
        .returning(|access: &str, _: &str| {
            assert_eq!(access, "access-2", "stale access token applied");
            Ok(())
        });

    let manager = SessionManager::new(remote, store);
    let handle = manager.acquire_handle().await.unwrap();
    assert_eq!(handle.session().refresh_token, "refresh-2");
}

#[tokio::test]
async fn test_unset_expiry_forces_refresh() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    let mut stored = session_expiring_in(0);
    stored.expires_at = 0;
    store.save(&stored).unwrap();

    let mut remote = MockRemoteStore::new();
    remote.expect_refresh().times(1).returning(|_| Ok(rotated_session()));
    remote.expect_apply_session().times(1).returning(|_, _| Ok(()));

    SessionManager::new(remote, store).acquire_handle().await.unwrap();
}

#[tokio::test]
async fn test_rotated_refresh_token_is_persisted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let store = SessionStore::new(&path);
    store.save(&session_expiring_in(10)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote.expect_refresh().times(1).returning(|_| Ok(rotated_session()));
    remote.expect_apply_session().returning(|_, _| Ok(()));

    let manager = SessionManager::new(remote, store.clone());
    manager.acquire_handle().await.unwrap();

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.refresh_token, "refresh-2");
    assert_eq!(reloaded.access_token, "access-2");
    // The user from the previous session is carried over when the refresh
    // response has none.
    assert_eq!(reloaded.user.and_then(|u| u.email).as_deref(), Some("ada@example.com"));
    let raw = fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("refresh-1"), "old refresh token still on disk: {raw}");
}

#[tokio::test]
async fn test_rejected_access_token_falls_back_to_refresh() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(3600)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_apply_session()
        .times(2)
        .returning(|access: &str, _: &str| match access {
            "access-1" => Err(RemoteError::InvalidSession("jwt expired".into())),
            _ => Ok(()),
        });
    remote.expect_refresh().times(1).returning(|_| Ok(rotated_session()));

    let manager = SessionManager::new(remote, store.clone());
    let handle = manager.acquire_handle().await.unwrap();
    assert_eq!(handle.session().access_token, "access-2");
    assert_eq!(store.load().unwrap().access_token, "access-2");
}

#[tokio::test]
async fn test_unreachable_auth_check_keeps_session_without_refresh() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(3600)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_apply_session()
        .times(1)
        .returning(|_, _| Err(RemoteError::Transport("connect timeout".into())));
    remote.expect_refresh().times(0);

    let manager = SessionManager::new(remote, store.clone());
    let err = manager.acquire_handle().await.err().unwrap();
    assert!(matches!(err, NorthbaseError::Remote(RemoteError::Transport(_))));
    assert!(err.is_retryable());
    let kept = store.load().unwrap();
    assert_eq!((kept.access_token.as_str(), kept.refresh_token.as_str()), ("access-1", "refresh-1"));
}

#[tokio::test]
async fn test_revoked_refresh_token_deletes_session() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(5)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_refresh()
        .returning(|_| Err(RemoteError::InvalidGrant("Invalid Refresh Token: Already Used".into())));
    remote.expect_apply_session().times(0);

    let manager = SessionManager::new(remote, store.clone());
    let err = manager.acquire_handle().await.err().unwrap();
    assert!(matches!(err, NorthbaseError::SessionRevoked));
    assert!(!err.is_retryable());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_transient_refresh_failure_keeps_session() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(5)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_refresh()
        .returning(|_| Err(RemoteError::Transport("connection reset".into())));

    let manager = SessionManager::new(remote, store.clone());
    let err = manager.acquire_handle().await.err().unwrap();
    assert!(matches!(err, NorthbaseError::SessionRefreshFailed { .. }));
    assert!(err.is_retryable());
    assert_eq!(store.load().unwrap().refresh_token, "refresh-1");
}

#[tokio::test]
async fn test_login_overwrites_existing_session() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(3600)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_authenticate()
        .times(1)
        .returning(|email: &str, password: &str| {
            assert_eq!((email, password), ("ada@example.com", "hunter2"));
            Ok(Session {
                expires_at: 1_900_000_000_000,
                ..rotated_session()
            })
        });

    let manager = SessionManager::new(remote, store.clone());
    let saved = manager.login("ada@example.com", "hunter2").await.unwrap();
    assert_eq!(saved.expires_at, 1_900_000_000);
    assert_eq!(store.load().unwrap().access_token, "access-2");
}

#[tokio::test]
async fn test_failed_login_leaves_existing_session() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(3600)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_authenticate()
        .returning(|_, _| Err(RemoteError::Auth("Invalid login credentials".into())));

    let manager = SessionManager::new(remote, store.clone());
    let err = manager.login("ada@example.com", "wrong").await.err().unwrap();
    assert!(matches!(err, NorthbaseError::Remote(RemoteError::Auth(_))));
    assert_eq!(store.load().unwrap().access_token, "access-1");
}

#[tokio::test]
async fn test_logout_tolerates_sign_out_failure() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(3600)).unwrap();

    let mut remote = MockRemoteStore::new();
    remote.expect_apply_session().returning(|_, _| Ok(()));
    remote
        .expect_sign_out()
        .times(1)
        .returning(|| Err(RemoteError::Transport("offline".into())));

    let manager = SessionManager::new(remote, store.clone());
    manager.logout().await;
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_logout_without_session_is_clean() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    let mut remote = MockRemoteStore::new();
    remote.expect_sign_out().times(0);

    SessionManager::new(remote, store.clone()).logout().await;
    assert!(!store.path().exists());
}

#[test]
fn test_status_reports_refresh_need_locally() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&session_expiring_in(30)).unwrap();

    let manager = SessionManager::new(MockRemoteStore::new(), store);
    let status = manager.status().unwrap();
    assert_eq!(status.freshness, Freshness::NeedsRefresh);
    assert!(status.seconds_remaining <= 30);
    let user = manager.whoami().unwrap().unwrap();
    assert_eq!(user.id.as_deref(), Some("user-1"));
}

#[test]
fn test_status_tolerates_extreme_expiry() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store
        .save(&Session {
            expires_at: i64::MIN,
            ..session_expiring_in(0)
        })
        .unwrap();

    let status = SessionManager::new(MockRemoteStore::new(), store).status().unwrap();
    assert_eq!(status.freshness, Freshness::NeedsRefresh);
    assert_eq!(status.seconds_remaining, i64::MIN);
}
