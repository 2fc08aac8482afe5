// Copyright 2025 ExpertGate Team.
//
// Tests for SessionTracker

use expertgate_store::{ChangeFeed, ProfileManager, Role, StoreConfig, StoreError};
use expertgate_sync::{SessionTracker, SyncError};
use sea_orm::DatabaseConnection;
use tempfile::NamedTempFile;

async fn create_test_db(path: &tempfile::NamedTempFile) -> DatabaseConnection {
    let db = sea_orm::Database::connect(&format!(
        "sqlite:{}?mode=rwc",
        path.path().to_str().unwrap().replace("\\", "/")
    ))
    .await
    .expect("Failed to connect to database");

    <expertgate_store::migration::Migrator as expertgate_store::migration::MigratorTrait>::up(
        &db, None,
    )
    .await
    .expect("Failed to run migrations");

    db
}

#[tokio::test]
async fn test_sign_in_and_out() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let profiles = ProfileManager::new(db, ChangeFeed::default(), &StoreConfig::default());
    profiles.create("alice", "Alice", Role::Researcher).await.unwrap();

    let tracker = SessionTracker::new(profiles);
    let mut watcher = tracker.watch();
    assert!(matches!(tracker.current(), Err(SyncError::NotLoggedIn)));

    let session = tracker.sign_in("alice").await.unwrap();
    assert_eq!(session.user_id, "alice");
    assert_eq!(tracker.current().unwrap(), session);

    watcher.changed().await.unwrap();
    assert_eq!(watcher.borrow().as_ref().map(|s| s.user_id.clone()), Some("alice".to_string()));

    tracker.sign_out();
    assert!(matches!(tracker.current(), Err(SyncError::NotLoggedIn)));
    watcher.changed().await.unwrap();
    assert!(watcher.borrow().is_none());
}

#[tokio::test]
async fn test_unknown_or_deleted_profile_cannot_sign_in() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let profiles = ProfileManager::new(db, ChangeFeed::default(), &StoreConfig::default());
    profiles.create("gone", "Gone", Role::Expert).await.unwrap();
    profiles.soft_delete("gone").await.unwrap();

    let tracker = SessionTracker::new(profiles);
    for id in ["nobody", "gone"] {
        let result = tracker.sign_in(id).await;
        assert!(matches!(
            result,
            Err(SyncError::Store(StoreError::ProfileNotFound(_)))
        ));
    }
    assert!(tracker.current().is_err());
}
