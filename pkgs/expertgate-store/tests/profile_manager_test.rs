// Copyright 2025 ExpertGate Team.
//
// Tests for ProfileManager

use expertgate_store::{
    ChangeFeed, NotificationKind, NotificationOutbox, OutboxStatus, ProfileDetails,
    ProfileManager, Role, StoreConfig, StoreError, VerificationStatus,
};
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
async fn test_create_and_update_profile() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let manager = ProfileManager::new(db, ChangeFeed::default(), &StoreConfig::default());

    let researcher = manager.create("r1", "Rita", Role::Researcher).await.unwrap();
    assert_eq!(researcher.verification_status, VerificationStatus::Verified);
    assert!(!researcher.is_verified_expert());

    let expert = manager.create("e1", "Eli", Role::Expert).await.unwrap();
    assert_eq!(expert.verification_status, VerificationStatus::Pending);

    let updated = manager
        .update_details(
            "r1",
            ProfileDetails {
                institution: Some("MIT".to_string()),
                bio: Some("Biologist".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name, "Rita");
    assert_eq!(updated.institution.as_deref(), Some("MIT"));
    assert_eq!(updated.bio.as_deref(), Some("Biologist"));
}

#[tokio::test]
async fn test_verification_requires_admin() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let config = StoreConfig::default();
    let manager = ProfileManager::new(db.clone(), ChangeFeed::default(), &config);

    manager.create("e1", "Eli", Role::Expert).await.unwrap();
    manager.create("mod", "Moderator", Role::Researcher).await.unwrap();

    let result = manager.set_verification("mod", "e1", true).await;
    assert!(matches!(result, Err(StoreError::Forbidden(_))));

    manager.set_admin("mod", true).await.unwrap();
    assert_eq!(manager.pending_experts().await.unwrap().len(), 1);

    let verified = manager.set_verification("mod", "e1", true).await.unwrap();
    assert!(verified.is_verified_expert());
    assert!(manager.pending_experts().await.unwrap().is_empty());

    // Already resolved
    let result = manager.set_verification("mod", "e1", false).await;
    assert!(matches!(result, Err(StoreError::InvalidTransition(_))));

    let outbox = NotificationOutbox::new(db, &config);
    let queued = outbox.with_status(OutboxStatus::Pending).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].kind, NotificationKind::ExpertVerification);
    assert_eq!(queued[0].payload["expert_id"], "e1");
}

#[tokio::test]
async fn test_rejected_expert_can_resubmit() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let manager = ProfileManager::new(db, ChangeFeed::default(), &StoreConfig::default());

    manager.create("e1", "Eli", Role::Expert).await.unwrap();
    manager.create("mod", "Moderator", Role::Researcher).await.unwrap();
    manager.set_admin("mod", true).await.unwrap();

    let result = manager.resubmit("e1").await;
    assert!(matches!(result, Err(StoreError::InvalidTransition(_))));

    let rejected = manager.set_verification("mod", "e1", false).await.unwrap();
    assert_eq!(rejected.verification_status, VerificationStatus::Rejected);

    let again = manager.resubmit("e1").await.unwrap();
    assert_eq!(again.verification_status, VerificationStatus::Pending);
}

#[tokio::test]
async fn test_soft_delete_keeps_row() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let manager = ProfileManager::new(db, ChangeFeed::default(), &StoreConfig::default());

    manager.create("r1", "Rita", Role::Researcher).await.unwrap();
    manager.soft_delete("r1").await.unwrap();

    let stored = manager.get("r1").await.unwrap().expect("Row should remain");
    assert!(stored.is_deleted);

    let result = manager.require_active("r1").await;
    assert!(matches!(result, Err(StoreError::ProfileNotFound(_))));

    let result = manager.update_details("r1", ProfileDetails::default()).await;
    assert!(matches!(result, Err(StoreError::ProfileNotFound(_))));
}
