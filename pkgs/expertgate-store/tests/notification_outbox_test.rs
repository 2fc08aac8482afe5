// Copyright 2025 ExpertGate Team.
//
// Tests for NotificationOutbox

use chrono::Utc;
use expertgate_store::notification_outbox::notification_payload;
use expertgate_store::{NotificationKind, NotificationOutbox, OutboxStatus, StoreConfig, StoreError};
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

fn config(max_attempts: u32) -> StoreConfig {
    StoreConfig {
        max_notification_attempts: max_attempts,
        notification_retry_base_seconds: 30,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_push_is_immediately_due() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let outbox = NotificationOutbox::new(db, &config(3));

    let id = outbox
        .push(
            NotificationKind::Support,
            notification_payload("new_ticket", "ticket", "t-1"),
        )
        .await
        .unwrap();

    let due = outbox.due(10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, id);
    assert_eq!(due[0].kind, NotificationKind::Support);
    assert_eq!(due[0].attempts, 0);
    assert_eq!(due[0].max_attempts, 3);

    outbox.mark_delivered(&id).await.unwrap();
    assert!(outbox.due(10).await.unwrap().is_empty());
    let item = outbox.get(&id).await.unwrap().unwrap();
    assert_eq!(item.status, OutboxStatus::Delivered);
    assert_eq!(item.attempts, 1);
}

#[tokio::test]
async fn test_failure_schedules_backoff() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let outbox = NotificationOutbox::new(db, &config(3));

    let id = outbox
        .push(
            NotificationKind::Connection,
            notification_payload("request", "connection", "c-1"),
        )
        .await
        .unwrap();

    let before = Utc::now();
    let status = outbox.record_failure(&id, "HTTP 503").await.unwrap();
    assert_eq!(status, OutboxStatus::Pending);

    let item = outbox.get(&id).await.unwrap().unwrap();
    assert_eq!(item.attempts, 1);
    assert_eq!(item.last_error.as_deref(), Some("HTTP 503"));
    let delay = item.next_attempt_at - before;
    assert!(delay.num_seconds() >= 29 && delay.num_seconds() <= 31);

    // Not due until the backoff elapses
    assert!(outbox.due(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expires_after_max_attempts() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let outbox = NotificationOutbox::new(db, &config(2));

    let id = outbox
        .push(
            NotificationKind::Interview,
            notification_payload("request", "connection", "c-2"),
        )
        .await
        .unwrap();

    assert_eq!(
        outbox.record_failure(&id, "timeout").await.unwrap(),
        OutboxStatus::Pending
    );
    assert_eq!(
        outbox.record_failure(&id, "timeout").await.unwrap(),
        OutboxStatus::Expired
    );

    let expired = outbox.with_status(OutboxStatus::Expired).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].attempts, 2);

    let removed = outbox
        .cleanup_finished(Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(outbox.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_item() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let outbox = NotificationOutbox::new(db, &config(3));

    let result = outbox.mark_delivered("missing").await;
    assert!(matches!(result, Err(StoreError::NotificationNotFound(_))));
}
