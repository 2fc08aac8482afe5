// Copyright 2025 ExpertGate Team.
//
// Tests for PendingRequestAggregator

use expertgate_store::{
    ChangeFeed, ConnectionStore, ConnectionType, ProfileManager, Role, StoreConfig,
};
use expertgate_sync::{PendingRequestAggregator, Session};
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

async fn setup(db: &DatabaseConnection, feed: &ChangeFeed) -> (ProfileManager, ConnectionStore) {
    let config = StoreConfig::default();
    let profiles = ProfileManager::new(db.clone(), feed.clone(), &config);
    for (id, name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")] {
        profiles.create(id, name, Role::Researcher).await.unwrap();
    }
    let connections = ConnectionStore::new(db.clone(), feed.clone(), &config);
    (profiles, connections)
}

#[tokio::test]
async fn test_initial_load_is_silent() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let feed = ChangeFeed::default();
    let (profiles, connections) = setup(&db, &feed).await;

    connections
        .request("alice", "bob", ConnectionType::Friend)
        .await
        .unwrap();
    connections
        .request("carol", "bob", ConnectionType::Friend)
        .await
        .unwrap();

    let aggregator = PendingRequestAggregator::new(Session::new("bob"), connections, profiles);
    assert_eq!(aggregator.count(), 0);

    let notices = aggregator.refresh(true).await.unwrap();
    assert!(notices.is_empty(), "first load must not announce");
    assert_eq!(aggregator.count(), 2);
}

#[tokio::test]
async fn test_live_insert_announces_requester() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let feed = ChangeFeed::default();
    let (profiles, connections) = setup(&db, &feed).await;

    let aggregator =
        PendingRequestAggregator::new(Session::new("bob"), connections.clone(), profiles);
    aggregator.refresh(false).await.unwrap();

    let mut events = feed.subscribe();
    let conn = connections
        .request("alice", "bob", ConnectionType::Friend)
        .await
        .unwrap();
    // Outbound requests from bob are not his to count
    connections
        .request("bob", "carol", ConnectionType::Friend)
        .await
        .unwrap();

    let mut notices = Vec::new();
    while let Ok(event) = events.try_recv() {
        notices.extend(aggregator.apply_change(&event).await.unwrap());
    }

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].connection_id, conn.id);
    assert_eq!(notices[0].connection_type, ConnectionType::Friend);
    assert_eq!(notices[0].requester.id, "alice");
    assert_eq!(notices[0].requester.full_name, "Alice");
    assert_eq!(aggregator.count(), 1);

    // Accepting shrinks the count without a notice
    connections.accept("bob", &conn.id).await.unwrap();
    while let Ok(event) = events.try_recv() {
        assert!(aggregator.apply_change(&event).await.unwrap().is_empty());
    }
    assert_eq!(aggregator.count(), 0);
}

#[tokio::test]
async fn test_failed_requester_lookup_announces_later() {
    use sea_orm::ConnectionTrait;

    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let feed = ChangeFeed::default();
    let (profiles, connections) = setup(&db, &feed).await;

    let aggregator =
        PendingRequestAggregator::new(Session::new("bob"), connections.clone(), profiles);
    aggregator.refresh(false).await.unwrap();

    let conn = connections
        .request("alice", "bob", ConnectionType::Friend)
        .await
        .unwrap();

    // Profile lookups fail while the table is unavailable
    db.execute_unprepared("ALTER TABLE profiles RENAME TO profiles_offline")
        .await
        .unwrap();
    assert!(aggregator.refresh(true).await.is_err());
    assert_eq!(aggregator.count(), 0);

    db.execute_unprepared("ALTER TABLE profiles_offline RENAME TO profiles")
        .await
        .unwrap();
    let notices = aggregator.refresh(true).await.unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].connection_id, conn.id);
    assert_eq!(aggregator.count(), 1);
}
