// Copyright 2025 ExpertGate Team.
//
// Tests for ConversationView

use expertgate_store::{
    ChangeFeed, ConnectionStore, ConnectionType, MessageStore, ProfileManager, Role, StoreConfig,
    StoreError,
};
use expertgate_sync::{ConversationView, Session, SyncError};
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

async fn accepted_connection(
    db: &DatabaseConnection,
    feed: &ChangeFeed,
) -> (ConnectionStore, String) {
    let config = StoreConfig::default();
    let profiles = ProfileManager::new(db.clone(), feed.clone(), &config);
    profiles.create("alice", "Alice", Role::Researcher).await.unwrap();
    profiles.create("bob", "Bob", Role::Expert).await.unwrap();

    let connections = ConnectionStore::new(db.clone(), feed.clone(), &config);
    let conn = connections
        .request("alice", "bob", ConnectionType::Friend)
        .await
        .unwrap();
    connections.accept("bob", &conn.id).await.unwrap();
    (connections, conn.id)
}

#[tokio::test]
async fn test_load_send_and_live_append() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let feed = ChangeFeed::default();
    let (_connections, conn_id) = accepted_connection(&db, &feed).await;
    let store = MessageStore::new(db.clone(), feed.clone());

    store.send(&conn_id, "alice", "earlier").await.unwrap();

    let mut view = ConversationView::new(Session::new("bob"), store.clone(), conn_id.clone());
    assert_eq!(view.connection_id(), conn_id);
    let loaded = view.load().await.unwrap();
    assert_eq!(loaded.len(), 1);

    let mut events = feed.subscribe();
    let reply = view.send("reply").await.unwrap();
    store.send(&conn_id, "alice", "live").await.unwrap();

    while let Ok(event) = events.try_recv() {
        view.apply_change(&event);
    }

    let contents: Vec<&str> = view.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["earlier", "reply", "live"]);
    assert_eq!(
        view.messages().iter().filter(|m| m.id == reply.id).count(),
        1,
        "own message echoed by the feed is not duplicated"
    );
}

#[tokio::test]
async fn test_whitespace_send_leaves_view_unchanged() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let feed = ChangeFeed::default();
    let (_connections, conn_id) = accepted_connection(&db, &feed).await;
    let store = MessageStore::new(db.clone(), feed.clone());

    let mut view = ConversationView::new(Session::new("alice"), store.clone(), conn_id.clone());
    view.load().await.unwrap();

    let result = view.send("   ").await;
    assert!(matches!(
        result,
        Err(SyncError::Store(StoreError::EmptyMessage))
    ));
    assert!(view.messages().is_empty());
    assert!(store.history("alice", &conn_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_closes_view_and_accepted_list() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = create_test_db(&temp_file).await;
    let feed = ChangeFeed::default();
    let (connections, conn_id) = accepted_connection(&db, &feed).await;
    let store = MessageStore::new(db.clone(), feed.clone());

    store.send(&conn_id, "alice", "done?").await.unwrap();
    let mut view = ConversationView::new(Session::new("bob"), store, conn_id.clone());
    view.load().await.unwrap();
    assert!(view.is_open());

    let mut events = feed.subscribe();
    connections.remove("bob", &conn_id).await.unwrap();
    while let Ok(event) = events.try_recv() {
        view.apply_change(&event);
    }

    assert!(!view.is_open());
    assert!(view.messages().is_empty());
    assert!(matches!(
        view.send("still there?").await,
        Err(SyncError::ConversationClosed(_))
    ));

    let lists = connections.list("bob").await.unwrap();
    assert!(lists.accepted.iter().all(|v| v.connection.id != conn_id));
}
