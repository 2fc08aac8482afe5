// Copyright 2025 ExpertGate Team.
//
// Tests for ConnectionStore

use expertgate_store::{
    ChangeEvent, ChangeFeed, ConnectionStatus, ConnectionStore, ConnectionType, MessageStore,
    NotificationKind, NotificationOutbox, OutboxStatus, ProfileManager, Role, StoreConfig,
    StoreError,
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

    // Run migrations
    <expertgate_store::migration::Migrator as expertgate_store::migration::MigratorTrait>::up(
        &db, None,
    )
    .await
    .expect("Failed to run migrations");

    db
}

struct Fixture {
    db: DatabaseConnection,
    feed: ChangeFeed,
    profiles: ProfileManager,
    connections: ConnectionStore,
}

async fn setup(temp_file: &NamedTempFile) -> Fixture {
    let db = create_test_db(temp_file).await;
    let config = StoreConfig::default();
    let feed = ChangeFeed::default();
    let profiles = ProfileManager::new(db.clone(), feed.clone(), &config);
    let connections = ConnectionStore::new(db.clone(), feed.clone(), &config);

    profiles
        .create("alice", "Alice Researcher", Role::Researcher)
        .await
        .unwrap();
    profiles.create("bob", "Bob Expert", Role::Expert).await.unwrap();
    profiles
        .create("carol", "Carol Researcher", Role::Researcher)
        .await
        .unwrap();

    Fixture {
        db,
        feed,
        profiles,
        connections,
    }
}

#[tokio::test]
async fn test_request_and_list_pending() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;

    let conn = fx
        .connections
        .request("alice", "bob", ConnectionType::Friend)
        .await
        .expect("Failed to request connection");
    assert_eq!(conn.status, ConnectionStatus::Pending);

    let alice = fx.connections.list("alice").await.unwrap();
    assert!(alice.accepted.is_empty());
    assert_eq!(alice.pending.len(), 1);
    assert!(alice.pending[0].is_requester);
    assert!(!alice.pending[0].can_respond());
    assert_eq!(alice.pending[0].other_user.id, "bob");
    assert_eq!(alice.pending[0].other_user.role, Role::Expert);

    let bob = fx.connections.list("bob").await.unwrap();
    assert_eq!(bob.pending.len(), 1);
    assert!(!bob.pending[0].is_requester);
    assert!(bob.pending[0].can_respond());
    assert_eq!(bob.pending[0].other_user.full_name, "Alice Researcher");

    // Carol sees nothing
    let carol = fx.connections.list("carol").await.unwrap();
    assert!(carol.accepted.is_empty() && carol.pending.is_empty());
}

#[tokio::test]
async fn test_request_enqueues_notification() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;

    let conn = fx
        .connections
        .request("alice", "carol", ConnectionType::Friend)
        .await
        .unwrap();

    let outbox = NotificationOutbox::new(fx.db.clone(), &StoreConfig::default());
    let pending = outbox.with_status(OutboxStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, NotificationKind::Connection);
    assert_eq!(pending[0].payload["type"], "request");
    assert_eq!(pending[0].payload["connection_id"], conn.id.as_str());
}

#[tokio::test]
async fn test_request_rejects_invalid_pairs() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;

    let result = fx
        .connections
        .request("alice", "alice", ConnectionType::Friend)
        .await;
    assert!(matches!(result, Err(StoreError::SelfConnection)));

    let result = fx
        .connections
        .request("alice", "nobody", ConnectionType::Friend)
        .await;
    assert!(matches!(result, Err(StoreError::ProfileNotFound(_))));

    fx.connections
        .request("alice", "carol", ConnectionType::Friend)
        .await
        .unwrap();
    // Same pair, either direction
    let result = fx
        .connections
        .request("carol", "alice", ConnectionType::Friend)
        .await;
    assert!(matches!(
        result,
        Err(StoreError::DuplicateConnection(ConnectionType::Friend))
    ));
}

#[tokio::test]
async fn test_interview_requires_verified_expert() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;

    let result = fx
        .connections
        .request("alice", "bob", ConnectionType::Interview)
        .await;
    assert!(matches!(result, Err(StoreError::RecipientNotVerified(_))));

    fx.profiles.create("admin", "Admin", Role::Researcher).await.unwrap();
    fx.profiles.set_admin("admin", true).await.unwrap();
    fx.profiles
        .set_verification("admin", "bob", true)
        .await
        .unwrap();

    let conn = fx
        .connections
        .request("alice", "bob", ConnectionType::Interview)
        .await
        .expect("Verified expert should accept interview requests");
    assert_eq!(conn.connection_type, ConnectionType::Interview);
}

#[tokio::test]
async fn test_only_recipient_can_accept() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;

    let conn = fx
        .connections
        .request("alice", "carol", ConnectionType::Friend)
        .await
        .unwrap();

    let result = fx.connections.accept("alice", &conn.id).await;
    assert!(matches!(result, Err(StoreError::NotRecipient(_))));

    // Not visible to a third party at all
    let result = fx.connections.accept("bob", &conn.id).await;
    assert!(matches!(result, Err(StoreError::ConnectionNotFound(_))));

    let accepted = fx.connections.accept("carol", &conn.id).await.unwrap();
    assert_eq!(accepted.status, ConnectionStatus::Accepted);

    // Resolved connections stay resolved
    let result = fx.connections.decline("carol", &conn.id).await;
    assert!(matches!(result, Err(StoreError::InvalidTransition(_))));

    let lists = fx.connections.list("alice").await.unwrap();
    assert_eq!(lists.accepted.len(), 1);
    assert!(lists.pending.is_empty());
}

#[tokio::test]
async fn test_declined_connections_are_hidden() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;

    let conn = fx
        .connections
        .request("alice", "carol", ConnectionType::Friend)
        .await
        .unwrap();
    fx.connections.decline("carol", &conn.id).await.unwrap();

    let lists = fx.connections.list("carol").await.unwrap();
    assert!(lists.accepted.is_empty());
    assert!(lists.pending.is_empty());
    assert!(fx.connections.pending_inbound("carol").await.unwrap().is_empty());

    // A declined request does not block a new one
    fx.connections
        .request("alice", "carol", ConnectionType::Friend)
        .await
        .expect("Re-request after decline should succeed");
}

#[tokio::test]
async fn test_remove_deletes_connection_and_messages() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;
    let messages = MessageStore::new(fx.db.clone(), fx.feed.clone());

    let conn = fx
        .connections
        .request("alice", "carol", ConnectionType::Friend)
        .await
        .unwrap();
    fx.connections.accept("carol", &conn.id).await.unwrap();
    messages.send(&conn.id, "alice", "hi").await.unwrap();

    let mut rx = fx.feed.subscribe();
    fx.connections.remove("carol", &conn.id).await.unwrap();

    match rx.recv().await.unwrap() {
        ChangeEvent::ConnectionDeleted { id, .. } => assert_eq!(id, conn.id),
        other => panic!("Unexpected event: {:?}", other),
    }

    assert!(fx.connections.list("alice").await.unwrap().accepted.is_empty());
    let result = messages.history("alice", &conn.id).await;
    assert!(matches!(result, Err(StoreError::ConnectionNotFound(_))));
}

#[tokio::test]
async fn test_mark_read_clears_only_callers_flag() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;
    let messages = MessageStore::new(fx.db.clone(), fx.feed.clone());

    let conn = fx
        .connections
        .request("alice", "carol", ConnectionType::Friend)
        .await
        .unwrap();
    fx.connections.accept("carol", &conn.id).await.unwrap();
    messages.send(&conn.id, "alice", "to carol").await.unwrap();
    messages.send(&conn.id, "carol", "to alice").await.unwrap();

    let both = fx.connections.get("alice", &conn.id).await.unwrap();
    assert!(both.has_unread_for_requester);
    assert!(both.has_unread_for_recipient);

    let after = fx.connections.mark_read("carol", &conn.id).await.unwrap();
    assert!(!after.has_unread_for_recipient);
    assert!(after.has_unread_for_requester);
}

#[tokio::test]
async fn test_soft_deleted_party_is_omitted() {
    let temp_file = NamedTempFile::new().unwrap();
    let fx = setup(&temp_file).await;

    let conn = fx
        .connections
        .request("alice", "carol", ConnectionType::Friend)
        .await
        .unwrap();
    fx.connections.accept("carol", &conn.id).await.unwrap();
    fx.profiles.soft_delete("carol").await.unwrap();

    let lists = fx.connections.list("alice").await.unwrap();
    assert!(lists.accepted.is_empty());
}
