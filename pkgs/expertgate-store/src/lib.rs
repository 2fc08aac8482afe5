//! ExpertGate Store - persistent storage for the researcher/expert marketplace
//!
//! This crate provides SQLite-based storage using Sea-ORM for profiles,
//! connections, chat messages and the collaboration pipeline. Row visibility
//! rules are enforced by the managers: every call that acts on behalf of a
//! user takes that user's id and only touches rows the user is a party to.
//!
//! # Architecture
//!
//! - **ProfileManager**: Profiles, soft delete and the expert verification queue
//! - **ConnectionStore**: Connection requests, accept/decline/remove, unread flags
//! - **MessageStore**: Append-only chat history per connection
//! - **CollaborationManager**: Posts, applications and project groups
//! - **NotificationOutbox**: Persistent queue of outbound notification calls
//! - **ChangeFeed**: Broadcast of row changes after each committed write
//!
//! # Database Schema
//!
//! - `profiles`: One row per user, role and verification status
//! - `expert_connections`: Directed relationships with a pair of unread flags
//! - `messages`: Chat messages, cascade-deleted with their connection
//! - `collaboration_posts` / `collaboration_applications`: Collaboration pipeline
//! - `project_groups` / `project_group_members`: Groups provisioned on acceptance
//! - `notification_outbox`: Notification calls with retry bookkeeping
//!
//! Multi-row writes (sending a message, accepting an application) run in a
//! single transaction, so a failure leaves no partial state behind.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use expertgate_store::{
//!     open_database, ChangeFeed, ConnectionStore, ConnectionType, MessageStore, ProfileManager,
//!     Role, StoreConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig {
//!     db_path: "expertgate.db".into(),
//!     ..Default::default()
//! };
//! let db = open_database(&config).await?;
//! let feed = ChangeFeed::new(config.change_feed_capacity);
//!
//! let profiles = ProfileManager::new(db.clone(), feed.clone(), &config);
//! profiles.create("alice", "Alice", Role::Researcher).await?;
//! profiles.create("bob", "Bob", Role::Expert).await?;
//!
//! let connections = ConnectionStore::new(db.clone(), feed.clone(), &config);
//! let conn = connections.request("alice", "bob", ConnectionType::Friend).await?;
//! connections.accept("bob", &conn.id).await?;
//!
//! let messages = MessageStore::new(db, feed);
//! messages.send(&conn.id, "alice", "hello").await?;
//! # Ok(())
//! # }
//! ```

pub mod changefeed;
pub mod collaboration;
pub mod connection_store;
pub mod entities;
pub mod error;
pub mod message_store;
pub mod migration;
pub mod models;
pub mod notification_outbox;
pub mod profile_manager;

pub use changefeed::{ChangeEvent, ChangeFeed};
pub use collaboration::{AcceptOutcome, CollaborationManager};
pub use connection_store::ConnectionStore;
pub use error::{Result, StoreError};
pub use message_store::MessageStore;
pub use models::{
    ApplicationStatus, CollaborationApplication, CollaborationPost, Connection, ConnectionLists,
    ConnectionStatus, ConnectionType, ConnectionView, GroupMember, MemberRole, Message,
    OtherUser, OutboxStatus, PartyRole, PostStatus, Profile, ProjectGroup, Role,
    VerificationStatus,
};
pub use notification_outbox::{NotificationKind, NotificationOutbox, OutboxItem};
pub use profile_manager::{ProfileDetails, ProfileManager};

use anyhow::Context;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

/// Configuration for the store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: std::path::PathBuf,

    /// Buffered events per change feed subscriber (default: 256)
    pub change_feed_capacity: usize,

    /// Attempts before a notification is marked expired (default: 10)
    pub max_notification_attempts: u32,

    /// First retry delay in seconds, doubled on each failure (default: 30s)
    pub notification_retry_base_seconds: u64,

    /// Maximum notifications handed to a dispatcher per pass (default: 50)
    pub notification_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::path::PathBuf::from("expertgate.db"),
            change_feed_capacity: 256,
            max_notification_attempts: 10,
            notification_retry_base_seconds: 30,
            notification_batch_size: 50,
        }
    }
}

/// Connect to the SQLite database at `config.db_path` and run migrations
pub async fn open_database(config: &StoreConfig) -> anyhow::Result<DatabaseConnection> {
    let db_path_str = config
        .db_path
        .to_str()
        .context("Invalid database path")?
        .replace("\\", "/");

    let db_url = format!("sqlite:{}?mode=rwc", db_path_str);

    let db: DatabaseConnection = Database::connect(db_url.as_str())
        .await
        .context("Failed to connect to database")?;

    migration::Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    info!("Store initialized at {}", config.db_path.display());

    Ok(db)
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
