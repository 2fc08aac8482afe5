//! ExpertGate Sync - session-scoped live state over the store
//!
//! Every component here is built from an explicit [`Session`] and keeps a
//! small piece of in-memory state current, either by reloading from the
//! store or by folding in [`ChangeEvent`](expertgate_store::ChangeEvent)s from
//! the store's change feed.
//!
//! # Architecture
//!
//! - **SessionTracker**: Sign-in/sign-out, publishes the active session
//! - **UnreadAggregator**: Unread conversation set with optimistic acknowledgement
//! - **ReadReconciler**: TTL cache that masks stale unread flags after an acknowledgement
//! - **PendingRequestAggregator**: Inbound request count and new-request notices
//! - **ConversationView**: Message list for one open connection
//! - **NotificationDispatcher**: Drains the notification outbox with retries
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use expertgate_store::{open_database, ChangeFeed, ConnectionStore, ProfileManager, StoreConfig};
//! use expertgate_sync::{SessionTracker, SyncConfig, UnreadAggregator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store_config = StoreConfig::default();
//! let db = open_database(&store_config).await?;
//! let feed = ChangeFeed::new(store_config.change_feed_capacity);
//!
//! let tracker = SessionTracker::new(ProfileManager::new(db.clone(), feed.clone(), &store_config));
//! let session = tracker.sign_in("alice").await?;
//!
//! let connections = Arc::new(ConnectionStore::new(db, feed.clone(), &store_config));
//! let unread = UnreadAggregator::new(session, connections, &SyncConfig::default());
//! unread.refresh().await?;
//!
//! let mut events = feed.subscribe();
//! while let Ok(event) = events.recv().await {
//!     unread.apply_change(&event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod pending;
pub mod reconcile;
pub mod session;
pub mod unread;

pub use conversation::ConversationView;
pub use dispatch::{DispatchReport, LogSender, NotificationDispatcher, NotificationSender};
pub use error::{Result, SyncError};
pub use pending::{NewRequestNotice, PendingRequestAggregator};
pub use reconcile::{ReadReconciler, ACK_SUPPRESSION_WINDOW};
pub use session::{Session, SessionTracker};
pub use unread::{ReadReceipts, UnreadAggregator};

use std::time::Duration;

/// Configuration for session-scoped components
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long an acknowledged conversation ignores stale unread flags (default: 3s)
    pub ack_suppression_window: Duration,

    /// Interval between notification dispatch passes (default: 30s)
    pub dispatch_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ack_suppression_window: ACK_SUPPRESSION_WINDOW,
            dispatch_interval: Duration::from_secs(30),
        }
    }
}
