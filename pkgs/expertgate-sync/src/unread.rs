//! Unread aggregator - which of the session user's conversations have unseen messages

use async_trait::async_trait;
use expertgate_store::{ChangeEvent, Connection, ConnectionStore, StoreError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::Result;
use crate::reconcile::ReadReconciler;
use crate::session::Session;
use crate::SyncConfig;

/// Source of unread flags and sink for read acknowledgements
#[async_trait]
pub trait ReadReceipts: Send + Sync {
    /// Accepted connections where `user_id` is either party
    async fn accepted_for(&self, user_id: &str) -> std::result::Result<Vec<Connection>, StoreError>;

    /// Clear `user_id`'s unread flag on a connection
    async fn clear_unread(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> std::result::Result<(), StoreError>;
}

#[async_trait]
impl ReadReceipts for ConnectionStore {
    async fn accepted_for(&self, user_id: &str) -> std::result::Result<Vec<Connection>, StoreError> {
        ConnectionStore::accepted_for(self, user_id).await
    }

    async fn clear_unread(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> std::result::Result<(), StoreError> {
        self.mark_read(user_id, connection_id).await.map(|_| ())
    }
}

struct UnreadState {
    unread: HashSet<String>,
    reconciler: ReadReconciler,
}

/// Unread set for one session
pub struct UnreadAggregator<R> {
    session: Session,
    receipts: Arc<R>,
    state: Mutex<UnreadState>,
}

impl<R: ReadReceipts> UnreadAggregator<R> {
    pub fn new(session: Session, receipts: Arc<R>, config: &SyncConfig) -> Self {
        Self {
            session,
            receipts,
            state: Mutex::new(UnreadState {
                unread: HashSet::new(),
                reconciler: ReadReconciler::new(config.ack_suppression_window),
            }),
        }
    }

    /// Recompute the unread set from the store. Returns the new unread count.
    pub async fn refresh(&self) -> Result<usize> {
        let user_id = self.session.user_id.as_str();
        let connections = self.receipts.accepted_for(user_id).await?;

        let now = Instant::now();
        let mut guard = self.state.lock();
        let UnreadState { unread, reconciler } = &mut *guard;
        reconciler.prune(now);

        *unread = connections
            .iter()
            .filter(|c| c.is_unread_for(user_id))
            .filter(|c| !reconciler.is_suppressed(&c.id, now))
            .map(|c| c.id.clone())
            .collect();

        debug!("{} has {} unread conversations", user_id, unread.len());
        Ok(unread.len())
    }

    pub fn has_unread(&self) -> bool {
        !self.state.lock().unread.is_empty()
    }

    /// Unread connection ids, sorted
    pub fn unread_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().unread.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_unread(&self, connection_id: &str) -> bool {
        self.state.lock().unread.contains(connection_id)
    }

    /// Acknowledge a conversation.
    ///
    /// The id leaves the unread set before the store write is issued. If the
    /// write fails the id is restored, only if it was unread before, and the
    /// error is returned.
    pub async fn mark_as_read(&self, connection_id: &str) -> Result<()> {
        let was_unread = {
            let mut state = self.state.lock();
            state.reconciler.suppress(connection_id, Instant::now());
            state.unread.remove(connection_id)
        };

        match self
            .receipts
            .clear_unread(&self.session.user_id, connection_id)
            .await
        {
            Ok(()) => {
                debug!("Connection {} acknowledged", connection_id);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to acknowledge connection {}: {}", connection_id, e);
                let mut state = self.state.lock();
                state.reconciler.release(connection_id);
                if was_unread {
                    state.unread.insert(connection_id.to_string());
                }
                Err(e.into())
            }
        }
    }

    /// Fold a change event into the unread set
    pub fn apply_change(&self, event: &ChangeEvent) {
        let user_id = self.session.user_id.as_str();
        match event {
            ChangeEvent::ConnectionInserted(conn) | ChangeEvent::ConnectionUpdated(conn)
                if conn.involves(user_id) =>
            {
                let now = Instant::now();
                let mut guard = self.state.lock();
                let UnreadState { unread, reconciler } = &mut *guard;
                if conn.is_unread_for(user_id) && !reconciler.is_suppressed(&conn.id, now) {
                    unread.insert(conn.id.clone());
                } else {
                    unread.remove(&conn.id);
                }
            }
            ChangeEvent::ConnectionDeleted { id, .. } => {
                let mut state = self.state.lock();
                state.unread.remove(id);
                state.reconciler.release(id);
            }
            _ => {}
        }
    }
}
