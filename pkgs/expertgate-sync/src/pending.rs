//! Pending request aggregator - inbound request count and new-request notices

use expertgate_store::{
    ChangeEvent, ConnectionStore, ConnectionType, OtherUser, ProfileManager,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::Result;
use crate::session::Session;

/// A request that arrived after the session's first load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequestNotice {
    pub connection_id: String,
    pub connection_type: ConnectionType,
    pub requester: OtherUser,
}

pub struct PendingRequestAggregator {
    session: Session,
    connections: ConnectionStore,
    profiles: ProfileManager,
    // None until the first load
    previous: Mutex<Option<HashSet<String>>>,
}

impl PendingRequestAggregator {
    pub fn new(session: Session, connections: ConnectionStore, profiles: ProfileManager) -> Self {
        Self {
            session,
            connections,
            profiles,
            previous: Mutex::new(None),
        }
    }

    /// Reload pending inbound requests.
    ///
    /// With `announce`, requests not seen by the previous load are returned as
    /// notices. The first load never announces anything.
    pub async fn refresh(&self, announce: bool) -> Result<Vec<NewRequestNotice>> {
        let pending = self
            .connections
            .pending_inbound(&self.session.user_id)
            .await?;

        let arrived: Vec<_> = match self.previous.lock().as_ref() {
            Some(seen) if announce => pending
                .iter()
                .filter(|c| !seen.contains(&c.id))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };

        debug!(
            "{} has {} pending requests, {} new",
            self.session.user_id,
            pending.len(),
            arrived.len()
        );

        let mut notices = Vec::with_capacity(arrived.len());
        for conn in arrived {
            let Some(requester) = self.profiles.get(&conn.requester_id).await? else {
                continue;
            };
            if requester.is_deleted {
                continue;
            }
            info!(
                "New {} request from {} ({})",
                conn.connection_type, requester.full_name, conn.id
            );
            notices.push(NewRequestNotice {
                connection_id: conn.id,
                connection_type: conn.connection_type,
                requester: OtherUser::from(&requester),
            });
        }

        // Only a fully announced load counts as seen
        *self.previous.lock() = Some(pending.iter().map(|c| c.id.clone()).collect());
        Ok(notices)
    }

    /// Pending inbound requests as of the last load
    pub fn count(&self) -> usize {
        self.previous.lock().as_ref().map(HashSet::len).unwrap_or(0)
    }

    /// React to a change event. Inserts addressed to the session user announce.
    pub async fn apply_change(&self, event: &ChangeEvent) -> Result<Vec<NewRequestNotice>> {
        if !event.is_inbound_for(&self.session.user_id) {
            return Ok(Vec::new());
        }
        match event {
            ChangeEvent::ConnectionInserted(_) => self.refresh(true).await,
            ChangeEvent::ConnectionUpdated(_) | ChangeEvent::ConnectionDeleted { .. } => {
                self.refresh(false).await
            }
            _ => Ok(Vec::new()),
        }
    }
}
