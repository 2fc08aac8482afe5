//! Change feed - in-process stream of row changes

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{
    CollaborationApplication, Connection, GroupMember, Message, Profile,
};

/// Row change published after a successful write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangeEvent {
    ConnectionInserted(Connection),
    ConnectionUpdated(Connection),
    ConnectionDeleted {
        id: String,
        requester_id: String,
        recipient_id: String,
    },
    MessageInserted(Message),
    ApplicationInserted(CollaborationApplication),
    ApplicationUpdated(CollaborationApplication),
    GroupMemberAdded(GroupMember),
    ProfileUpdated(Profile),
}

impl ChangeEvent {
    /// Connection id this event refers to, if any
    pub fn connection_id(&self) -> Option<&str> {
        match self {
            Self::ConnectionInserted(c) | Self::ConnectionUpdated(c) => Some(&c.id),
            Self::ConnectionDeleted { id, .. } => Some(id),
            Self::MessageInserted(m) => Some(&m.connection_id),
            _ => None,
        }
    }

    /// Whether `user_id` is the recipient of the connection this event refers to
    pub fn is_inbound_for(&self, user_id: &str) -> bool {
        match self {
            Self::ConnectionInserted(c) | Self::ConnectionUpdated(c) => c.recipient_id == user_id,
            Self::ConnectionDeleted { recipient_id, .. } => recipient_id == user_id,
            _ => false,
        }
    }
}

/// Broadcast channel of [`ChangeEvent`]s
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        if self.sender.send(event).is_err() {
            debug!("Change event dropped, no subscribers");
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}
