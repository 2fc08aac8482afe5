//! Conversation view - message history of one open connection

use expertgate_store::{ChangeEvent, Message, MessageStore};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::session::Session;

/// In-memory history of one connection, kept current from change events
pub struct ConversationView {
    session: Session,
    store: MessageStore,
    connection_id: String,
    messages: Vec<Message>,
    closed: bool,
}

impl ConversationView {
    pub fn new(session: Session, store: MessageStore, connection_id: impl Into<String>) -> Self {
        Self {
            session,
            store,
            connection_id: connection_id.into(),
            messages: Vec::new(),
            closed: false,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Replace the in-memory list with the stored history, oldest first
    pub async fn load(&mut self) -> Result<&[Message]> {
        if self.closed {
            return Err(SyncError::ConversationClosed(self.connection_id.clone()));
        }
        self.messages = self
            .store
            .history(&self.session.user_id, &self.connection_id)
            .await?;
        debug!(
            "Conversation {} loaded with {} messages",
            self.connection_id,
            self.messages.len()
        );
        Ok(self.messages.as_slice())
    }

    /// Send as the session user and append the stored message
    pub async fn send(&mut self, text: &str) -> Result<Message> {
        if self.closed {
            return Err(SyncError::ConversationClosed(self.connection_id.clone()));
        }
        let message = self
            .store
            .send(&self.connection_id, &self.session.user_id, text)
            .await?;
        self.append(message.clone());
        Ok(message)
    }

    /// Fold a change event into the view. Returns true if the view changed.
    pub fn apply_change(&mut self, event: &ChangeEvent) -> bool {
        if self.closed {
            return false;
        }
        match event {
            ChangeEvent::MessageInserted(message) if message.connection_id == self.connection_id => {
                self.append(message.clone())
            }
            ChangeEvent::ConnectionDeleted { id, .. } if *id == self.connection_id => {
                info!("Conversation {} closed, connection removed", id);
                self.closed = true;
                self.messages.clear();
                true
            }
            _ => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    // Receipt order, duplicates dropped
    fn append(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }
}
