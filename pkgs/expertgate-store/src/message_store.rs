//! Message store - append-only chat history per connection

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{debug, info};

use crate::changefeed::{ChangeEvent, ChangeFeed};
use crate::connection_store::ConnectionStore;
use crate::entities::{expert_connections, messages};
use crate::error::{Result, StoreError};
use crate::models::{Connection, ConnectionStatus, Message, PartyRole};
use crate::{new_id, now_millis};

/// Message store
#[derive(Clone)]
pub struct MessageStore {
    db: DatabaseConnection,
    feed: ChangeFeed,
}

impl MessageStore {
    /// Create a new message store
    pub fn new(db: DatabaseConnection, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// Full history of a connection, oldest first. `viewer_id` must be a party.
    pub async fn history(&self, viewer_id: &str, connection_id: &str) -> Result<Vec<Message>> {
        let visible = expert_connections::Entity::find_by_id(connection_id.to_string())
            .filter(ConnectionStore::involving(viewer_id))
            .one(&self.db)
            .await?;
        if visible.is_none() {
            return Err(StoreError::ConnectionNotFound(connection_id.to_string()));
        }

        let models = messages::Entity::find()
            .filter(messages::Column::ConnectionId.eq(connection_id))
            .order_by_asc(messages::Column::CreatedAt)
            .all(&self.db)
            .await?;

        debug!(
            "Loaded {} messages for connection {}",
            models.len(),
            connection_id
        );
        Ok(models.into_iter().map(Message::from).collect())
    }

    /// Send a message and raise the counter-party's unread flag.
    ///
    /// Both writes happen in one transaction. Only accepted connections carry
    /// messages. Whitespace-only content is rejected before the database is
    /// touched.
    pub async fn send(&self, connection_id: &str, sender_id: &str, content: &str) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }

        let txn = self.db.begin().await?;

        let conn_model = expert_connections::Entity::find_by_id(connection_id.to_string())
            .filter(ConnectionStore::involving(sender_id))
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))?;
        let current = Connection::try_from(conn_model.clone())?;
        if current.status != ConnectionStatus::Accepted {
            return Err(StoreError::InvalidTransition(format!(
                "cannot send on {} connection {}",
                current.status, connection_id
            )));
        }
        let role = current
            .role_of(sender_id)
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))?;

        // Keep created_at strictly increasing within a connection so history
        // order matches insert order even within one millisecond.
        let last = messages::Entity::find()
            .filter(messages::Column::ConnectionId.eq(connection_id))
            .order_by_desc(messages::Column::CreatedAt)
            .one(&txn)
            .await?;
        let now = now_millis();
        let created_at = match last {
            Some(last) if last.created_at >= now => last.created_at + 1,
            _ => now,
        };

        let model = messages::Model {
            id: new_id(),
            connection_id: connection_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            created_at,
            read_at: None,
        };
        let active = messages::ActiveModel {
            id: Set(model.id.clone()),
            connection_id: Set(model.connection_id.clone()),
            sender_id: Set(model.sender_id.clone()),
            content: Set(model.content.clone()),
            created_at: Set(created_at),
            read_at: Set(None),
        };
        messages::Entity::insert(active)
            .exec_without_returning(&txn)
            .await?;

        let mut conn_active: expert_connections::ActiveModel = conn_model.into();
        match role {
            PartyRole::Requester => conn_active.has_unread_for_recipient = Set(true),
            PartyRole::Recipient => conn_active.has_unread_for_requester = Set(true),
        }
        conn_active.updated_at = Set(now);
        let connection = Connection::try_from(conn_active.update(&txn).await?)?;

        txn.commit().await?;

        let message = Message::from(model);
        info!("Message {} sent on connection {}", message.id, connection_id);
        self.feed.publish(ChangeEvent::MessageInserted(message.clone()));
        self.feed.publish(ChangeEvent::ConnectionUpdated(connection));
        Ok(message)
    }
}
