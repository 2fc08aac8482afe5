//! Connection store - connection requests, their status and unread flags

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::changefeed::{ChangeEvent, ChangeFeed};
use crate::entities::{expert_connections, messages, profiles};
use crate::error::{Result, StoreError};
use crate::models::{
    Connection, ConnectionLists, ConnectionStatus, ConnectionType, ConnectionView, OtherUser,
    PartyRole, Profile,
};
use crate::notification_outbox::{notification_payload, NotificationKind, NotificationOutbox};
use crate::{new_id, now_millis, StoreConfig};

/// Connection store
#[derive(Clone)]
pub struct ConnectionStore {
    db: DatabaseConnection,
    feed: ChangeFeed,
    max_notification_attempts: u32,
}

impl ConnectionStore {
    /// Create a new connection store
    pub fn new(db: DatabaseConnection, feed: ChangeFeed, config: &StoreConfig) -> Self {
        Self {
            db,
            feed,
            max_notification_attempts: config.max_notification_attempts,
        }
    }

    /// Open a pending connection from `requester_id` to `recipient_id`
    pub async fn request(
        &self,
        requester_id: &str,
        recipient_id: &str,
        connection_type: ConnectionType,
    ) -> Result<Connection> {
        if requester_id == recipient_id {
            return Err(StoreError::SelfConnection);
        }

        let txn = self.db.begin().await?;

        for id in [requester_id, recipient_id] {
            let exists = profiles::Entity::find_by_id(id.to_string())
                .one(&txn)
                .await?
                .filter(|p| !p.is_deleted);
            if exists.is_none() {
                return Err(StoreError::ProfileNotFound(id.to_string()));
            }
        }

        if connection_type == ConnectionType::Interview {
            let recipient = profiles::Entity::find_by_id(recipient_id.to_string())
                .one(&txn)
                .await?
                .map(Profile::try_from)
                .transpose()?
                .ok_or_else(|| StoreError::ProfileNotFound(recipient_id.to_string()))?;
            if !recipient.is_verified_expert() {
                warn!("Interview request to unverified profile {}", recipient_id);
                return Err(StoreError::RecipientNotVerified(recipient_id.to_string()));
            }
        }

        let existing = expert_connections::Entity::find()
            .filter(Self::between(requester_id, recipient_id))
            .filter(expert_connections::Column::ConnectionType.eq(connection_type.as_str()))
            .filter(expert_connections::Column::Status.is_in([
                ConnectionStatus::Pending.as_str(),
                ConnectionStatus::Accepted.as_str(),
            ]))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(StoreError::DuplicateConnection(connection_type));
        }

        let model = insert_connection(
            &txn,
            requester_id,
            recipient_id,
            ConnectionStatus::Pending,
            connection_type,
        )
        .await?;

        let kind = match connection_type {
            ConnectionType::Interview => NotificationKind::Interview,
            _ => NotificationKind::Connection,
        };
        NotificationOutbox::enqueue(
            &txn,
            kind,
            notification_payload("request", "connection", &model.id),
            self.max_notification_attempts,
        )
        .await?;

        txn.commit().await?;

        let connection = Connection::try_from(model)?;
        info!(
            "Connection {} requested: {} -> {} ({})",
            connection.id, requester_id, recipient_id, connection_type
        );
        self.feed
            .publish(ChangeEvent::ConnectionInserted(connection.clone()));
        Ok(connection)
    }

    /// Get a connection visible to `user_id`
    pub async fn get(&self, user_id: &str, connection_id: &str) -> Result<Connection> {
        let model = self.find_visible(user_id, connection_id).await?;
        Connection::try_from(model)
    }

    /// All non-declined connections of `user_id`, split into accepted and pending,
    /// each with the other party's display profile
    pub async fn list(&self, user_id: &str) -> Result<ConnectionLists> {
        let models = expert_connections::Entity::find()
            .filter(Self::involving(user_id))
            .filter(expert_connections::Column::Status.ne(ConnectionStatus::Declined.as_str()))
            .order_by_desc(expert_connections::Column::UpdatedAt)
            .all(&self.db)
            .await?;

        let connections = models
            .into_iter()
            .map(Connection::try_from)
            .collect::<Result<Vec<_>>>()?;

        let other_ids: Vec<String> = connections
            .iter()
            .filter_map(|c| c.counterparty(user_id).map(str::to_string))
            .collect();
        let others: HashMap<String, Profile> = if other_ids.is_empty() {
            HashMap::new()
        } else {
            profiles::Entity::find()
                .filter(profiles::Column::Id.is_in(other_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(Profile::try_from)
                .map(|p| p.map(|p| (p.id.clone(), p)))
                .collect::<Result<_>>()?
        };

        let mut lists = ConnectionLists::default();
        for connection in connections {
            let Some(other_id) = connection.counterparty(user_id) else {
                continue;
            };
            let Some(other) = others.get(other_id).filter(|p| !p.is_deleted) else {
                debug!("Skipping connection {} with missing or deleted party", connection.id);
                continue;
            };

            let view = ConnectionView {
                is_requester: connection.requester_id == user_id,
                has_unread: connection.is_unread_for(user_id),
                other_user: OtherUser::from(other),
                connection,
            };
            match view.connection.status {
                ConnectionStatus::Accepted => lists.accepted.push(view),
                ConnectionStatus::Pending => lists.pending.push(view),
                ConnectionStatus::Declined => {}
            }
        }

        debug!(
            "Listed connections for {}: {} accepted, {} pending",
            user_id,
            lists.accepted.len(),
            lists.pending.len()
        );
        Ok(lists)
    }

    /// Accepted connections of `user_id`
    pub async fn accepted_for(&self, user_id: &str) -> Result<Vec<Connection>> {
        let models = expert_connections::Entity::find()
            .filter(Self::involving(user_id))
            .filter(expert_connections::Column::Status.eq(ConnectionStatus::Accepted.as_str()))
            .all(&self.db)
            .await?;

        models.into_iter().map(Connection::try_from).collect()
    }

    /// Pending requests addressed to `user_id`, oldest first
    pub async fn pending_inbound(&self, user_id: &str) -> Result<Vec<Connection>> {
        let models = expert_connections::Entity::find()
            .filter(expert_connections::Column::RecipientId.eq(user_id))
            .filter(expert_connections::Column::Status.eq(ConnectionStatus::Pending.as_str()))
            .order_by_asc(expert_connections::Column::CreatedAt)
            .all(&self.db)
            .await?;

        models.into_iter().map(Connection::try_from).collect()
    }

    /// Accept a pending request. Only its recipient may do this.
    pub async fn accept(&self, user_id: &str, connection_id: &str) -> Result<Connection> {
        self.respond(user_id, connection_id, ConnectionStatus::Accepted)
            .await
    }

    /// Decline a pending request. Only its recipient may do this.
    pub async fn decline(&self, user_id: &str, connection_id: &str) -> Result<Connection> {
        self.respond(user_id, connection_id, ConnectionStatus::Declined)
            .await
    }

    /// Hard delete a connection and its messages. Either party may do this.
    pub async fn remove(&self, user_id: &str, connection_id: &str) -> Result<()> {
        let txn = self.db.begin().await?;

        let model = expert_connections::Entity::find_by_id(connection_id.to_string())
            .filter(Self::involving(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))?;

        messages::Entity::delete_many()
            .filter(messages::Column::ConnectionId.eq(connection_id))
            .exec(&txn)
            .await?;
        expert_connections::Entity::delete_by_id(connection_id.to_string())
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!("Connection {} removed by {}", connection_id, user_id);
        self.feed.publish(ChangeEvent::ConnectionDeleted {
            id: model.id,
            requester_id: model.requester_id,
            recipient_id: model.recipient_id,
        });
        Ok(())
    }

    /// Clear the unread flag that belongs to `user_id` on this connection
    pub async fn mark_read(&self, user_id: &str, connection_id: &str) -> Result<Connection> {
        let model = self.find_visible(user_id, connection_id).await?;
        let role = Connection::try_from(model.clone())?
            .role_of(user_id)
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))?;

        let mut active: expert_connections::ActiveModel = model.into();
        match role {
            PartyRole::Requester => active.has_unread_for_requester = Set(false),
            PartyRole::Recipient => active.has_unread_for_recipient = Set(false),
        }
        let connection = Connection::try_from(active.update(&self.db).await?)?;

        debug!("Connection {} marked read by {}", connection_id, user_id);
        self.feed
            .publish(ChangeEvent::ConnectionUpdated(connection.clone()));
        Ok(connection)
    }

    async fn respond(
        &self,
        user_id: &str,
        connection_id: &str,
        status: ConnectionStatus,
    ) -> Result<Connection> {
        let txn = self.db.begin().await?;

        let model = expert_connections::Entity::find_by_id(connection_id.to_string())
            .filter(Self::involving(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))?;

        if model.recipient_id != user_id {
            warn!(
                "{} tried to respond to connection {} they requested",
                user_id, connection_id
            );
            return Err(StoreError::NotRecipient(connection_id.to_string()));
        }
        if model.status != ConnectionStatus::Pending.as_str() {
            return Err(StoreError::InvalidTransition(format!(
                "connection {} is already {}",
                connection_id, model.status
            )));
        }

        let mut active: expert_connections::ActiveModel = model.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(now_millis());
        let connection = Connection::try_from(active.update(&txn).await?)?;

        if status == ConnectionStatus::Accepted {
            NotificationOutbox::enqueue(
                &txn,
                NotificationKind::Connection,
                notification_payload("accepted", "connection", connection_id),
                self.max_notification_attempts,
            )
            .await?;
        }

        txn.commit().await?;

        info!("Connection {} {} by {}", connection_id, status, user_id);
        self.feed
            .publish(ChangeEvent::ConnectionUpdated(connection.clone()));
        Ok(connection)
    }

    async fn find_visible(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Result<expert_connections::Model> {
        expert_connections::Entity::find_by_id(connection_id.to_string())
            .filter(Self::involving(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))
    }

    /// Rows where `user_id` is either party
    pub(crate) fn involving(user_id: &str) -> Condition {
        Condition::any()
            .add(expert_connections::Column::RequesterId.eq(user_id))
            .add(expert_connections::Column::RecipientId.eq(user_id))
    }

    /// Rows between two users in either direction
    pub(crate) fn between(a: &str, b: &str) -> Condition {
        Condition::any()
            .add(
                Condition::all()
                    .add(expert_connections::Column::RequesterId.eq(a))
                    .add(expert_connections::Column::RecipientId.eq(b)),
            )
            .add(
                Condition::all()
                    .add(expert_connections::Column::RequesterId.eq(b))
                    .add(expert_connections::Column::RecipientId.eq(a)),
            )
    }
}

/// Insert a connection row on `db`, which may be an open transaction
pub(crate) async fn insert_connection<C: ConnectionTrait>(
    db: &C,
    requester_id: &str,
    recipient_id: &str,
    status: ConnectionStatus,
    connection_type: ConnectionType,
) -> Result<expert_connections::Model> {
    let now = now_millis();
    let model = expert_connections::Model {
        id: new_id(),
        requester_id: requester_id.to_string(),
        recipient_id: recipient_id.to_string(),
        status: status.as_str().to_string(),
        connection_type: connection_type.as_str().to_string(),
        has_unread_for_requester: false,
        has_unread_for_recipient: false,
        created_at: now,
        updated_at: now,
    };

    let active = expert_connections::ActiveModel {
        id: Set(model.id.clone()),
        requester_id: Set(model.requester_id.clone()),
        recipient_id: Set(model.recipient_id.clone()),
        status: Set(model.status.clone()),
        connection_type: Set(model.connection_type.clone()),
        has_unread_for_requester: Set(false),
        has_unread_for_recipient: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    };
    expert_connections::Entity::insert(active)
        .exec_without_returning(db)
        .await?;

    Ok(model)
}
