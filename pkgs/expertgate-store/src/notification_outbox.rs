//! Notification outbox - persistent queue of outbound notification calls
//!
//! Writes that should notify someone enqueue an item in the same transaction
//! as the write itself. A dispatcher later drains due items and records the
//! outcome: delivered, retried with exponential backoff, or expired once the
//! attempt budget is spent.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::entities::notification_outbox;
use crate::error::{Result, StoreError};
use crate::models::{from_millis, OutboxStatus};
use crate::StoreConfig;

/// Serverless notification functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    Interview,
    Connection,
    Support,
    ExpertVerification,
    RequestPasswordReset,
    ResetPassword,
}

impl NotificationKind {
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::Interview => "send-interview-notification",
            Self::Connection => "send-connection-notification",
            Self::Support => "send-support-notification",
            Self::ExpertVerification => "send-expert-verification-notification",
            Self::RequestPasswordReset => "request-password-reset",
            Self::ResetPassword => "reset-password",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

impl FromStr for NotificationKind {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "send-interview-notification" => Ok(Self::Interview),
            "send-connection-notification" => Ok(Self::Connection),
            "send-support-notification" => Ok(Self::Support),
            "send-expert-verification-notification" => Ok(Self::ExpertVerification),
            "request-password-reset" => Ok(Self::RequestPasswordReset),
            "reset-password" => Ok(Self::ResetPassword),
            other => Err(StoreError::InvalidValue {
                field: "function_name",
                value: other.to_string(),
            }),
        }
    }
}

/// Build the `{ "type": ..., "<entity>_id": ... }` payload the functions accept
pub fn notification_payload(event_type: &str, entity: &str, entity_id: &str) -> serde_json::Value {
    let mut payload = json!({ "type": event_type });
    payload[format!("{}_id", entity)] = json!(entity_id);
    payload
}

/// Outbox item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxItem {
    pub id: String,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub status: OutboxStatus,
}

impl TryFrom<notification_outbox::Model> for OutboxItem {
    type Error = StoreError;

    fn try_from(model: notification_outbox::Model) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            kind: model.function_name.parse()?,
            payload: serde_json::from_str(&model.payload_json)?,
            status: model.status.parse()?,
            id: model.id,
            queued_at: from_millis(model.queued_at),
            attempts: model.attempts.max(0) as u32,
            max_attempts: model.max_attempts.max(0) as u32,
            last_attempt_at: model.last_attempt_at.map(from_millis),
            next_attempt_at: from_millis(model.next_attempt_at),
            last_error: model.last_error,
        })
    }
}

/// Upper bound on a single retry delay
pub const MAX_BACKOFF_SECONDS: u64 = 24 * 3600;

/// Delay before attempt number `attempts + 1`: `base * 2^attempts`, capped
pub fn backoff_delay(base_seconds: u64, attempts: u32) -> chrono::Duration {
    let factor = 2u64.saturating_pow(attempts);
    let seconds = base_seconds.saturating_mul(factor).min(MAX_BACKOFF_SECONDS);
    chrono::Duration::seconds(seconds as i64)
}

/// Notification outbox
#[derive(Clone)]
pub struct NotificationOutbox {
    db: DatabaseConnection,
    max_attempts: u32,
    retry_base_seconds: u64,
}

impl NotificationOutbox {
    pub fn new(db: DatabaseConnection, config: &StoreConfig) -> Self {
        Self {
            db,
            max_attempts: config.max_notification_attempts,
            retry_base_seconds: config.notification_retry_base_seconds,
        }
    }

    /// Queue a call on `db`, which may be an open transaction
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        kind: NotificationKind,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();

        let item = notification_outbox::ActiveModel {
            id: Set(id.clone()),
            function_name: Set(kind.function_name().to_string()),
            payload_json: Set(serde_json::to_string(&payload)?),
            queued_at: Set(now),
            attempts: Set(0),
            max_attempts: Set(max_attempts as i32),
            last_attempt_at: Set(None),
            next_attempt_at: Set(now),
            last_error: Set(None),
            status: Set(OutboxStatus::Pending.as_str().to_string()),
        };
        notification_outbox::Entity::insert(item)
            .exec_without_returning(db)
            .await?;

        debug!("Queued {} notification {}", kind, id);
        Ok(id)
    }

    /// Queue a call outside of any transaction
    pub async fn push(&self, kind: NotificationKind, payload: serde_json::Value) -> Result<String> {
        Self::enqueue(&self.db, kind, payload, self.max_attempts).await
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pending items whose next attempt is due, oldest first
    pub async fn due(&self, limit: usize) -> Result<Vec<OutboxItem>> {
        let now = Utc::now().timestamp_millis();

        let items = notification_outbox::Entity::find()
            .filter(notification_outbox::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .filter(notification_outbox::Column::NextAttemptAt.lte(now))
            .order_by_asc(notification_outbox::Column::NextAttemptAt)
            .limit(limit as u64)
            .all(&self.db)
            .await?;

        debug!("Found {} notifications due for delivery", items.len());
        items.into_iter().map(OutboxItem::try_from).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<OutboxItem>> {
        notification_outbox::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(OutboxItem::try_from)
            .transpose()
    }

    /// All items in a given status
    pub async fn with_status(&self, status: OutboxStatus) -> Result<Vec<OutboxItem>> {
        let items = notification_outbox::Entity::find()
            .filter(notification_outbox::Column::Status.eq(status.as_str()))
            .order_by_asc(notification_outbox::Column::QueuedAt)
            .all(&self.db)
            .await?;

        items.into_iter().map(OutboxItem::try_from).collect()
    }

    pub async fn mark_delivered(&self, id: &str) -> Result<()> {
        let model = notification_outbox::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotificationNotFound(id.to_string()))?;

        let attempts = model.attempts + 1;
        let mut active: notification_outbox::ActiveModel = model.into();
        active.attempts = Set(attempts);
        active.last_attempt_at = Set(Some(Utc::now().timestamp_millis()));
        active.last_error = Set(None);
        active.status = Set(OutboxStatus::Delivered.as_str().to_string());
        active.update(&self.db).await?;

        debug!("Notification {} delivered", id);
        Ok(())
    }

    /// Record a failed attempt. Returns the resulting status.
    pub async fn record_failure(&self, id: &str, error: &str) -> Result<OutboxStatus> {
        let model = notification_outbox::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotificationNotFound(id.to_string()))?;

        let now = Utc::now();
        let previous_attempts = model.attempts.max(0) as u32;
        let attempts = previous_attempts + 1;
        let max_attempts = model.max_attempts.max(0) as u32;

        let mut active: notification_outbox::ActiveModel = model.into();
        active.attempts = Set(attempts as i32);
        active.last_attempt_at = Set(Some(now.timestamp_millis()));
        active.last_error = Set(Some(error.to_string()));

        let status = if attempts >= max_attempts {
            warn!(
                "Notification {} reached max attempts ({}), marked as expired",
                id, max_attempts
            );
            OutboxStatus::Expired
        } else {
            let delay = backoff_delay(self.retry_base_seconds, previous_attempts);
            active.next_attempt_at = Set((now + delay).timestamp_millis());
            info!(
                "Scheduled retry for notification {} (attempt {}, next in {}s)",
                id,
                attempts + 1,
                delay.num_seconds()
            );
            OutboxStatus::Pending
        };
        active.status = Set(status.as_str().to_string());
        active.update(&self.db).await?;

        Ok(status)
    }

    /// Delete delivered and expired items queued before `older_than`
    pub async fn cleanup_finished(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = notification_outbox::Entity::delete_many()
            .filter(notification_outbox::Column::Status.ne(OutboxStatus::Pending.as_str()))
            .filter(notification_outbox::Column::QueuedAt.lt(older_than.timestamp_millis()))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            info!("Cleaned up {} finished notifications", result.rows_affected);
        }
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(30, 0).num_seconds(), 30);
        assert_eq!(backoff_delay(30, 1).num_seconds(), 60);
        assert_eq!(backoff_delay(30, 4).num_seconds(), 480);
        assert_eq!(
            backoff_delay(30, 200).num_seconds(),
            MAX_BACKOFF_SECONDS as i64
        );
    }

    #[test]
    fn test_payload_shape() {
        let payload = notification_payload("connection_request", "connection", "c-1");
        assert_eq!(payload["type"], "connection_request");
        assert_eq!(payload["connection_id"], "c-1");
    }

    #[test]
    fn test_function_names_parse_back() {
        for kind in [
            NotificationKind::Interview,
            NotificationKind::Connection,
            NotificationKind::Support,
            NotificationKind::ExpertVerification,
            NotificationKind::RequestPasswordReset,
            NotificationKind::ResetPassword,
        ] {
            assert_eq!(kind.function_name().parse::<NotificationKind>().unwrap(), kind);
        }
    }
}
