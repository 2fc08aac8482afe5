//! Notification outbox entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub function_name: String,
    pub payload_json: String,
    pub queued_at: i64,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_attempt_at: Option<i64>,
    pub next_attempt_at: i64,
    pub last_error: Option<String>,
    pub status: String, // "pending", "delivered" or "expired"
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
