//! Profile entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub full_name: String,
    pub institution: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: String,                // "researcher" or "expert"
    pub verification_status: String, // "pending", "verified" or "rejected"
    pub is_admin: bool,
    pub is_deleted: bool, // soft delete, row is kept for joins
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
