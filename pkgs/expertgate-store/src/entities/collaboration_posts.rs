//! Collaboration post entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collaboration_posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub description: String,
    pub field_of_study_json: String, // ordered list of tags as JSON
    pub status: String,              // "open" or "closed"
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::collaboration_applications::Entity")]
    Applications,
    #[sea_orm(has_many = "super::project_groups::Entity")]
    ProjectGroups,
}

impl Related<super::collaboration_applications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl Related<super::project_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
