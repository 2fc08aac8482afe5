//! Sea-ORM migrations for expertgate-store database schema

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_profiles_table;
mod m20250301_000002_create_expert_connections_table;
mod m20250301_000003_create_messages_table;
mod m20250308_000001_create_collaboration_posts_table;
mod m20250308_000002_create_collaboration_applications_table;
mod m20250308_000003_create_project_groups_table;
mod m20250315_000001_create_notification_outbox_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_profiles_table::Migration),
            Box::new(m20250301_000002_create_expert_connections_table::Migration),
            Box::new(m20250301_000003_create_messages_table::Migration),
            Box::new(m20250308_000001_create_collaboration_posts_table::Migration),
            Box::new(m20250308_000002_create_collaboration_applications_table::Migration),
            Box::new(m20250308_000003_create_project_groups_table::Migration),
            Box::new(m20250315_000001_create_notification_outbox_table::Migration),
        ]
    }
}
