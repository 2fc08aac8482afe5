use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum CollaborationApplications {
    Table,
    Id,
    PostId,
    ApplicantId,
    Message,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CollaborationPosts {
    Table,
    Id,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250308_000002_create_collaboration_applications_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CollaborationApplications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CollaborationApplications::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CollaborationApplications::PostId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollaborationApplications::ApplicantId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollaborationApplications::Message)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollaborationApplications::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(CollaborationApplications::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_applications_post")
                            .from(
                                CollaborationApplications::Table,
                                CollaborationApplications::PostId,
                            )
                            .to(CollaborationPosts::Table, CollaborationPosts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One application per (post, applicant)
        manager
            .create_index(
                Index::create()
                    .name("idx_applications_post_applicant")
                    .table(CollaborationApplications::Table)
                    .col(CollaborationApplications::PostId)
                    .col(CollaborationApplications::ApplicantId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(CollaborationApplications::Table)
                    .to_owned(),
            )
            .await
    }
}
