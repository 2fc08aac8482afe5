use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum CollaborationPosts {
    Table,
    Id,
    AuthorId,
    Title,
    Description,
    FieldOfStudyJson,
    Status,
    CreatedAt,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250308_000001_create_collaboration_posts_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CollaborationPosts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CollaborationPosts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CollaborationPosts::AuthorId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CollaborationPosts::Title).string().not_null())
                    .col(
                        ColumnDef::new(CollaborationPosts::Description)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollaborationPosts::FieldOfStudyJson)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(CollaborationPosts::Status)
                            .string()
                            .not_null()
                            .default("open"),
                    )
                    .col(
                        ColumnDef::new(CollaborationPosts::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CollaborationPosts::Table).to_owned())
            .await
    }
}
