use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum ExpertConnections {
    Table,
    Id,
    RequesterId,
    RecipientId,
    Status,
    ConnectionType,
    HasUnreadForRequester,
    HasUnreadForRecipient,
    CreatedAt,
    UpdatedAt,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000002_create_expert_connections_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExpertConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpertConnections::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExpertConnections::RequesterId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpertConnections::RecipientId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpertConnections::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ExpertConnections::ConnectionType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpertConnections::HasUnreadForRequester)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ExpertConnections::HasUnreadForRecipient)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ExpertConnections::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpertConnections::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_expert_connections_requester")
                    .table(ExpertConnections::Table)
                    .col(ExpertConnections::RequesterId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_expert_connections_recipient_status")
                    .table(ExpertConnections::Table)
                    .col(ExpertConnections::RecipientId)
                    .col(ExpertConnections::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExpertConnections::Table).to_owned())
            .await
    }
}
