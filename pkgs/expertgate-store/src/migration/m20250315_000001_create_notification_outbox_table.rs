use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum NotificationOutbox {
    Table,
    Id,
    FunctionName,
    PayloadJson,
    QueuedAt,
    Attempts,
    MaxAttempts,
    LastAttemptAt,
    NextAttemptAt,
    LastError,
    Status,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250315_000001_create_notification_outbox_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationOutbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationOutbox::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationOutbox::FunctionName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationOutbox::PayloadJson)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationOutbox::QueuedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationOutbox::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationOutbox::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(ColumnDef::new(NotificationOutbox::LastAttemptAt).big_integer())
                    .col(
                        ColumnDef::new(NotificationOutbox::NextAttemptAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationOutbox::LastError).text())
                    .col(
                        ColumnDef::new(NotificationOutbox::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_outbox_next_attempt")
                    .table(NotificationOutbox::Table)
                    .col(NotificationOutbox::Status)
                    .col(NotificationOutbox::NextAttemptAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationOutbox::Table).to_owned())
            .await
    }
}
