use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum ProjectGroups {
    Table,
    Id,
    PostId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ProjectGroupMembers {
    Table,
    Id,
    GroupId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(DeriveIden)]
enum CollaborationPosts {
    Table,
    Id,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250308_000003_create_project_groups_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProjectGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectGroups::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProjectGroups::PostId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ProjectGroups::Name).string().not_null())
                    .col(
                        ColumnDef::new(ProjectGroups::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_groups_post")
                            .from(ProjectGroups::Table, ProjectGroups::PostId)
                            .to(CollaborationPosts::Table, CollaborationPosts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProjectGroupMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectGroupMembers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProjectGroupMembers::GroupId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectGroupMembers::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProjectGroupMembers::Role).string().not_null())
                    .col(
                        ColumnDef::new(ProjectGroupMembers::JoinedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_members_group")
                            .from(ProjectGroupMembers::Table, ProjectGroupMembers::GroupId)
                            .to(ProjectGroups::Table, ProjectGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_members_group_user")
                    .table(ProjectGroupMembers::Table)
                    .col(ProjectGroupMembers::GroupId)
                    .col(ProjectGroupMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectGroupMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectGroups::Table).to_owned())
            .await
    }
}
