//! Migration to create the audit_entries table.
//!
//! This migration creates the append-only audit_entries table recording
//! sync runs and their outcomes per user.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditEntries::UserId).uuid().not_null())
                    .col(ColumnDef::new(AuditEntries::Action).text().not_null())
                    .col(ColumnDef::new(AuditEntries::Status).text().not_null())
                    .col(ColumnDef::new(AuditEntries::Details).json_binary().null())
                    .col(
                        ColumnDef::new(AuditEntries::RepositoriesAffected)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AuditEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Per-user history views, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_audit_entries_user_created")
                    .table(AuditEntries::Table)
                    .col(AuditEntries::UserId)
                    .col(AuditEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_audit_entries_user_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AuditEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuditEntries {
    Table,
    Id,
    UserId,
    Action,
    Status,
    Details,
    RepositoriesAffected,
    CreatedAt,
}
