//! Migration to create the user_settings table.
//!
//! This migration creates the user_settings table which holds each user's
//! desired repository ordering, commit strategy, sync secret, and hosting
//! credential.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserSettings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserSettings::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(UserSettings::SyncSecret)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(UserSettings::DesiredOrder)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSettings::TopN)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(UserSettings::Strategy)
                            .text()
                            .not_null()
                            .default("revert"),
                    )
                    .col(
                        ColumnDef::new(UserSettings::AutoEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(UserSettings::AccessToken).text().null())
                    .col(
                        ColumnDef::new(UserSettings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UserSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Secret lookup is the hot path for the trigger endpoint
        manager
            .create_index(
                Index::create()
                    .name("idx_user_settings_sync_secret")
                    .table(UserSettings::Table)
                    .col(UserSettings::SyncSecret)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_settings_user_id")
                    .table(UserSettings::Table)
                    .col(UserSettings::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_user_settings_sync_secret")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_user_settings_user_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(UserSettings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserSettings {
    Table,
    Id,
    UserId,
    SyncSecret,
    DesiredOrder,
    TopN,
    Strategy,
    AutoEnabled,
    AccessToken,
    CreatedAt,
    UpdatedAt,
}
