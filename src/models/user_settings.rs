//! UserSettings entity model
//!
//! This module contains the SeaORM entity model for the user_settings table,
//! which holds each user's sync configuration and hosting credential.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// UserSettings entity holding a user's ordering preferences and credential
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_settings")]
pub struct Model {
    /// Unique identifier for the settings row (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user identifier
    pub user_id: Uuid,

    /// Per-user webhook secret embedded in the sync URL
    #[sea_orm(unique)]
    pub sync_secret: Uuid,

    /// Desired repository ordering as a JSON array of "owner/name" strings
    #[sea_orm(column_type = "JsonBinary")]
    pub desired_order: JsonValue,

    /// Number of leading positions that must match before a run is skipped
    pub top_n: i32,

    /// Commit strategy slug ("revert" or "branch_merge")
    pub strategy: String,

    /// Whether webhook-triggered runs are enabled for this user
    pub auto_enabled: bool,

    /// Hosting API token, written by the auth layer; never logged
    pub access_token: Option<String>,

    /// Timestamp when the settings row was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the settings row was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
