//! AuditEntry entity model
//!
//! This module contains the SeaORM entity model for the audit_entries table,
//! an append-only record of sync runs and their outcomes.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// AuditEntry entity recording one sync run
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_entries")]
pub struct Model {
    /// Unique identifier for the audit entry (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User the recorded run belongs to
    pub user_id: Uuid,

    /// Action name (e.g., sync_run)
    pub action: String,

    /// Run-level status (success, partial, error, skipped)
    pub status: String,

    /// Structured details: step logs and per-repository results
    #[sea_orm(column_type = "JsonBinary")]
    pub details: Option<JsonValue>,

    /// Number of repositories mutated during the run
    pub repositories_affected: i32,

    /// Timestamp when the entry was recorded
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
