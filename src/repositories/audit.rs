//! # Audit Repository
//!
//! Append-only repository operations for the audit_entries table.

use axum::http::StatusCode;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use sea_orm::DatabaseConnection;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::audit_entry::{ActiveModel, Model};

/// Repository for audit entry database operations
pub struct AuditRepository {
    db: DatabaseConnection,
}

impl AuditRepository {
    /// Create a new AuditRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append one audit entry.
    pub async fn record(
        &self,
        user_id: Uuid,
        action: &str,
        status: &str,
        details: Option<JsonValue>,
        repositories_affected: i32,
    ) -> Result<Model, ApiError> {
        let entry = ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            action: Set(action.to_string()),
            status: Set(status.to_string()),
            details: Set(details),
            repositories_affected: Set(repositories_affected),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = entry.insert(&self.db).await.map_err(|e| {
            tracing::error!("Failed to record audit entry: {}", e);
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Failed to record audit entry",
            )
        })?;

        tracing::info!(
            user_id = %user_id,
            action = %result.action,
            status = %result.status,
            entry_id = %result.id,
            "Audit entry recorded"
        );

        Ok(result)
    }
}
