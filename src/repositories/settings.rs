//! # Settings Repository
//!
//! Repository operations for the user_settings table. Secret lookup goes
//! through the database index and is then re-confirmed with a constant-time
//! comparison so the match itself does not leak timing information.

use axum::http::StatusCode;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::user_settings::{Column, Entity, Model};

/// Repository for user settings database operations
pub struct SettingsRepository {
    db: DatabaseConnection,
}

impl SettingsRepository {
    /// Create a new SettingsRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Find the settings row owning `sync_secret`, or `None` when the secret
    /// is unknown. Callers must map `None` to a generic 401.
    pub async fn find_by_sync_secret(&self, sync_secret: Uuid) -> Result<Option<Model>, ApiError> {
        let settings = Entity::find()
            .filter(Column::SyncSecret.eq(sync_secret))
            .one(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to look up sync secret: {}", e);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Failed to load settings",
                )
            })?;

        // Re-confirm the fetched row's secret in constant time.
        Ok(settings.filter(|model| {
            model
                .sync_secret
                .as_bytes()
                .ct_eq(sync_secret.as_bytes())
                .into()
        }))
    }
}
