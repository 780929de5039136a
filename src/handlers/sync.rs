//! # Sync Trigger Handler
//!
//! `POST /sync/{secret}` runs one full order-synchronization pass for the
//! user owning the secret. The secret is the only credential on the request;
//! lookup failures are reported as a generic 401 so the endpoint does not
//! confirm which secrets exist.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::engine::orchestrator::{Pacing, RunOutcome, SyncOrchestrator};
use crate::engine::strategy::CommitStrategy;
use crate::engine::validate::parse_repo;
use crate::engine::{SyncResult, SyncRunSummary};
use crate::error::{ApiError, unauthorized, validation_error};
use crate::hosting::{HostingError, RepoRef};
use crate::models::user_settings::Model as UserSettings;
use crate::repositories::{AuditRepository, SettingsRepository};
use crate::server::AppState;

/// Response when the user has disabled webhook-triggered runs
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncDisabledResponse {
    pub message: String,
}

/// Response when the listing already matched the desired order
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncSkippedResponse {
    pub skipped: bool,
    pub current_order: Vec<String>,
    pub desired_order: Vec<String>,
}

/// Response after a run that attempted bumps
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncCompletedResponse {
    pub success: bool,
    pub synced: usize,
    pub failed: usize,
    pub results: Vec<SyncResult>,
}

/// Trigger a sync run for the user owning `secret`
#[utoipa::path(
    post,
    path = "/sync/{secret}",
    params(
        ("secret" = String, Path, description = "Per-user sync secret (UUID)")
    ),
    responses(
        (status = 200, description = "Run skipped, completed, or sync disabled"),
        (status = 400, description = "Malformed secret or invalid stored settings"),
        (status = 401, description = "Unknown secret or expired hosting credential"),
        (status = 409, description = "A run for this secret is already in progress"),
        (status = 429, description = "Too many trigger requests in the current window"),
        (status = 502, description = "Hosting provider error during the run")
    ),
    tag = "sync"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(secret): Path<String>,
) -> Result<Response, ApiError> {
    let secret_uuid = Uuid::parse_str(&secret).map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "Malformed sync secret",
        )
    })?;

    let settings_repo = SettingsRepository::new(state.db.clone());
    let settings = settings_repo
        .find_by_sync_secret(secret_uuid)
        .await?
        .ok_or_else(|| unauthorized(None))?;

    if !settings.auto_enabled {
        info!(user_id = %settings.user_id, "Sync trigger received but sync is disabled");
        return Ok(Json(SyncDisabledResponse {
            message: "Sync disabled".to_string(),
        })
        .into_response());
    }

    let decision = state.rate_limiter.check(
        &secret,
        Duration::from_millis(state.config.sync.rate_limit_window_ms),
        state.config.sync.rate_limit_max_requests,
    );
    if !decision.allowed {
        let retry_after = (decision.reset_at - chrono::Utc::now())
            .num_seconds()
            .max(0) as u64;
        warn!(user_id = %settings.user_id, retry_after, "Sync trigger rate limited");
        return Ok(rate_limited_response(
            retry_after,
            decision.remaining,
            decision.reset_at.timestamp(),
        ));
    }

    let run_config = RunConfig::from_settings(&settings)?;

    let token = settings.access_token.as_deref().ok_or_else(|| {
        unauthorized(Some("No hosting credential on file; please reauthorize"))
    })?;

    let Some(_guard) = state.run_locks.try_acquire(settings.id).await else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "CONFLICT",
            "A sync run for this account is already in progress",
        ));
    };

    let audit = AuditLogger::new(AuditRepository::new(state.db.clone()));
    let api = state.hosting.client(token);
    let orchestrator = SyncOrchestrator::new(
        api.as_ref(),
        Pacing {
            between_repos: Duration::from_millis(state.config.sync.bump_delay_ms),
        },
        state.config.sync.cleanup_window,
    );

    let outcome = orchestrator
        .run(&run_config.desired, run_config.top_n, run_config.strategy)
        .await;

    match outcome {
        Ok(RunOutcome::Skipped { current, desired }) => {
            audit.record_skipped(settings.user_id, &current, &desired).await;
            Ok(Json(SyncSkippedResponse {
                skipped: true,
                current_order: current.iter().map(RepoRef::full_name).collect(),
                desired_order: desired.iter().map(RepoRef::full_name).collect(),
            })
            .into_response())
        }
        Ok(RunOutcome::Completed(summary)) => {
            audit.record_completed(settings.user_id, &summary).await;
            Ok(Json(completed_response(&summary)).into_response())
        }
        Err(err) => {
            audit.record_failure(settings.user_id, &err.to_string()).await;
            Err(map_run_error(err))
        }
    }
}

fn completed_response(summary: &SyncRunSummary) -> SyncCompletedResponse {
    SyncCompletedResponse {
        success: summary.failed == 0,
        synced: summary.successful,
        failed: summary.failed,
        results: summary.results.clone(),
    }
}

fn rate_limited_response(retry_after: u64, remaining: u32, reset_at: i64) -> Response {
    let mut response = ApiError::new(
        StatusCode::TOO_MANY_REQUESTS,
        "RATE_LIMITED",
        "Too many sync requests; try again later",
    )
    .with_retry_after(retry_after)
    .into_response();

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", value);
    }
    response
}

/// Map a run-aborting hosting error to the outward status. Upstream message
/// text stays in the server log only.
fn map_run_error(err: HostingError) -> ApiError {
    match err {
        HostingError::Unauthorized => {
            unauthorized(Some("Hosting credential rejected; please reauthorize"))
        }
        HostingError::RateLimited { retry_after_secs } => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "PROVIDER_ERROR",
            "Hosting provider rate limit reached",
        )
        .with_retry_after(retry_after_secs.unwrap_or(60)),
        other => {
            error!(error = %other, "Sync run failed against hosting provider");
            ApiError::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                "Hosting provider request failed",
            )
        }
    }
}

/// Stored settings decoded into run inputs, validated up front.
#[derive(Debug)]
struct RunConfig {
    desired: Vec<RepoRef>,
    top_n: usize,
    strategy: CommitStrategy,
}

impl RunConfig {
    fn from_settings(settings: &UserSettings) -> Result<Self, ApiError> {
        let names: Vec<String> = match &settings.desired_order {
            JsonValue::Array(values) => values
                .iter()
                .map(|value| {
                    value.as_str().map(str::to_string).ok_or_else(|| {
                        validation_error(
                            "Stored repository order is malformed",
                            serde_json::json!({ "desired_order": "expected an array of strings" }),
                        )
                    })
                })
                .collect::<Result<_, _>>()?,
            _ => {
                return Err(validation_error(
                    "Stored repository order is malformed",
                    serde_json::json!({ "desired_order": "expected a JSON array" }),
                ));
            }
        };

        if names.is_empty() {
            return Err(validation_error(
                "Repository order is empty",
                serde_json::json!({ "desired_order": "at least one repository required" }),
            ));
        }

        let desired: Vec<RepoRef> = names
            .iter()
            .map(|name| {
                parse_repo(name).ok_or_else(|| {
                    validation_error(
                        "Invalid repository name in stored order",
                        serde_json::json!({ "repository": name }),
                    )
                })
            })
            .collect::<Result<_, _>>()?;

        let top_n = usize::try_from(settings.top_n)
            .ok()
            .filter(|n| (1..=desired.len()).contains(n))
            .ok_or_else(|| {
                validation_error(
                    "Invalid top_n for stored order",
                    serde_json::json!({ "top_n": settings.top_n }),
                )
            })?;

        let strategy = CommitStrategy::parse(&settings.strategy).ok_or_else(|| {
            validation_error(
                "Unknown commit strategy",
                serde_json::json!({ "strategy": settings.strategy }),
            )
        })?;

        Ok(Self {
            desired,
            top_n,
            strategy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::prelude::DateTimeWithTimeZone;

    fn settings(desired_order: JsonValue, top_n: i32, strategy: &str) -> UserSettings {
        let now = DateTimeWithTimeZone::from(chrono::Utc::now());
        UserSettings {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            sync_secret: Uuid::new_v4(),
            desired_order,
            top_n,
            strategy: strategy.to_string(),
            auto_enabled: true,
            access_token: Some("token".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn run_config_parses_valid_settings() {
        let model = settings(
            serde_json::json!(["alice/alpha", "alice/beta"]),
            2,
            "revert",
        );
        let config = RunConfig::from_settings(&model).expect("valid settings");
        assert_eq!(config.desired.len(), 2);
        assert_eq!(config.top_n, 2);
        assert_eq!(config.strategy, CommitStrategy::Revert);
    }

    #[test]
    fn run_config_rejects_traversal_names() {
        let model = settings(serde_json::json!(["alice/../secret"]), 1, "revert");
        let err = RunConfig::from_settings(&model).expect_err("must reject");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn run_config_rejects_top_n_beyond_order() {
        let model = settings(serde_json::json!(["alice/alpha"]), 5, "revert");
        assert!(RunConfig::from_settings(&model).is_err());
    }

    #[test]
    fn run_config_rejects_unknown_strategy() {
        let model = settings(serde_json::json!(["alice/alpha"]), 1, "rebase");
        assert!(RunConfig::from_settings(&model).is_err());
    }

    #[test]
    fn run_config_rejects_non_array_order() {
        let model = settings(serde_json::json!({"repos": []}), 1, "revert");
        assert!(RunConfig::from_settings(&model).is_err());
    }
}
