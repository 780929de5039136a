//! Audit trail for sync runs.
//!
//! Every webhook-triggered run leaves one entry describing what happened,
//! whether it mutated anything, and the per-repository outcomes. Audit
//! failures are logged but never fail the run that produced them.

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::engine::SyncRunSummary;
use crate::hosting::RepoRef;
use crate::repositories::AuditRepository;

pub const ACTION_SYNC_RUN: &str = "sync_run";

pub struct AuditLogger {
    repository: AuditRepository,
}

impl AuditLogger {
    pub fn new(repository: AuditRepository) -> Self {
        Self { repository }
    }

    /// Record a run that was skipped because the listing already matched.
    pub async fn record_skipped(&self, user_id: Uuid, current: &[RepoRef], desired: &[RepoRef]) {
        let details = json!({
            "skipped": true,
            "current_order": current.iter().map(RepoRef::full_name).collect::<Vec<_>>(),
            "desired_order": desired.iter().map(RepoRef::full_name).collect::<Vec<_>>(),
        });
        self.record(user_id, "skipped", Some(details), 0).await;
    }

    /// Record a completed run with its per-repository results.
    pub async fn record_completed(&self, user_id: Uuid, summary: &SyncRunSummary) {
        let details = json!({
            "step_logs": summary.step_logs,
            "results": summary.results,
            "cleaned": summary.cleaned,
        });
        self.record(
            user_id,
            summary.status(),
            Some(details),
            summary.successful as i32,
        )
        .await;
    }

    /// Record a run that failed before any repository was processed.
    pub async fn record_failure(&self, user_id: Uuid, reason: &str) {
        self.record(user_id, "error", Some(json!({ "reason": reason })), 0)
            .await;
    }

    async fn record(
        &self,
        user_id: Uuid,
        status: &str,
        details: Option<serde_json::Value>,
        repositories_affected: i32,
    ) {
        if let Err(err) = self
            .repository
            .record(user_id, ACTION_SYNC_RUN, status, details, repositories_affected)
            .await
        {
            warn!(user_id = %user_id, status = %status, error = %err, "Failed to write audit entry");
        }
    }
}
