//! Sync run orchestration.
//!
//! Drives one full run: verify current ordering, bump each managed repository
//! in reverse desired order (so the first-listed repository ends up with the
//! newest timestamp), then rewrite each touched repository's history to
//! remove the synthetic commits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info};
use uuid::Uuid;

use super::rewrite;
use super::strategy::CommitStrategy;
use super::verify;
use super::{SyncResult, SyncRunSummary, SyncStatus};
use crate::hosting::{HostingApi, HostingError, RepoRef};

/// Delay applied between repository bumps, so the host observes strictly
/// increasing push timestamps. Injected so tests can run without sleeping.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub between_repos: Duration,
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            between_repos: Duration::ZERO,
        }
    }
}

/// Outcome of a run request.
#[derive(Debug)]
pub enum RunOutcome {
    /// The listing already matched the desired order; nothing was mutated.
    Skipped {
        current: Vec<RepoRef>,
        desired: Vec<RepoRef>,
    },
    /// Bumps were attempted; per-repo results are in the summary.
    Completed(SyncRunSummary),
}

pub struct SyncOrchestrator<'a> {
    api: &'a dyn HostingApi,
    pacing: Pacing,
    cleanup_window: usize,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(api: &'a dyn HostingApi, pacing: Pacing, cleanup_window: usize) -> Self {
        Self {
            api,
            pacing,
            cleanup_window,
        }
    }

    /// Execute one sync run for `desired` using `strategy`.
    ///
    /// Repository failures are isolated: a bump failure is recorded in that
    /// repository's result and the run moves on; a cleanup failure only
    /// clears the `cleaned` flag. Errors from the initial order check abort
    /// the whole run since nothing has been mutated yet.
    pub async fn run(
        &self,
        desired: &[RepoRef],
        top_n: usize,
        strategy: CommitStrategy,
    ) -> Result<RunOutcome, HostingError> {
        let check = verify::check_order(self.api, desired, top_n).await?;
        if check.already_ordered {
            counter!("sync_runs_skipped_total").increment(1);
            info!(top_n, "Listing already matches desired order; skipping run");
            return Ok(RunOutcome::Skipped {
                current: check.current_order,
                desired: desired.to_vec(),
            });
        }

        let mut summary = SyncRunSummary {
            total: desired.len(),
            successful: 0,
            failed: 0,
            cleaned: 0,
            results: Vec::with_capacity(desired.len()),
            step_logs: Vec::new(),
        };
        summary.step_logs.push(format!(
            "order check: current top-{} differs from desired, proceeding",
            top_n
        ));

        // Reverse order: the last-bumped repository surfaces first in a
        // recency-sorted listing.
        for (reverse_index, repo) in desired.iter().rev().enumerate() {
            let position = desired.len() - reverse_index;

            if reverse_index > 0 && !self.pacing.between_repos.is_zero() {
                tokio::time::sleep(self.pacing.between_repos).await;
            }

            let result = self
                .sync_one(repo, position, desired.len(), strategy, &mut summary.step_logs)
                .await;
            match result.status {
                SyncStatus::Success => summary.successful += 1,
                SyncStatus::Error => summary.failed += 1,
            }
            if result.cleaned {
                summary.cleaned += 1;
            }
            summary.results.push(result);
        }

        // Handler renders results in desired order.
        summary.results.reverse();
        counter!("sync_repos_synced_total").increment(summary.successful as u64);
        counter!("sync_repos_failed_total").increment(summary.failed as u64);
        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            cleaned = summary.cleaned,
            "Sync run completed"
        );
        Ok(RunOutcome::Completed(summary))
    }

    async fn sync_one(
        &self,
        repo: &RepoRef,
        position: usize,
        total: usize,
        strategy: CommitStrategy,
        step_logs: &mut Vec<String>,
    ) -> SyncResult {
        let head = match strategy.bump(self.api, repo, position, total).await {
            Ok(head) => head,
            Err(err) => {
                // Upstream error text stays in the server log; the recorded
                // result carries only a generic description.
                error!(repo = %repo, ?err, "Timestamp bump failed");
                step_logs.push(format!("{}: bump failed: {}", repo, generic_error(&err)));
                return SyncResult {
                    repository: repo.full_name(),
                    status: SyncStatus::Error,
                    error: Some(generic_error(&err).to_string()),
                    cleaned: false,
                };
            }
        };
        step_logs.push(format!("{}: bumped to {}", repo, head.sha));

        match rewrite::cleanup(self.api, repo, self.cleanup_window).await {
            Ok(report) => {
                step_logs.push(format!(
                    "{}: cleanup removed {} synthetic commit(s)",
                    repo, report.removed
                ));
                SyncResult {
                    repository: repo.full_name(),
                    status: SyncStatus::Success,
                    error: None,
                    cleaned: report.removed > 0,
                }
            }
            Err(err) => {
                // The bump succeeded, so the position is correct; the marked
                // commits stay visible until a later run cleans them. Cleanup
                // is best-effort and never demotes the repository's result.
                error!(repo = %repo, ?err, "History cleanup failed after bump");
                step_logs.push(format!("{}: cleanup failed: {}", repo, err));
                SyncResult {
                    repository: repo.full_name(),
                    status: SyncStatus::Success,
                    error: None,
                    cleaned: false,
                }
            }
        }
    }
}

/// Caller-facing description of a hosting failure, stripped of upstream
/// response text.
fn generic_error(err: &HostingError) -> &'static str {
    match err {
        HostingError::Unauthorized => "authorization rejected by hosting provider",
        HostingError::RateLimited { .. } => "hosting provider rate limit reached",
        HostingError::NotFound(_) => "repository or branch not found",
        _ => "hosting provider request failed",
    }
}

/// Per-user run locks. A second request for the same settings row while a
/// run is in flight gets `None` instead of queueing behind the first.
#[derive(Default)]
pub struct RunLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn try_acquire(&self, id: Uuid) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id).or_default())
        };
        lock.try_lock_owned().ok()
    }
}
