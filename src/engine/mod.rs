//! Repository order synchronization engine.
//!
//! Decides whether a repository's position needs to change, mutates the
//! remote commit graph to bump the "last updated" timestamp, and rewrites
//! recent history to remove the synthetic commits it just created while
//! preserving the timestamp bump.

pub mod orchestrator;
pub mod rewrite;
pub mod strategy;
pub mod validate;
pub mod verify;

use serde::{Deserialize, Serialize};

use crate::hosting::{GitRef, HostingApi, HostingError, RepoRef};

/// Marker embedded in every synthetic commit message so the history
/// rewriter can identify and excise them later.
pub const SYNC_MARKER: &str = "[repopin]";

/// Prefix for temporary bump branches (branch-merge strategy).
pub const BUMP_BRANCH_PREFIX: &str = "repopin-bump-";

/// Prefix for backup references created before a history rewrite.
pub const BACKUP_BRANCH_PREFIX: &str = "repopin-backup-";

/// Per-repository outcome of a sync run.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SyncResult {
    pub repository: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cleaned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Error,
}

/// Aggregate of one sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub cleaned: usize,
    pub results: Vec<SyncResult>,
    pub step_logs: Vec<String>,
}

impl SyncRunSummary {
    /// Run-level status string for the audit record.
    pub fn status(&self) -> &'static str {
        if self.failed == 0 {
            "success"
        } else if self.successful > 0 {
            "partial"
        } else {
            "error"
        }
    }
}

/// Resolve the default branch reference, trying `main` then `master`.
pub(crate) async fn resolve_default_branch(
    api: &dyn HostingApi,
    repo: &RepoRef,
) -> Result<(String, GitRef), HostingError> {
    match api.get_ref(repo, "main").await {
        Ok(git_ref) => Ok(("main".to_string(), git_ref)),
        Err(HostingError::NotFound(_)) => {
            let git_ref = api.get_ref(repo, "master").await?;
            Ok(("master".to_string(), git_ref))
        }
        Err(err) => Err(err),
    }
}
