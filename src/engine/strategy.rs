//! Commit strategies for bumping a repository's "last updated" timestamp.
//!
//! Two interchangeable strategies, both tagging their synthetic commits
//! with [`SYNC_MARKER`](super::SYNC_MARKER) so the history rewriter can
//! excise them afterwards. Net content effect of either strategy is zero.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{BUMP_BRANCH_PREFIX, SYNC_MARKER, resolve_default_branch};
use crate::hosting::{CommitRecord, HostingApi, HostingError, NewCommit, RepoRef};

/// Closed choice of timestamp-bump strategy, selected per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStrategy {
    /// Append a same-tree commit then immediately revert it.
    Revert,
    /// Merge a temporary branch carrying one synthetic commit.
    BranchMerge,
}

impl CommitStrategy {
    /// Parse the persisted settings value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "revert" => Some(Self::Revert),
            "branch_merge" => Some(Self::BranchMerge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Revert => "revert",
            Self::BranchMerge => "branch_merge",
        }
    }

    /// Bump `repo`'s default-branch timestamp, returning the new HEAD.
    ///
    /// `position` and `total` only feed the marker message; the message is
    /// what lets the rewriter find these commits again.
    pub async fn bump(
        self,
        api: &dyn HostingApi,
        repo: &RepoRef,
        position: usize,
        total: usize,
    ) -> Result<CommitRecord, HostingError> {
        match self {
            Self::Revert => bump_with_revert(api, repo, position, total).await,
            Self::BranchMerge => bump_with_branch_merge(api, repo, position, total).await,
        }
    }
}

fn marker_message(position: usize, total: usize) -> String {
    format!("chore: pin position {} of {} {}", position, total, SYNC_MARKER)
}

/// Revert strategy: append a commit reusing HEAD's tree, advance the ref,
/// then append a second commit restoring the original tree and advance
/// again. Two marked commits, zero content delta.
async fn bump_with_revert(
    api: &dyn HostingApi,
    repo: &RepoRef,
    position: usize,
    total: usize,
) -> Result<CommitRecord, HostingError> {
    let (branch, head_ref) = resolve_default_branch(api, repo).await?;
    let head = api.get_commit(repo, &head_ref.sha).await?;

    let bump = api
        .create_commit(
            repo,
            NewCommit {
                message: marker_message(position, total),
                tree: head.tree.clone(),
                parents: vec![head.sha.clone()],
                author: None,
                committer: None,
            },
        )
        .await?;
    api.update_ref(repo, &branch, &bump.sha, false).await?;

    let revert = api
        .create_commit(
            repo,
            NewCommit {
                message: format!("revert: restore tree {}", SYNC_MARKER),
                tree: head.tree.clone(),
                parents: vec![bump.sha.clone()],
                author: None,
                committer: None,
            },
        )
        .await?;
    api.update_ref(repo, &branch, &revert.sha, false).await?;

    info!(repo = %repo, branch = %branch, head = %revert.sha, "Bumped timestamp via revert strategy");
    Ok(revert)
}

/// Branch-merge strategy: park one synthetic commit on a temporary branch
/// and merge it back with a real (non-fast-forward) merge commit, then drop
/// the branch. The merge commit carries the marker too.
async fn bump_with_branch_merge(
    api: &dyn HostingApi,
    repo: &RepoRef,
    position: usize,
    total: usize,
) -> Result<CommitRecord, HostingError> {
    let (branch, head_ref) = resolve_default_branch(api, repo).await?;
    let head = api.get_commit(repo, &head_ref.sha).await?;

    let temp_branch = format!("{}{}", BUMP_BRANCH_PREFIX, Utc::now().timestamp_millis());
    api.create_ref(repo, &temp_branch, &head.sha).await?;

    let bump = api
        .create_commit(
            repo,
            NewCommit {
                message: marker_message(position, total),
                tree: head.tree.clone(),
                parents: vec![head.sha.clone()],
                author: None,
                committer: None,
            },
        )
        .await?;
    api.update_ref(repo, &temp_branch, &bump.sha, false).await?;

    let merge = api
        .merge(
            repo,
            &branch,
            &temp_branch,
            &format!("merge: pin position {} of {} {}", position, total, SYNC_MARKER),
        )
        .await?;

    // The branch commit becomes unreachable once the temp ref is gone; the
    // merge commit keeps the timestamp bump.
    if let Err(err) = api.delete_ref(repo, &temp_branch).await {
        debug!(repo = %repo, branch = %temp_branch, ?err, "Failed to delete temporary bump branch");
    }

    info!(repo = %repo, branch = %branch, head = %merge.sha, "Bumped timestamp via branch-merge strategy");
    Ok(merge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parse_round_trips() {
        assert_eq!(CommitStrategy::parse("revert"), Some(CommitStrategy::Revert));
        assert_eq!(
            CommitStrategy::parse("branch_merge"),
            Some(CommitStrategy::BranchMerge)
        );
        assert_eq!(CommitStrategy::parse("rebase"), None);
        assert_eq!(
            CommitStrategy::parse(CommitStrategy::Revert.as_str()),
            Some(CommitStrategy::Revert)
        );
    }

    #[test]
    fn marker_message_is_greppable() {
        let message = marker_message(1, 4);
        assert!(message.contains(SYNC_MARKER));
        assert!(message.contains("1 of 4"));
    }
}
