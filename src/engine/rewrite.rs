//! History rewrite: removes synthetic marker commits from the tip of a
//! branch by rebuilding the unmarked commits on top of the oldest untouched
//! ancestor and force-updating the ref.
//!
//! The planner is pure so its parent-remapping logic can be tested without
//! any hosting fakes; the executor applies a plan through [`HostingApi`].

use chrono::Utc;
use tracing::{info, warn};

use super::{BACKUP_BRANCH_PREFIX, SYNC_MARKER, resolve_default_branch};
use crate::hosting::{CommitRecord, HostingApi, HostingError, NewCommit, RepoRef};

/// Parent slot of a rebuilt commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// An untouched commit that survives as-is; referenced by sha.
    Existing(String),
    /// A commit that will itself be rebuilt; referenced by its index in
    /// [`RewritePlan::rebuilt`].
    Rebuilt(usize),
}

/// A commit to recreate with remapped parents.
#[derive(Debug, Clone)]
pub struct PlannedCommit {
    pub source: CommitRecord,
    pub parents: Vec<Parent>,
}

#[derive(Debug, Default)]
pub struct RewritePlan {
    /// Commits to recreate, oldest first. The last entry becomes the new HEAD.
    pub rebuilt: Vec<PlannedCommit>,
    /// Marked commits dropped from history.
    pub removed: Vec<String>,
}

impl RewritePlan {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() || self.rebuilt.is_empty()
    }
}

/// Outcome of a cleanup pass over one repository.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CleanupReport {
    pub removed: usize,
    pub new_head: Option<String>,
}

/// Plan the rewrite of a window of commits, oldest first.
///
/// Commits whose message contains `marker` are dropped; every surviving
/// commit keeps its message, tree and author but has any dropped parent
/// replaced by that parent's own (surviving) parent. A dropped commit with
/// no replacement (a marked root) simply vanishes from its children's
/// parent lists, so the first survivor above it is recreated as a root.
pub fn plan_rewrite(commits_oldest_first: &[CommitRecord], marker: &str) -> RewritePlan {
    let mut plan = RewritePlan::default();
    // sha of each dropped commit -> the parent slot that should replace it,
    // or None when there is nothing to point at.
    let mut remap: std::collections::HashMap<String, Option<Parent>> =
        std::collections::HashMap::new();
    // sha of each kept commit -> its index in plan.rebuilt
    let mut kept: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for commit in commits_oldest_first {
        if commit.message.contains(marker) {
            // Point anything that referenced this commit at its first parent,
            // following earlier remaps so runs of marked commits collapse.
            let replacement = commit
                .parents
                .first()
                .and_then(|parent| resolve_parent(parent, &remap, &kept))
                .or_else(|| plan.rebuilt.len().checked_sub(1).map(Parent::Rebuilt));
            remap.insert(commit.sha.clone(), replacement);
            plan.removed.push(commit.sha.clone());
            continue;
        }

        let mut parents: Vec<Parent> = commit
            .parents
            .iter()
            .filter_map(|parent| resolve_parent(parent, &remap, &kept))
            .collect();
        parents.dedup();
        if parents.is_empty() && !plan.rebuilt.is_empty() {
            parents.push(Parent::Rebuilt(plan.rebuilt.len() - 1));
        }

        kept.insert(commit.sha.clone(), plan.rebuilt.len());
        plan.rebuilt.push(PlannedCommit {
            source: commit.clone(),
            parents,
        });
    }

    plan
}

fn resolve_parent(
    sha: &str,
    remap: &std::collections::HashMap<String, Option<Parent>>,
    kept: &std::collections::HashMap<String, usize>,
) -> Option<Parent> {
    if let Some(replacement) = remap.get(sha) {
        return replacement.clone();
    }
    if let Some(index) = kept.get(sha) {
        return Some(Parent::Rebuilt(*index));
    }
    // Outside the fetched window; keep the sha untouched.
    Some(Parent::Existing(sha.to_string()))
}

/// Remove synthetic commits from `repo`'s default branch.
///
/// Fetches the newest `window` commits, plans the rewrite, and if anything
/// is to be removed: records a backup ref at the current HEAD, recreates the
/// surviving commits oldest to newest, and force-updates the branch. Returns
/// `{removed: 0, new_head: None}` without touching the ref when no marked
/// commits are present or when every commit in the window is synthetic.
pub async fn cleanup(
    api: &dyn HostingApi,
    repo: &RepoRef,
    window: usize,
) -> Result<CleanupReport, HostingError> {
    let (branch, head_ref) = resolve_default_branch(api, repo).await?;
    let mut commits = api.list_commits(repo, &branch, window).await?;
    // list_commits returns newest first; the planner walks oldest first.
    commits.reverse();

    let plan = plan_rewrite(&commits, SYNC_MARKER);
    if plan.is_noop() {
        if !plan.removed.is_empty() {
            warn!(
                repo = %repo,
                window,
                "Every commit in the window is synthetic; refusing to rewrite"
            );
        }
        return Ok(CleanupReport {
            removed: 0,
            new_head: None,
        });
    }

    let backup = format!("{}{}", BACKUP_BRANCH_PREFIX, Utc::now().timestamp_millis());
    api.create_ref(repo, &backup, &head_ref.sha).await?;
    info!(repo = %repo, backup = %backup, head = %head_ref.sha, "Recorded backup ref before rewrite");

    let mut new_shas: Vec<String> = Vec::with_capacity(plan.rebuilt.len());
    for planned in &plan.rebuilt {
        let mut parents = Vec::with_capacity(planned.parents.len());
        for parent in &planned.parents {
            let sha = match parent {
                Parent::Existing(sha) => sha.clone(),
                Parent::Rebuilt(index) => {
                    new_shas
                        .get(*index)
                        .cloned()
                        .ok_or_else(|| HostingError::Api {
                            status: 500,
                            message: format!("rewrite plan referenced unbuilt commit {index}"),
                        })?
                }
            };
            parents.push(sha);
        }
        let created = api
            .create_commit(
                repo,
                NewCommit {
                    message: planned.source.message.clone(),
                    tree: planned.source.tree.clone(),
                    parents,
                    author: planned.source.author.clone(),
                    committer: planned.source.committer.clone(),
                },
            )
            .await?;
        new_shas.push(created.sha);
    }

    let new_head = new_shas
        .last()
        .cloned()
        .ok_or_else(|| HostingError::Api {
            status: 500,
            message: "rewrite plan produced no commits".to_string(),
        })?;
    api.update_ref(repo, &branch, &new_head, true).await?;
    info!(
        repo = %repo,
        branch = %branch,
        removed = plan.removed.len(),
        new_head = %new_head,
        "Rewrote history to drop synthetic commits"
    );

    Ok(CleanupReport {
        removed: plan.removed.len(),
        new_head: Some(new_head),
    })
}
