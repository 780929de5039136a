//! Hosting-provider capability interface.
//!
//! The sync engine only ever talks to the remote object store through
//! [`HostingApi`], a narrow trait over the handful of operations the engine
//! needs. Production uses the GitHub implementation in [`github`]; tests run
//! the whole engine against an in-memory fake implementing the same trait.

pub mod github;

pub use github::{GithubClient, GithubFactory};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies a remote repository as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new<S: Into<String>>(owner: S, name: S) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Author or committer identity attached to a commit object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
}

/// Read view of a remote commit object. Never mutated; new commits are
/// always created fresh, consistent with the append-only object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub tree: String,
    pub parents: Vec<String>,
    pub author: Option<GitIdentity>,
    pub committer: Option<GitIdentity>,
}

/// Payload for creating a commit object.
#[derive(Debug, Clone)]
pub struct NewCommit {
    pub message: String,
    pub tree: String,
    pub parents: Vec<String>,
    /// Identity overrides; `None` lets the provider attribute the
    /// authenticated user.
    pub author: Option<GitIdentity>,
    pub committer: Option<GitIdentity>,
}

/// A named mutable pointer to a commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    pub name: String,
    pub sha: String,
}

/// Errors surfaced by hosting-provider calls.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("upstream authorization rejected")]
    Unauthorized,
    #[error("rate limited by hosting provider")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("provider API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed provider response: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Narrow surface of the hosting provider's git data API.
///
/// All operations are idempotent-safe to retry except `create_commit`,
/// which simply creates a fresh object each time (harmless duplication).
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Resolve a branch reference to its current commit sha.
    async fn get_ref(&self, repo: &RepoRef, branch: &str) -> Result<GitRef, HostingError>;

    /// Read a commit object.
    async fn get_commit(&self, repo: &RepoRef, sha: &str) -> Result<CommitRecord, HostingError>;

    /// Create a commit object; returns the stored record with its sha.
    async fn create_commit(
        &self,
        repo: &RepoRef,
        commit: NewCommit,
    ) -> Result<CommitRecord, HostingError>;

    /// Advance (or with `force`, rewrite) a branch reference.
    async fn update_ref(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> Result<(), HostingError>;

    /// Create a new branch reference pointing at `sha`.
    async fn create_ref(&self, repo: &RepoRef, branch: &str, sha: &str)
    -> Result<(), HostingError>;

    /// Delete a branch reference.
    async fn delete_ref(&self, repo: &RepoRef, branch: &str) -> Result<(), HostingError>;

    /// Merge `head` into `base` with a real merge commit (never
    /// fast-forward), returning the merge commit.
    async fn merge(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
        message: &str,
    ) -> Result<CommitRecord, HostingError>;

    /// List the most recent commits reachable from `branch`, newest first.
    async fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<CommitRecord>, HostingError>;

    /// List the viewer's repositories ordered by most recent update.
    async fn list_repos_by_recency(&self) -> Result<Vec<RepoRef>, HostingError>;
}

/// Builds a [`HostingApi`] client bound to one run's credential. The seam
/// lets tests inject a fake backend behind the real HTTP handlers.
pub trait HostingFactory: Send + Sync {
    fn client(&self, token: &str) -> Arc<dyn HostingApi>;
}
