//! Test utilities: in-memory database setup and a fake hosting backend.
//!
//! The fake keeps a commit graph and branch refs in memory and tracks every
//! mutating call, so tests can assert both outcomes and the absence of
//! side effects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

use repopin::hosting::{
    CommitRecord, GitRef, HostingApi, HostingError, HostingFactory, NewCommit, RepoRef,
};

/// Sets up an in-memory SQLite database with all migrations applied.
#[allow(dead_code)]
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

#[derive(Default)]
struct FakeState {
    commits: HashMap<String, CommitRecord>,
    /// "owner/name#branch" -> sha
    refs: HashMap<String, String>,
    /// Most recently pushed first.
    recency: Vec<RepoRef>,
    next_sha: u64,
    /// Repos whose commit creation fails with a 500.
    fail_create_commit: Vec<String>,
    mutations: u64,
}

fn ref_key(repo: &RepoRef, branch: &str) -> String {
    format!("{}#{}", repo.full_name(), branch)
}

/// In-memory [`HostingApi`] implementation.
#[derive(Default)]
pub struct FakeHosting {
    state: Mutex<FakeState>,
}

#[allow(dead_code)]
impl FakeHosting {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed `repo` with a linear chain of commits on `branch`, oldest
    /// message first, and register it at the back of the recency listing.
    pub fn seed_repo(&self, repo: &RepoRef, branch: &str, messages: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let mut parent: Option<String> = None;
        for message in messages {
            state.next_sha += 1;
            let sha = format!("seed-{}", state.next_sha);
            let commit = CommitRecord {
                sha: sha.clone(),
                message: message.to_string(),
                tree: format!("tree-{}", sha),
                parents: parent.iter().cloned().collect(),
                author: None,
                committer: None,
            };
            state.commits.insert(sha.clone(), commit);
            parent = Some(sha);
        }
        if let Some(head) = parent {
            state.refs.insert(ref_key(repo, branch), head);
        }
        state.recency.push(repo.clone());
    }

    /// Replace the recency listing wholesale, most recent first.
    pub fn set_recency(&self, order: &[RepoRef]) {
        self.state.lock().unwrap().recency = order.to_vec();
    }

    /// Make commit creation fail for `repo` with an API error.
    pub fn fail_create_commit_for(&self, repo: &RepoRef) {
        self.state
            .lock()
            .unwrap()
            .fail_create_commit
            .push(repo.full_name());
    }

    /// Number of mutating calls (commit/ref creation, updates, merges).
    pub fn mutation_count(&self) -> u64 {
        self.state.lock().unwrap().mutations
    }

    pub fn head_sha(&self, repo: &RepoRef, branch: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .refs
            .get(&ref_key(repo, branch))
            .cloned()
    }

    pub fn commit(&self, sha: &str) -> Option<CommitRecord> {
        self.state.lock().unwrap().commits.get(sha).cloned()
    }

    /// Branch names of all refs on `repo`.
    pub fn branches(&self, repo: &RepoRef) -> Vec<String> {
        let prefix = format!("{}#", repo.full_name());
        self.state
            .lock()
            .unwrap()
            .refs
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Commit messages on `branch`, newest first, following first parents.
    pub fn history(&self, repo: &RepoRef, branch: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut messages = Vec::new();
        let mut cursor = state.refs.get(&ref_key(repo, branch)).cloned();
        while let Some(sha) = cursor {
            let Some(commit) = state.commits.get(&sha) else {
                break;
            };
            messages.push(commit.message.clone());
            cursor = commit.parents.first().cloned();
        }
        messages
    }

    fn touch_recency(state: &mut FakeState, repo: &RepoRef) {
        state.recency.retain(|r| r != repo);
        state.recency.insert(0, repo.clone());
    }
}

#[async_trait]
impl HostingApi for FakeHosting {
    async fn get_ref(&self, repo: &RepoRef, branch: &str) -> Result<GitRef, HostingError> {
        let state = self.state.lock().unwrap();
        state
            .refs
            .get(&ref_key(repo, branch))
            .map(|sha| GitRef {
                name: format!("refs/heads/{}", branch),
                sha: sha.clone(),
            })
            .ok_or_else(|| HostingError::NotFound(format!("no ref {}", branch)))
    }

    async fn get_commit(&self, repo: &RepoRef, sha: &str) -> Result<CommitRecord, HostingError> {
        let _ = repo;
        let state = self.state.lock().unwrap();
        state
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| HostingError::NotFound(format!("no commit {}", sha)))
    }

    async fn create_commit(
        &self,
        repo: &RepoRef,
        commit: NewCommit,
    ) -> Result<CommitRecord, HostingError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create_commit.contains(&repo.full_name()) {
            return Err(HostingError::Api {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        state.next_sha += 1;
        state.mutations += 1;
        let sha = format!("fake-{}", state.next_sha);
        let record = CommitRecord {
            sha: sha.clone(),
            message: commit.message,
            tree: commit.tree,
            parents: commit.parents,
            author: commit.author,
            committer: commit.committer,
        };
        state.commits.insert(sha, record.clone());
        Ok(record)
    }

    async fn update_ref(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
        _force: bool,
    ) -> Result<(), HostingError> {
        let mut state = self.state.lock().unwrap();
        let key = ref_key(repo, branch);
        if !state.refs.contains_key(&key) {
            return Err(HostingError::NotFound(format!("no ref {}", branch)));
        }
        state.refs.insert(key, sha.to_string());
        state.mutations += 1;
        Self::touch_recency(&mut state, repo);
        Ok(())
    }

    async fn create_ref(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), HostingError> {
        let mut state = self.state.lock().unwrap();
        let key = ref_key(repo, branch);
        if state.refs.contains_key(&key) {
            return Err(HostingError::Api {
                status: 422,
                message: format!("ref {} already exists", branch),
            });
        }
        state.refs.insert(key, sha.to_string());
        state.mutations += 1;
        Ok(())
    }

    async fn delete_ref(&self, repo: &RepoRef, branch: &str) -> Result<(), HostingError> {
        let mut state = self.state.lock().unwrap();
        let key = ref_key(repo, branch);
        if state.refs.remove(&key).is_none() {
            return Err(HostingError::NotFound(format!("no ref {}", branch)));
        }
        state.mutations += 1;
        Ok(())
    }

    async fn merge(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
        message: &str,
    ) -> Result<CommitRecord, HostingError> {
        let (base_sha, head_sha, base_tree) = {
            let state = self.state.lock().unwrap();
            let base_sha = state
                .refs
                .get(&ref_key(repo, base))
                .cloned()
                .ok_or_else(|| HostingError::NotFound(format!("no ref {}", base)))?;
            let head_sha = state
                .refs
                .get(&ref_key(repo, head))
                .cloned()
                .ok_or_else(|| HostingError::NotFound(format!("no ref {}", head)))?;
            let base_tree = state
                .commits
                .get(&base_sha)
                .map(|c| c.tree.clone())
                .ok_or_else(|| HostingError::NotFound(format!("no commit {}", base_sha)))?;
            (base_sha, head_sha, base_tree)
        };

        let merge_commit = self
            .create_commit(
                repo,
                NewCommit {
                    message: message.to_string(),
                    tree: base_tree,
                    parents: vec![base_sha, head_sha],
                    author: None,
                    committer: None,
                },
            )
            .await?;

        let mut state = self.state.lock().unwrap();
        let key = ref_key(repo, base);
        state.refs.insert(key, merge_commit.sha.clone());
        state.mutations += 1;
        Self::touch_recency(&mut state, repo);
        Ok(merge_commit)
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<CommitRecord>, HostingError> {
        let state = self.state.lock().unwrap();
        let mut commits = Vec::new();
        let mut cursor = state.refs.get(&ref_key(repo, branch)).cloned();
        while let Some(sha) = cursor {
            if commits.len() >= limit {
                break;
            }
            let Some(commit) = state.commits.get(&sha) else {
                break;
            };
            commits.push(commit.clone());
            cursor = commit.parents.first().cloned();
        }
        Ok(commits)
    }

    async fn list_repos_by_recency(&self) -> Result<Vec<RepoRef>, HostingError> {
        Ok(self.state.lock().unwrap().recency.clone())
    }
}

/// [`HostingFactory`] that hands out one shared fake regardless of token.
#[allow(dead_code)]
pub struct FakeFactory {
    pub hosting: Arc<FakeHosting>,
}

impl HostingFactory for FakeFactory {
    fn client(&self, _token: &str) -> Arc<dyn HostingApi> {
        Arc::clone(&self.hosting) as Arc<dyn HostingApi>
    }
}
