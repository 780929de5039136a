//! GitHub implementation of the hosting capability interface.
//!
//! Talks to the GitHub REST v3 git-data endpoints with a per-run bearer
//! token. The base URL is configurable so integration tests can point the
//! client at a local mock server.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    CommitRecord, GitIdentity, GitRef, HostingApi, HostingError, HostingFactory, NewCommit, RepoRef,
};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("repopin/", env!("CARGO_PKG_VERSION"));

/// GitHub REST client bound to one installation token.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: String, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header("Accept", ACCEPT_HEADER)
            .header("User-Agent", USER_AGENT)
    }

    /// Map a non-success response to a structured error. Secondary rate
    /// limits surface as 403 with a zeroed remaining header, primary limits
    /// as 429; both become `RateLimited`.
    async fn error_from(response: Response) -> HostingError {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return HostingError::Unauthorized;
        }

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let remaining = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let reset = response
            .headers()
            .get("X-RateLimit-Reset")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok());

        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && remaining == Some(0))
        {
            let retry_after_secs = retry_after.or_else(|| {
                reset.map(|epoch| (epoch - Utc::now().timestamp()).max(0) as u64)
            });
            warn!(?retry_after_secs, "Rate limited by hosting provider");
            return HostingError::RateLimited { retry_after_secs };
        }

        let message = response.text().await.unwrap_or_default();

        if status == StatusCode::NOT_FOUND {
            return HostingError::NotFound(message);
        }

        HostingError::Api {
            status: status.as_u16(),
            message,
        }
    }

    async fn json_or_error<T: for<'de> Deserialize<'de>>(
        response: Response,
    ) -> Result<T, HostingError> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn ok_or_error(response: Response) -> Result<(), HostingError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }
}

// Wire payloads. The git-data and repo-commits endpoints return different
// shapes for the same commit object.

#[derive(Debug, Deserialize)]
struct RefPayload {
    #[serde(rename = "ref")]
    name: String,
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitCommitPayload {
    sha: String,
    message: String,
    tree: ShaOnly,
    #[serde(default)]
    parents: Vec<ShaOnly>,
    author: Option<IdentityPayload>,
    committer: Option<IdentityPayload>,
}

#[derive(Debug, Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityPayload {
    name: String,
    email: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ListedCommitPayload {
    sha: String,
    commit: ListedCommitInner,
    #[serde(default)]
    parents: Vec<ShaOnly>,
}

#[derive(Debug, Deserialize)]
struct ListedCommitInner {
    message: String,
    tree: ShaOnly,
    author: Option<IdentityPayload>,
    committer: Option<IdentityPayload>,
}

#[derive(Debug, Deserialize)]
struct RepoPayload {
    name: String,
    owner: OwnerPayload,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Debug, Serialize)]
struct CreateCommitBody {
    message: String,
    tree: String,
    parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<IdentityPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committer: Option<IdentityPayload>,
}

impl From<GitIdentity> for IdentityPayload {
    fn from(identity: GitIdentity) -> Self {
        Self {
            name: identity.name,
            email: identity.email,
            date: identity.date,
        }
    }
}

impl From<IdentityPayload> for GitIdentity {
    fn from(payload: IdentityPayload) -> Self {
        Self {
            name: payload.name,
            email: payload.email,
            date: payload.date,
        }
    }
}

impl From<GitCommitPayload> for CommitRecord {
    fn from(payload: GitCommitPayload) -> Self {
        Self {
            sha: payload.sha,
            message: payload.message,
            tree: payload.tree.sha,
            parents: payload.parents.into_iter().map(|p| p.sha).collect(),
            author: payload.author.map(Into::into),
            committer: payload.committer.map(Into::into),
        }
    }
}

impl From<ListedCommitPayload> for CommitRecord {
    fn from(payload: ListedCommitPayload) -> Self {
        Self {
            sha: payload.sha,
            message: payload.commit.message,
            tree: payload.commit.tree.sha,
            parents: payload.parents.into_iter().map(|p| p.sha).collect(),
            author: payload.commit.author.map(Into::into),
            committer: payload.commit.committer.map(Into::into),
        }
    }
}

#[async_trait]
impl HostingApi for GithubClient {
    async fn get_ref(&self, repo: &RepoRef, branch: &str) -> Result<GitRef, HostingError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{}/{}/git/ref/heads/{}", repo.owner, repo.name, branch),
            )
            .send()
            .await?;

        let payload: RefPayload = Self::json_or_error(response).await?;
        Ok(GitRef {
            name: payload.name,
            sha: payload.object.sha,
        })
    }

    async fn get_commit(&self, repo: &RepoRef, sha: &str) -> Result<CommitRecord, HostingError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{}/{}/git/commits/{}", repo.owner, repo.name, sha),
            )
            .send()
            .await?;

        let payload: GitCommitPayload = Self::json_or_error(response).await?;
        Ok(payload.into())
    }

    async fn create_commit(
        &self,
        repo: &RepoRef,
        commit: NewCommit,
    ) -> Result<CommitRecord, HostingError> {
        let body = CreateCommitBody {
            message: commit.message,
            tree: commit.tree,
            parents: commit.parents,
            author: commit.author.map(Into::into),
            committer: commit.committer.map(Into::into),
        };

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/{}/git/commits", repo.owner, repo.name),
            )
            .json(&body)
            .send()
            .await?;

        let payload: GitCommitPayload = Self::json_or_error(response).await?;
        debug!(repo = %repo, sha = %payload.sha, "Created commit object");
        Ok(payload.into())
    }

    async fn update_ref(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> Result<(), HostingError> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/repos/{}/{}/git/refs/heads/{}", repo.owner, repo.name, branch),
            )
            .json(&serde_json::json!({ "sha": sha, "force": force }))
            .send()
            .await?;

        Self::ok_or_error(response).await
    }

    async fn create_ref(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostingError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/{}/git/refs", repo.owner, repo.name),
            )
            .json(&serde_json::json!({
                "ref": format!("refs/heads/{}", branch),
                "sha": sha,
            }))
            .send()
            .await?;

        Self::ok_or_error(response).await
    }

    async fn delete_ref(&self, repo: &RepoRef, branch: &str) -> Result<(), HostingError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/repos/{}/{}/git/refs/heads/{}", repo.owner, repo.name, branch),
            )
            .send()
            .await?;

        Self::ok_or_error(response).await
    }

    async fn merge(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
        message: &str,
    ) -> Result<CommitRecord, HostingError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/{}/merges", repo.owner, repo.name),
            )
            .json(&serde_json::json!({
                "base": base,
                "head": head,
                "commit_message": message,
            }))
            .send()
            .await?;

        let payload: ListedCommitPayload = Self::json_or_error(response).await?;
        Ok(payload.into())
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<CommitRecord>, HostingError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/repos/{}/{}/commits?sha={}&per_page={}",
                    repo.owner, repo.name, branch, limit
                ),
            )
            .send()
            .await?;

        let payload: Vec<ListedCommitPayload> = Self::json_or_error(response).await?;
        Ok(payload.into_iter().map(Into::into).collect())
    }

    async fn list_repos_by_recency(&self) -> Result<Vec<RepoRef>, HostingError> {
        // Viewers can own more than one page of repositories; follow pages
        // until a short one so repos deep in the listing are still seen.
        const PER_PAGE: usize = 100;
        const MAX_PAGES: usize = 10;

        let mut repos = Vec::new();
        for page in 1..=MAX_PAGES {
            let response = self
                .request(
                    reqwest::Method::GET,
                    &format!(
                        "/user/repos?sort=pushed&direction=desc&per_page={}&page={}",
                        PER_PAGE, page
                    ),
                )
                .send()
                .await?;

            let payload: Vec<RepoPayload> = Self::json_or_error(response).await?;
            let fetched = payload.len();
            repos.extend(
                payload
                    .into_iter()
                    .map(|r| RepoRef::new(r.owner.login, r.name)),
            );
            if fetched < PER_PAGE {
                break;
            }
        }
        Ok(repos)
    }
}

/// Produces GitHub clients bound to per-run tokens.
#[derive(Debug)]
pub struct GithubFactory {
    base_url: Option<String>,
}

impl GithubFactory {
    /// Validates the base URL override once at startup so a bad value fails
    /// fast instead of on the first run.
    pub fn new(base_url: Option<String>) -> Result<Self, HostingError> {
        let base_url = match base_url {
            Some(raw) => {
                let parsed = url::Url::parse(&raw)?;
                Some(parsed.as_str().trim_end_matches('/').to_string())
            }
            None => None,
        };
        Ok(Self { base_url })
    }
}

impl HostingFactory for GithubFactory {
    fn client(&self, token: &str) -> Arc<dyn HostingApi> {
        Arc::new(GithubClient::new(token.to_string(), self.base_url.clone()))
    }
}
