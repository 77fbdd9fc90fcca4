//! GitHub REST API backend
//!
//! Implements `HostingBackend` over the repos, branches, git refs and contents
//! endpoints of the GitHub v3 API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::backend::{DeleteFile, HostingBackend, PutFile};
use super::error::BackendError;
use super::types::{
    BranchInfo, ContentEntry, ContentListing, EntryKind, RepositoryInfo, RepositoryRef,
};

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Connection settings for `GitHubBackend`
#[derive(Debug, Clone)]
pub struct GitHubBackendConfig {
    pub api_base: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for GitHubBackendConfig {
    fn default() -> Self {
        Self {
            api_base: GITHUB_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("imgbed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// GitHub API client
#[derive(Clone)]
pub struct GitHubBackend {
    http_client: Client,
    api_base: String,
}

// ============================================================================
// GitHub API wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RepoResponse {
    full_name: String,
    default_branch: String,
    #[serde(default)]
    private: bool,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    #[serde(default)]
    size: u64,
}

impl From<ContentItem> for ContentEntry {
    fn from(item: ContentItem) -> Self {
        ContentEntry {
            name: item.name,
            path: item.path,
            sha: item.sha,
            kind: item.kind,
            size: item.size,
        }
    }
}

#[derive(Debug, Serialize)]
struct PutFileRequest<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutFileResponse {
    content: Option<ContentItem>,
}

#[derive(Debug, Serialize)]
struct DeleteFileRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ============================================================================
// Implementation
// ============================================================================

impl GitHubBackend {
    /// Create a backend for api.github.com with default settings
    pub fn new(token: &str) -> Result<Self, BackendError> {
        Self::with_config(token, GitHubBackendConfig::default())
    }

    pub fn with_config(token: &str, config: GitHubBackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| BackendError::Transport("invalid token format".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| BackendError::Transport("invalid user agent".to_string()))?,
        );

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn repo_url(&self, repo: &RepositoryRef) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base,
            urlencoding::encode(repo.owner()),
            urlencoding::encode(repo.repo())
        )
    }

    fn contents_url(&self, repo: &RepositoryRef, path: &str) -> String {
        format!("{}/contents/{}", self.repo_url(repo), encode_path(path))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Response, BackendError> {
        let mut request = self.http_client.request(method, url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        debug!("{} -> {}", url, response.status());
        check_status(response).await
    }
}

#[async_trait]
impl HostingBackend for GitHubBackend {
    #[instrument(level = "debug", skip(self), fields(repo = %repo.full_name()))]
    async fn get_repository(&self, repo: &RepositoryRef) -> Result<RepositoryInfo, BackendError> {
        let url = self.repo_url(repo);
        let response = self.send::<()>(Method::GET, &url, &[], None).await?;
        let body: RepoResponse = response.json().await?;
        Ok(RepositoryInfo {
            full_name: body.full_name,
            default_branch: body.default_branch,
            private: body.private,
        })
    }

    #[instrument(level = "debug", skip(self), fields(repo = %repo.full_name()))]
    async fn get_branch(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<BranchInfo, BackendError> {
        let url = format!("{}/branches/{}", self.repo_url(repo), encode_path(branch));
        let response = self.send::<()>(Method::GET, &url, &[], None).await?;
        let body: BranchResponse = response.json().await?;
        Ok(BranchInfo {
            name: body.name,
            head_sha: body.commit.sha,
        })
    }

    #[instrument(level = "debug", skip(self), fields(repo = %repo.full_name()))]
    async fn create_branch(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), BackendError> {
        let url = format!("{}/git/refs", self.repo_url(repo));
        let body = CreateRefRequest {
            git_ref: format!("refs/heads/{}", branch),
            sha: from_sha,
        };
        self.send(Method::POST, &url, &[], Some(&body)).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(repo = %repo.full_name()))]
    async fn get_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> Result<ContentListing, BackendError> {
        let url = self.contents_url(repo, path);
        let query: Vec<(&str, &str)> = branch.map(|b| ("ref", b)).into_iter().collect();
        let response = self.send::<()>(Method::GET, &url, &query, None).await?;
        let body: Value = response.json().await?;
        parse_content_listing(body)
    }

    #[instrument(level = "debug", skip(self, request), fields(repo = %repo.full_name(), path = request.path))]
    async fn put_file(
        &self,
        repo: &RepositoryRef,
        request: PutFile<'_>,
    ) -> Result<ContentEntry, BackendError> {
        let url = self.contents_url(repo, request.path);
        let body = PutFileRequest {
            message: request.message,
            content: request.content_base64,
            branch: request.branch,
            sha: request.sha,
        };
        let response = self.send(Method::PUT, &url, &[], Some(&body)).await?;
        let body: PutFileResponse = response.json().await?;
        body.content
            .map(ContentEntry::from)
            .ok_or_else(|| BackendError::Decode("missing content in write response".to_string()))
    }

    #[instrument(level = "debug", skip(self, request), fields(repo = %repo.full_name(), path = request.path))]
    async fn delete_file(
        &self,
        repo: &RepositoryRef,
        request: DeleteFile<'_>,
    ) -> Result<(), BackendError> {
        let url = self.contents_url(repo, request.path);
        let body = DeleteFileRequest {
            message: request.message,
            sha: request.sha,
            branch: request.branch,
        };
        self.send(Method::DELETE, &url, &[], Some(&body)).await?;
        Ok(())
    }
}

/// Turn a non-success response into `BackendError::Status`
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// GitHub error bodies look like `{"message": "...", "documentation_url": "..."}`
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
        }) => message,
        _ => body.to_string(),
    }
}

/// The contents endpoint returns an object for files and an array for directories
fn parse_content_listing(body: Value) -> Result<ContentListing, BackendError> {
    let decode = |e: serde_json::Error| BackendError::Decode(e.to_string());
    if body.is_array() {
        let items: Vec<ContentItem> = serde_json::from_value(body).map_err(decode)?;
        Ok(ContentListing::Directory(
            items.into_iter().map(ContentEntry::from).collect(),
        ))
    } else {
        let item: ContentItem = serde_json::from_value(body).map_err(decode)?;
        Ok(ContentListing::File(item.into()))
    }
}

/// Percent-encode each segment of a repository path, keeping the separators
fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
