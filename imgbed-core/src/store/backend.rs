//! HostingBackend trait for repository-hosting REST APIs

use async_trait::async_trait;

use super::error::BackendError;
use super::types::{BranchInfo, ContentEntry, ContentListing, RepositoryInfo, RepositoryRef};

/// Create or update a file
#[derive(Debug, Clone)]
pub struct PutFile<'a> {
    pub path: &'a str,
    pub content_base64: &'a str,
    pub message: &'a str,
    pub branch: &'a str,
    /// Current content hash; required when replacing an existing file
    pub sha: Option<&'a str>,
}

/// Delete a file at a known version
#[derive(Debug, Clone)]
pub struct DeleteFile<'a> {
    pub path: &'a str,
    pub sha: &'a str,
    pub message: &'a str,
    pub branch: &'a str,
}

/// Repository, branch and content operations of a git hosting service
#[async_trait]
pub trait HostingBackend: Send + Sync {
    /// Fetch repository metadata
    async fn get_repository(&self, repo: &RepositoryRef) -> Result<RepositoryInfo, BackendError>;

    /// Look up a branch; 404 when it does not exist
    async fn get_branch(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<BranchInfo, BackendError>;

    /// Create `branch` pointing at commit `from_sha`
    async fn create_branch(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), BackendError>;

    /// Look up a file or list a directory; 404 when the path does not exist.
    /// `branch` of `None` means the repository's default branch.
    async fn get_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> Result<ContentListing, BackendError>;

    /// Create or update a file, returning the entry for the written version
    async fn put_file(
        &self,
        repo: &RepositoryRef,
        request: PutFile<'_>,
    ) -> Result<ContentEntry, BackendError>;

    /// Delete a file; rejected unless `sha` matches the current version
    async fn delete_file(
        &self,
        repo: &RepositoryRef,
        request: DeleteFile<'_>,
    ) -> Result<(), BackendError>;
}
