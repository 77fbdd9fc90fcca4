//! RepositoryObjectStore: images as files on a dedicated repository branch

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backend::{DeleteFile, HostingBackend, PutFile};
use super::error::{BackendError, StoreError};
use super::helper::{cdn_url, encode_content, join_path, object_path, DEFAULT_CDN_HOST, MARKER_FILE};
use super::types::{
    ContentEntry, ContentListing, DeleteOutcome, EntryKind, RepositoryRef, StoreState,
    StoredObject,
};

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Layout options for a store
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Folder all objects live under
    pub root: String,
    /// Host of the CDN mirror used for public URLs
    pub cdn_host: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            root: "images".to_string(),
            cdn_host: DEFAULT_CDN_HOST.to_string(),
        }
    }
}

/// Image store on top of a repository-hosting backend
///
/// Every operation except `initialize` assumes the store is `Ready` and does
/// not check; calling them earlier simply fails against the backend.
pub struct RepositoryObjectStore {
    repo: RepositoryRef,
    backend: Arc<dyn HostingBackend>,
    options: StoreOptions,
    state: StoreState,
    clock: Clock,
}

impl fmt::Debug for RepositoryObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryObjectStore")
            .field("repo", &self.repo)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

impl RepositoryObjectStore {
    pub fn new(repo: RepositoryRef, backend: Arc<dyn HostingBackend>) -> Self {
        Self::with_options(repo, backend, StoreOptions::default())
    }

    pub fn with_options(
        repo: RepositoryRef,
        backend: Arc<dyn HostingBackend>,
        options: StoreOptions,
    ) -> Self {
        Self {
            repo,
            backend,
            options,
            state: StoreState::Uninitialized,
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Replace the millisecond clock used to name uploads
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.repo
    }

    pub fn root(&self) -> &str {
        &self.options.root
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Make sure the repository is reachable, the working branch exists and
    /// the root folder marker is present.
    ///
    /// Existing branch and marker are left alone, so this is safe to call
    /// repeatedly. On error the store moves to `Failed` and may be retried.
    pub async fn initialize(&mut self) -> Result<bool, StoreError> {
        self.state = StoreState::Initializing;
        match self.prepare().await {
            Ok(()) => {
                self.state = StoreState::Ready;
                info!(
                    "Store ready on {}@{}",
                    self.repo.full_name(),
                    self.repo.branch()
                );
                Ok(true)
            }
            Err(e) => {
                self.state = StoreState::Failed;
                warn!("Store initialization failed: {}", e);
                Err(e)
            }
        }
    }

    async fn prepare(&self) -> Result<(), StoreError> {
        let info = self
            .backend
            .get_repository(&self.repo)
            .await
            .map_err(|e| self.access_error(e))?;
        debug!("Repository {} default branch {}", info.full_name, info.default_branch);

        let branch = self.repo.branch();
        match self.backend.get_branch(&self.repo, branch).await {
            Ok(existing) => debug!("Branch {} exists at {}", existing.name, existing.head_sha),
            Err(e) if e.is_not_found() => {
                let head = self
                    .backend
                    .get_branch(&self.repo, &info.default_branch)
                    .await
                    .map_err(|e| self.access_error(e))?;
                info!(
                    "Creating branch {} from {}@{}",
                    branch, info.default_branch, head.head_sha
                );
                self.backend
                    .create_branch(&self.repo, branch, &head.head_sha)
                    .await
                    .map_err(StoreError::from_write)?;
            }
            Err(e) => return Err(self.access_error(e)),
        }

        let root = self.root();
        match self.backend.get_content(&self.repo, root, Some(branch)).await {
            Ok(_) => debug!("Root folder {} exists", root),
            Err(e) if e.is_not_found() => {
                let marker = join_path(&[root, MARKER_FILE]);
                info!("Creating root folder marker {}", marker);
                let message = format!("Initialize {} directory", root);
                self.backend
                    .put_file(
                        &self.repo,
                        PutFile {
                            path: &marker,
                            content_base64: "",
                            message: &message,
                            branch,
                            sha: None,
                        },
                    )
                    .await
                    .map_err(StoreError::from_write)?;
            }
            Err(e) => return Err(StoreError::Backend(e)),
        }

        Ok(())
    }

    /// Names of the folders directly under the root, in backend order
    ///
    /// Returns an empty list on any failure, including a missing root.
    pub async fn list_folders(&self) -> Vec<String> {
        let root = self.root();
        match self.lenient_listing(root).await {
            Some(entries) => entries
                .into_iter()
                .filter(|e| e.kind == EntryKind::Dir)
                .map(|e| e.name)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Create a folder by writing its marker file; `false` on any failure
    pub async fn create_folder(&self, name: &str) -> bool {
        let name = name.trim_matches('/');
        if name.is_empty() {
            return false;
        }
        let marker = join_path(&[self.root(), name, MARKER_FILE]);
        let message = format!("Create folder {}", name);
        let result = self
            .backend
            .put_file(
                &self.repo,
                PutFile {
                    path: &marker,
                    content_base64: "",
                    message: &message,
                    branch: self.repo.branch(),
                    sha: None,
                },
            )
            .await;
        match result {
            Ok(_) => {
                info!("Created folder {}", name);
                true
            }
            Err(e) => {
                warn!("Failed to create folder {}: {}", name, e);
                false
            }
        }
    }

    /// Upload an image and return its CDN URL
    ///
    /// The object is stored at `root/[folder/]<millis>-<original_name>`.
    pub async fn upload_object(
        &self,
        content: &[u8],
        original_name: &str,
        folder: Option<&str>,
    ) -> Result<String, StoreError> {
        let path = object_path(self.root(), folder, (self.clock)(), original_name);
        let encoded = encode_content(content);
        let message = format!("Upload image: {}", original_name);
        debug!("Uploading {} bytes to {}", content.len(), path);

        let entry = self
            .backend
            .put_file(
                &self.repo,
                PutFile {
                    path: &path,
                    content_base64: &encoded,
                    message: &message,
                    branch: self.repo.branch(),
                    sha: None,
                },
            )
            .await
            .map_err(|e| match e.status() {
                Some(403) => StoreError::Permission(format!(
                    "no permission to upload files, check the token scopes ({})",
                    e.message()
                )),
                _ => StoreError::Upload(e.message()),
            })?;

        info!("Uploaded {}", entry.path);
        Ok(self.derive_cdn_url(&entry.sha, &path))
    }

    /// Delete the object at `path`, proving the current version first
    ///
    /// A path that resolves to a directory is left untouched and reported as
    /// `success: false`.
    pub async fn delete_object(&self, path: &str) -> Result<DeleteOutcome, StoreError> {
        let branch = self.repo.branch();
        let listing = self
            .backend
            .get_content(&self.repo, path, Some(branch))
            .await
            .map_err(|e| delete_error(e, path))?;

        let entry = match listing {
            ContentListing::File(entry) if entry.kind == EntryKind::File => entry,
            _ => {
                debug!("{} is not a single file, nothing deleted", path);
                return Ok(DeleteOutcome {
                    success: false,
                    hash: String::new(),
                });
            }
        };

        let message = format!("Delete image: {}", entry.name);
        self.backend
            .delete_file(
                &self.repo,
                DeleteFile {
                    path: &entry.path,
                    sha: &entry.sha,
                    message: &message,
                    branch,
                },
            )
            .await
            .map_err(|e| delete_error(e, path))?;

        info!("Deleted {}", entry.path);
        Ok(DeleteOutcome {
            success: true,
            hash: entry.sha,
        })
    }

    /// Images directly under the root or under `root/folder`, marker excluded
    ///
    /// Returns an empty list on any failure, including a missing folder.
    pub async fn list_objects(&self, folder: Option<&str>) -> Vec<StoredObject> {
        let dir = join_path(&[self.root(), folder.unwrap_or("")]);
        match self.lenient_listing(&dir).await {
            Some(entries) => entries
                .into_iter()
                .filter(|e| e.kind == EntryKind::File && e.name != MARKER_FILE)
                .map(|e| StoredObject {
                    url: self.derive_cdn_url(&e.sha, &e.path),
                    name: e.name,
                    path: e.path,
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Public URL of `path` on the working branch
    ///
    /// `_hash` does not affect the URL; callers wanting cache busting can
    /// append it themselves.
    pub fn derive_cdn_url(&self, _hash: &str, path: &str) -> String {
        cdn_url(
            &self.options.cdn_host,
            self.repo.owner(),
            self.repo.repo(),
            Some(self.repo.branch()),
            path,
        )
    }

    /// Directory entries at `path`, or `None` when it cannot be listed.
    /// A missing directory is expected and only logged at debug level.
    async fn lenient_listing(&self, path: &str) -> Option<Vec<ContentEntry>> {
        match self
            .backend
            .get_content(&self.repo, path, Some(self.repo.branch()))
            .await
        {
            Ok(ContentListing::Directory(entries)) => Some(entries),
            Ok(ContentListing::File(_)) => {
                debug!("{} is a file, not a folder", path);
                None
            }
            Err(e) if e.is_not_found() => {
                debug!("Folder {} does not exist yet", path);
                None
            }
            Err(e) => {
                warn!("Failed to list {}: {}", path, e);
                None
            }
        }
    }

    fn access_error(&self, err: BackendError) -> StoreError {
        match err.status() {
            Some(401) | Some(403) | Some(404) => StoreError::Access {
                repo: self.repo.full_name(),
                message: err.message(),
            },
            _ => StoreError::Backend(err),
        }
    }
}

fn delete_error(err: BackendError, path: &str) -> StoreError {
    match err.status() {
        Some(404) => StoreError::NotFound {
            path: path.to_string(),
        },
        _ => StoreError::from_write(err),
    }
}
