//! In-memory HostingBackend implementation

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use super::backend::{DeleteFile, HostingBackend, PutFile};
use super::error::BackendError;
use super::types::{
    BranchInfo, ContentEntry, ContentListing, EntryKind, RepositoryInfo, RepositoryRef,
};

/// In-memory repository for testing
///
/// Behaves like the GitHub contents API for the calls the store makes:
/// missing paths and branches are 404, writes over an existing file need its
/// current sha, and directories only exist while they contain a file. Every
/// call is recorded and can be inspected with `calls()`.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    repository_exists: bool,
    default_branch: String,
    /// branch name -> head commit
    branches: BTreeMap<String, String>,
    /// (branch, path) -> content
    files: BTreeMap<(String, String), Vec<u8>>,
    /// operation name -> status to fail with
    failures: HashMap<String, u16>,
    calls: Vec<String>,
    commits: u64,
}

impl MemoryState {
    fn next_commit(&mut self) -> String {
        self.commits += 1;
        hash_bytes(format!("commit-{}", self.commits).as_bytes())
    }

    fn advance(&mut self, branch: &str) {
        let head = self.next_commit();
        self.branches.insert(branch.to_string(), head);
    }

    fn check(&mut self, call: String, op: &str) -> Result<(), BackendError> {
        self.calls.push(call);
        if let Some(status) = self.failures.get(op) {
            return Err(status_error(*status, "injected failure"));
        }
        if !self.repository_exists {
            return Err(status_error(404, "Not Found"));
        }
        Ok(())
    }

    fn require_branch(&self, branch: &str) -> Result<(), BackendError> {
        if self.branches.contains_key(branch) {
            Ok(())
        } else {
            Err(status_error(404, &format!("No commit found for the ref {}", branch)))
        }
    }
}

impl MemoryBackend {
    /// Repository with a single default branch containing one commit
    pub fn new(default_branch: &str) -> Self {
        let mut state = MemoryState {
            repository_exists: true,
            default_branch: default_branch.to_string(),
            ..Default::default()
        };
        state.advance(default_branch);
        Self {
            state: Mutex::new(state),
        }
    }

    /// Backend on which every call fails with 404
    pub fn without_repository() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Add a branch pointing at the default branch's head
    pub fn with_branch(self, branch: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let head = state
                .branches
                .get(&state.default_branch)
                .cloned()
                .unwrap_or_default();
            state.branches.insert(branch.to_string(), head);
        }
        self
    }

    /// Add a file on a branch
    pub fn with_file(self, branch: &str, path: &str, content: &[u8]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .files
                .insert((branch.to_string(), path.to_string()), content.to_vec());
        }
        self
    }

    /// Make every call of `op` fail with `status`
    ///
    /// `op` is the trait method name, e.g. `"put_file"`.
    pub fn fail_on(&self, op: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op.to_string(), status);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Calls made so far, as `"<method>"` or `"<method>:<target>"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls to `op`
    pub fn call_count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.state.lock().unwrap().branches.contains_key(branch)
    }

    pub fn branch_head(&self, branch: &str) -> Option<String> {
        self.state.lock().unwrap().branches.get(branch).cloned()
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&(branch.to_string(), path.to_string()))
            .cloned()
    }

    /// Paths of all files on a branch, sorted
    pub fn paths(&self, branch: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .keys()
            .filter(|(b, _)| b == branch)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("main")
    }
}

#[async_trait]
impl HostingBackend for MemoryBackend {
    async fn get_repository(&self, repo: &RepositoryRef) -> Result<RepositoryInfo, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.check("get_repository".to_string(), "get_repository")?;
        Ok(RepositoryInfo {
            full_name: repo.full_name(),
            default_branch: state.default_branch.clone(),
            private: false,
        })
    }

    async fn get_branch(
        &self,
        _repo: &RepositoryRef,
        branch: &str,
    ) -> Result<BranchInfo, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.check(format!("get_branch:{}", branch), "get_branch")?;
        match state.branches.get(branch) {
            Some(head) => Ok(BranchInfo {
                name: branch.to_string(),
                head_sha: head.clone(),
            }),
            None => Err(status_error(404, "Branch not found")),
        }
    }

    async fn create_branch(
        &self,
        _repo: &RepositoryRef,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.check(format!("create_branch:{}", branch), "create_branch")?;
        if state.branches.contains_key(branch) {
            return Err(status_error(422, "Reference already exists"));
        }
        if !state.branches.values().any(|head| head == from_sha) {
            return Err(status_error(422, "Object does not exist"));
        }
        state
            .branches
            .insert(branch.to_string(), from_sha.to_string());
        Ok(())
    }

    async fn get_content(
        &self,
        _repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> Result<ContentListing, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.check(format!("get_content:{}", path), "get_content")?;
        let branch = branch
            .map(str::to_string)
            .unwrap_or_else(|| state.default_branch.clone());
        state.require_branch(&branch)?;

        let path = path.trim_matches('/');
        if let Some(content) = state.files.get(&(branch.clone(), path.to_string())) {
            return Ok(ContentListing::File(file_entry(path, content)));
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };
        let mut entries = Vec::new();
        let mut seen_dirs = BTreeSet::new();
        for ((b, file_path), content) in &state.files {
            if *b != branch {
                continue;
            }
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                None => entries.push(file_entry(file_path, content)),
                Some((dir, _)) => {
                    if seen_dirs.insert(dir.to_string()) {
                        entries.push(dir_entry(&format!("{}{}", prefix, dir)));
                    }
                }
            }
        }

        if entries.is_empty() && !path.is_empty() {
            return Err(status_error(404, "Not Found"));
        }
        Ok(ContentListing::Directory(entries))
    }

    async fn put_file(
        &self,
        _repo: &RepositoryRef,
        request: PutFile<'_>,
    ) -> Result<ContentEntry, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.check(format!("put_file:{}", request.path), "put_file")?;
        state.require_branch(request.branch)?;

        let content = BASE64
            .decode(request.content_base64)
            .map_err(|_| status_error(422, "content is not valid Base64"))?;
        let key = (request.branch.to_string(), request.path.to_string());
        match (state.files.get(&key), request.sha) {
            (Some(_), None) => return Err(status_error(422, "\"sha\" wasn't supplied.")),
            (Some(existing), Some(sha)) if hash_bytes(existing) != sha => {
                return Err(status_error(409, "sha does not match"));
            }
            (None, Some(_)) => return Err(status_error(404, "Not Found")),
            _ => {}
        }

        let entry = file_entry(request.path, &content);
        state.files.insert(key, content);
        state.advance(request.branch);
        Ok(entry)
    }

    async fn delete_file(
        &self,
        _repo: &RepositoryRef,
        request: DeleteFile<'_>,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.check(format!("delete_file:{}", request.path), "delete_file")?;
        state.require_branch(request.branch)?;

        let key = (request.branch.to_string(), request.path.to_string());
        let Some(existing) = state.files.get(&key) else {
            return Err(status_error(404, "Not Found"));
        };
        if hash_bytes(existing) != request.sha {
            return Err(status_error(409, "sha does not match"));
        }
        state.files.remove(&key);
        state.advance(request.branch);
        Ok(())
    }
}

fn status_error(status: u16, message: &str) -> BackendError {
    BackendError::Status {
        status,
        message: message.to_string(),
    }
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn file_entry(path: &str, content: &[u8]) -> ContentEntry {
    ContentEntry {
        name: base_name(path).to_string(),
        path: path.to_string(),
        sha: hash_bytes(content),
        kind: EntryKind::File,
        size: content.len() as u64,
    }
}

fn dir_entry(path: &str) -> ContentEntry {
    ContentEntry {
        name: base_name(path).to_string(),
        path: path.to_string(),
        sha: hash_bytes(path.as_bytes()),
        kind: EntryKind::Dir,
        size: 0,
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
