//! Data types shared by the store and its backends

use serde::{Deserialize, Serialize};

/// Identifies the repository and working branch the store operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    owner: String,
    repo: String,
    branch: String,
}

impl RepositoryRef {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// The working branch used for every object operation
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Repository metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub full_name: String,
    pub default_branch: String,
    pub private: bool,
}

/// A branch and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    pub head_sha: String,
}

/// Kind of an entry returned by a content lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// A single file or directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    /// Backend-assigned content hash (git blob SHA for GitHub)
    pub sha: String,
    pub kind: EntryKind,
    pub size: u64,
}

/// Result of looking up a path: a single file, or the entries of a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentListing {
    File(ContentEntry),
    Directory(Vec<ContentEntry>),
}

/// An image as presented to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub name: String,
    pub path: String,
    pub url: String,
}

/// Result of `delete_object`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    /// Content hash of the deleted version, empty when nothing was deleted
    pub hash: String,
}

/// Lifecycle of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}
