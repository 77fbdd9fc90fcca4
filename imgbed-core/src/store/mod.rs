//! Repository-backed object store
//!
//! The store keeps every image as a file in a GitHub repository. Folders are
//! path prefixes kept alive by an empty marker file, and public URLs are
//! derived from repository coordinates rather than returned by the backend.
//!
//! `RepositoryObjectStore` talks to the hosting service only through the
//! `HostingBackend` trait, so `GitHubBackend` and `MemoryBackend` are
//! interchangeable.

mod backend;
mod error;
mod github;
mod helper;
mod memory;
mod object_store;
mod types;

pub use backend::{DeleteFile, HostingBackend, PutFile};
pub use error::{BackendError, StoreError};
pub use github::{GitHubBackend, GitHubBackendConfig};
pub use helper::{cdn_url, encode_content, object_path, DEFAULT_CDN_HOST, MARKER_FILE};
pub use memory::MemoryBackend;
pub use object_store::{RepositoryObjectStore, StoreOptions};
pub use types::{
    BranchInfo, ContentEntry, ContentListing, DeleteOutcome, EntryKind, RepositoryInfo,
    RepositoryRef, StoreState, StoredObject,
};
