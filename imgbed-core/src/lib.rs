//! Image store backed by a GitHub repository
//!
//! Images are committed to a dedicated working branch of a repository and
//! served through the jsDelivr mirror. The crate provides:
//! - `RepositoryObjectStore` - branch/folder lifecycle, upload, list, delete
//! - `HostingBackend` - the seam over the hosting service's REST API
//! - `GitHubBackend` - the production backend
//! - `MemoryBackend` - an in-memory backend for tests and dry runs

pub mod store;

pub use store::{
    cdn_url, encode_content, object_path, BackendError, BranchInfo, ContentEntry,
    ContentListing, DeleteFile, DeleteOutcome, EntryKind, GitHubBackend, GitHubBackendConfig,
    HostingBackend, MemoryBackend, PutFile, RepositoryInfo, RepositoryObjectStore,
    RepositoryRef, StoreError, StoreOptions, StoreState, StoredObject,
};
