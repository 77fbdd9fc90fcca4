//! Error types for the store and its backends

use thiserror::Error;

/// Failure reported by a `HostingBackend`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The service answered with a non-success status
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Connection or protocol failure before a status was received
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Message without the status prefix, as the service reported it
    pub fn message(&self) -> String {
        match self {
            BackendError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Errors surfaced by `RepositoryObjectStore`
#[derive(Error, Debug)]
pub enum StoreError {
    /// Repository missing, or the credential cannot see it
    #[error("repository {repo} does not exist or is not accessible: {message}")]
    Access { repo: String, message: String },

    /// Authenticated, but without write access
    #[error("insufficient permission: {0}")]
    Permission(String),

    /// No object at the given path
    #[error("object not found: {path}")]
    NotFound { path: String },

    /// Any other failure while uploading
    #[error("upload failed: {0}")]
    Upload(String),

    /// Backend failure outside the categories above
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    /// Classify a failure from a mutating call: 403 becomes `Permission`,
    /// everything else passes through.
    pub(crate) fn from_write(err: BackendError) -> Self {
        match err.status() {
            Some(403) => StoreError::Permission(format!(
                "the token needs write access to the repository ({})",
                err.message()
            )),
            _ => StoreError::Backend(err),
        }
    }
}
