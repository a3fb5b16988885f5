//! Error types for omnistore

use crate::model::Object;
use thiserror::Error;

/// Result type alias for omnistore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in omnistore operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    /// Network or server-side failure worth retrying
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Config error: {0}")]
    Config(String),

    /// The backend an object refers to has been dropped
    #[error("Config error: storage backend has been released")]
    BackendReleased,

    #[error("Permission denied: {0}")]
    Unauthorized(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A list page failed after its retries; `objects` holds the pages read before it
    #[error("Listing aborted after {} objects: {source}", objects.len())]
    PartialList {
        objects: Vec<Object>,
        #[source]
        source: Box<Error>,
    },

    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Whether retrying the failed call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Configuration-class failures: bad settings or a released backend
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::BackendReleased)
    }
}
