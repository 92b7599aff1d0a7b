//! Driver error types.

use thiserror::Error;

/// Errors that can occur while talking to XOS or the caller's datastore.
#[derive(Debug, Error)]
pub enum XosError {
    /// XOS answered with a non-success status.
    #[error("XOS request to {path} failed with status {status}")]
    BackendRequest { status: u16, path: String },

    /// The request never produced a response.
    #[error("XOS transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("unexpected XOS response: {0}")]
    Decode(String),

    /// The entity has no XOS correlation id yet, so it cannot be addressed.
    #[error("{kind} {id} is not linked to an XOS resource")]
    NotLinked { kind: &'static str, id: String },

    /// The caller's datastore rejected a read or write.
    #[error("datastore: {0}")]
    Datastore(String),
}

impl XosError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn datastore(msg: impl Into<String>) -> Self {
        Self::Datastore(msg.into())
    }

    /// HTTP status of a rejected backend request, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BackendRequest { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for XosError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, XosError>;
