//! HTTP transport errors and their mapping onto the engine's remote errors.

use offsync_engine::{RecordId, RemoteError};

/// Error raised while talking to the remote store over HTTP.
#[derive(Debug, thiserror::Error)]
pub enum HttpRemoteError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Base URL cannot carry a path: {0}")]
    InvalidBaseUrl(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Remote store answered {status} for {id}: {message}")]
    Status {
        id: RecordId,
        status: u16,
        message: String,
    },

    #[error("Invalid acknowledgement for {id}: {message}")]
    InvalidAck {
        id: RecordId,
        status: u16,
        message: String,
    },
}

/// Result type alias for the HTTP client.
pub type Result<T> = std::result::Result<T, HttpRemoteError>;

impl From<HttpRemoteError> for RemoteError {
    fn from(err: HttpRemoteError) -> Self {
        match err {
            HttpRemoteError::Transport(source) if source.is_timeout() => RemoteError::Timeout,
            HttpRemoteError::Transport(source) => RemoteError::Network(source.to_string()),
            HttpRemoteError::Status {
                status: 401 | 403, ..
            } => RemoteError::Unauthorized,
            HttpRemoteError::Status { id, status: 404, .. } => RemoteError::NotFound(id),
            HttpRemoteError::Status { id, status: 409, .. } => RemoteError::AlreadyExists(id),
            HttpRemoteError::Status {
                status, message, ..
            }
            | HttpRemoteError::InvalidAck {
                status, message, ..
            } => RemoteError::Rejected { status, message },
            other @ (HttpRemoteError::Build(_) | HttpRemoteError::InvalidBaseUrl(_)) => {
                RemoteError::Network(other.to_string())
            }
        }
    }
}
