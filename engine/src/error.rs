//! Error types for the Offsync engine.
//!
//! Storage and configuration errors are surfaced to callers. Remote errors
//! are recovered inside the engine and never cross the commit boundary.

use crate::{CollectionName, RecordId, UserId};
use thiserror::Error;

/// Errors raised by a [`LocalStore`](crate::LocalStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupted store: {0}")]
    Corrupted(String),

    #[error("store lock poisoned")]
    Poisoned,

    /// A write closure rejected its own transaction.
    #[error("transaction aborted: {0}")]
    Aborted(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Why a commit failed. No partial state persists for any of these.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Missing required context, e.g. no signed-in user.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("record not found: {collection}/{id}")]
    RecordNotFound {
        collection: CollectionName,
        id: RecordId,
    },

    #[error("record {id} belongs to {owner}, not {user}")]
    OwnerMismatch {
        id: RecordId,
        owner: UserId,
        user: UserId,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CommitError {
    pub fn no_active_user() -> Self {
        Self::Configuration("no active user in session".to_string())
    }
}

/// A failed remote call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote call timed out")]
    Timeout,

    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("record already exists remotely: {0}")]
    AlreadyExists(RecordId),

    #[error("record not found remotely: {0}")]
    NotFound(RecordId),

    #[error("unauthorized")]
    Unauthorized,
}

/// Invalid environment configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must not be zero")]
    Zero { key: &'static str },

    #[error("{key} must be at most {limit}, got {value}")]
    TooLarge {
        key: &'static str,
        value: u64,
        limit: u64,
    },

    #[error("OFFSYNC_RETRY_MAX_SECS ({max}) is lower than OFFSYNC_RETRY_BASE_SECS ({base})")]
    RetryBounds { base: u64, max: u64 },
}
