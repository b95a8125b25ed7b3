//! Application-wide error types.

use std::path::PathBuf;

use thiserror::Error;
use twitch_api::ApiError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config file not found at {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid config file: {0}")]
    ConfigInvalid(String),

    #[error("Cache file {} is corrupt: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("Cache is not locked: {} does not exist", .0.display())]
    CacheNotLocked(PathBuf),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    pub fn config_invalid(msg: impl Into<String>) -> Self {
        Self::ConfigInvalid(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }
}
