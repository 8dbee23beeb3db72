//! Storage errors
//!
//! TigerStyle: One error enum for both backends, constructors for the common
//! string-carrying cases.

use crate::models::ModelError;

/// Result alias used throughout the storage layer.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Durable state exists but cannot be loaded
    #[error("malformed storage file {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database backend used before `reload()` opened a session
    #[error("no open session: reload() must be called before {0}()")]
    SessionClosed(&'static str),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn malformed(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Malformed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
