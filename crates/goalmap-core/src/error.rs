//! Error types for GoalMap.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Corrupt checkpoint for {user}/{task_type}: {reason}")]
    CorruptCheckpoint {
        user: String,
        task_type: String,
        reason: String,
    },

    #[error("No objectives for user {0}")]
    NoObjectives(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error came from an embedding or classifier backend.
    pub fn is_provider(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Classifier(_) | Error::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
