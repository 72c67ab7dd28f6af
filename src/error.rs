use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already completed")]
    AlreadyCompleted(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} has expired")]
    Expired(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TrackerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
