use std::string::FromUtf8Error;

/// Failures a sync call can surface to its caller.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("fetch cancelled")]
    Cancelled,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("storage invariant violated: {0}")]
    StorageInvariantViolation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// Split sqlx failures into "backend unreachable" and everything else.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => SyncError::StorageUnavailable(err.to_string()),
            other => SyncError::Storage(other.to_string()),
        }
    }

    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, SyncError::StorageUnavailable(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

impl From<base64::DecodeError> for SyncError {
    fn from(err: base64::DecodeError) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl From<FromUtf8Error> for SyncError {
    fn from(err: FromUtf8Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}
