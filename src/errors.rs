#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No tokio runtime available for expiry timers")]
    NoRuntime,

    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StorageError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StorageError::InvalidArgument(msg.into())
    }
}
