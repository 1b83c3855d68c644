use std::error::Error;
use thiserror::Error;

/// Result alias for participant source operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by participant sources regardless of the underlying transport.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("participant source unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("participant source rejected the request: {message}")]
    Rejected { message: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct an error for a request the source answered but refused.
    pub fn rejected(message: impl Into<String>) -> Self {
        StorageError::Rejected {
            message: message.into(),
        }
    }
}
