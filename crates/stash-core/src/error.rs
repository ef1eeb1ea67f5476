use stash_domain::{DateWindowError, DocumentPathError, MonthKeyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Transaction aborted after {attempts} conflicting attempts")]
    Conflict { attempts: usize },
    #[error("Batch of {size} writes exceeds the per-commit limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("{} of {total_chunks} batch commits failed: {first_error}", .failed_chunks.len())]
    PartialCommit {
        failed_chunks: Vec<usize>,
        total_chunks: usize,
        first_error: String,
    },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Notification delivery failed: {0}")]
    Notification(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serde(err.to_string())
    }
}

impl From<DateWindowError> for CoreError {
    fn from(err: DateWindowError) -> Self {
        CoreError::InvalidOperation(err.to_string())
    }
}

impl From<MonthKeyError> for CoreError {
    fn from(err: MonthKeyError) -> Self {
        CoreError::InvalidOperation(err.to_string())
    }
}

impl From<DocumentPathError> for CoreError {
    fn from(err: DocumentPathError) -> Self {
        CoreError::InvalidOperation(err.to_string())
    }
}
