/// Error taxonomy for the workflow layer
///
/// `StorageError` is what a durable store can fail with. `WorkflowError` is what
/// the collection and facade return: local outcomes (validation, not found,
/// conflict) plus storage failures propagated unchanged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid workflow: {0}")]
    Validation(String),

    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow already exists: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WorkflowError {
    /// Stable machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
