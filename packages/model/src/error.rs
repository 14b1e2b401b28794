use thiserror::Error;

/// Errors raised by structural lookups and integrity checks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),
}

/// Model Result type alias
pub type ModelResult<T> = Result<T, ModelError>;
