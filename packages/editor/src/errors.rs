//! Error types for the editor

use crate::authority::Authority;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Operation error: {0}")]
    Operation(#[from] crate::operations::OperationError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] crate::bridge::BridgeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document {document_id} is authored by {authority}, update rejected")]
    AuthorityConflict {
        document_id: String,
        authority: Authority,
    },

    #[error("No text bridge registered for {0}")]
    NoBridge(String),

    #[error("Operation {0} has no inverse")]
    NotInvertible(String),

    #[error("View not found: {0}")]
    ViewNotFound(String),
}

/// Editor Result type alias
pub type EditorResult<T> = Result<T, EditorError>;
