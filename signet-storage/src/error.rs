//! Storage error types.

use signet_types::DocumentStatus;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    LockPoisoned,

    #[error("document {document_id} is already signed by {signer_id}")]
    DuplicateSignature {
        document_id: String,
        signer_id: String,
    },

    #[error("fingerprint already registered: {0}")]
    DuplicateFingerprint(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("document {document_id} cannot move from {from} to {to}")]
    InvalidTransition {
        document_id: String,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}
