//! Error taxonomy surfaced to callers of the signing core.

use signet_crypto::CryptoError;
use signet_storage::StorageError;
use signet_types::{DocumentId, UserId};
use signet_vault::VaultError;
use thiserror::Error;

pub type SigningResult<T> = Result<T, SigningError>;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("password too short (min {min} characters)")]
    WeakPassword { min: usize },

    /// Never says whether the password or the inner key layer was at fault.
    #[error("invalid password or corrupted key")]
    InvalidCredentials,

    /// The server-side key layer could not be opened.
    #[error("cannot unlock key")]
    CorruptedKey,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("crypto provider error: {0}")]
    CryptoProvider(String),

    #[error("no active signing key for {0}")]
    NoActiveKey(UserId),

    #[error("document {document_id} is already signed by {signer_id}")]
    DuplicateSignature {
        document_id: String,
        signer_id: String,
    },

    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("document {document_id} cannot be signed: {reason}")]
    NotSignable {
        document_id: DocumentId,
        reason: String,
    },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SigningError {
    /// Benign outcome of a signing race: the document is already signed by
    /// this signer and nothing needs to be retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateSignature { .. })
    }
}

impl From<CryptoError> for SigningError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyGeneration(msg) => Self::KeyGeneration(msg),
            CryptoError::InvalidKey(msg) => Self::InvalidKey(msg),
            CryptoError::InvalidKeyLength { .. } => Self::InvalidKey(err.to_string()),
            CryptoError::KeyDerivation(_)
            | CryptoError::Encryption(_)
            | CryptoError::Decryption
            | CryptoError::Provider(_) => Self::CryptoProvider(err.to_string()),
        }
    }
}

impl From<VaultError> for SigningError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::WeakPassword { min } => Self::WeakPassword { min },
            VaultError::InvalidCredentials => Self::InvalidCredentials,
            // The detail was already logged by the vault.
            VaultError::CorruptedKey { .. } => Self::CorruptedKey,
            VaultError::Crypto(e) => e.into(),
            VaultError::Serialization(e) => Self::CryptoProvider(e.to_string()),
        }
    }
}

impl From<StorageError> for SigningError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateSignature {
                document_id,
                signer_id,
            } => Self::DuplicateSignature {
                document_id,
                signer_id,
            },
            StorageError::DocumentNotFound(id) => Self::DocumentNotFound(DocumentId::from(id)),
            StorageError::InvalidTransition {
                document_id, from, ..
            } => Self::NotSignable {
                document_id: DocumentId::from(document_id),
                reason: format!("document is {from}, not approved"),
            },
            StorageError::KeyNotFound(id) => Self::KeyNotFound(id),
            other => Self::Storage(other),
        }
    }
}
