//! Vault error types.

use signet_crypto::CryptoError;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("password too short (min {min} characters)")]
    WeakPassword { min: usize },

    /// Wrong password, or an inner layer that does not authenticate. The two
    /// are reported identically.
    #[error("invalid password or corrupted key")]
    InvalidCredentials,

    /// The master-key layer could not be opened. `detail` is for server-side
    /// logs only; the message shown to users stays generic.
    #[error("cannot unlock key")]
    CorruptedKey { detail: String },

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    pub(crate) fn corrupted(detail: impl Into<String>) -> Self {
        Self::CorruptedKey {
            detail: detail.into(),
        }
    }
}
