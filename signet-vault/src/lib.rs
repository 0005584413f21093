//! Private key protection for Signet.
//!
//! A signing key is stored double-wrapped:
//!
//! 1. **Password layer** ([`password`]): only the key owner can open it.
//!    Failures here are always [`VaultError::InvalidCredentials`], whether
//!    the password was wrong or the inner bytes are damaged.
//!
//! 2. **Master layer** ([`master`]): the server master key wraps the
//!    password-sealed blob for storage. Failures here are
//!    [`VaultError::CorruptedKey`] and point at storage damage or a missing
//!    master key rather than at the user.
//!
//! The layers are separate types so the master layer can be re-wrapped
//! during master-key rotation without knowing any user password, and the
//! password layer can be re-sealed on password change without touching the
//! master key.

mod error;
pub mod master;
pub mod password;

pub use error::{VaultError, VaultResult};
pub use master::{MasterKey, MasterKeyRing, MasterSealedBlob, MasterSecretProvider};
pub use password::PasswordSealedKey;

use signet_crypto::{KdfParams, PrivateKeyPem};
use std::sync::Arc;
use tracing::{debug, warn};

/// Passwords shorter than this are always rejected.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Seals and unseals private keys through both layers.
#[derive(Clone)]
pub struct PrivateKeyVault {
    provider: Arc<dyn MasterSecretProvider>,
    kdf: KdfParams,
    min_password_len: usize,
}

impl PrivateKeyVault {
    pub fn new(provider: Arc<dyn MasterSecretProvider>) -> Self {
        Self {
            provider,
            kdf: KdfParams::default(),
            min_password_len: MIN_PASSWORD_LEN,
        }
    }

    /// Argon2id parameters for newly sealed keys. Existing keys keep theirs.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Raises the minimum password length. Values below
    /// [`MIN_PASSWORD_LEN`] are ignored.
    pub fn with_min_password_len(mut self, min: usize) -> Self {
        self.min_password_len = min.max(MIN_PASSWORD_LEN);
        self
    }

    pub fn min_password_len(&self) -> usize {
        self.min_password_len
    }

    pub fn provider(&self) -> &dyn MasterSecretProvider {
        self.provider.as_ref()
    }

    /// Rejects passwords below the minimum length (counted in characters).
    pub fn check_password(&self, password: &str) -> VaultResult<()> {
        if password.chars().count() < self.min_password_len {
            return Err(VaultError::WeakPassword {
                min: self.min_password_len,
            });
        }
        Ok(())
    }

    /// Password layer, then master layer. Returns the storage form.
    pub fn seal(&self, private_key: &PrivateKeyPem, password: &str) -> VaultResult<String> {
        self.check_password(password)?;
        let inner = password::seal_with_password(private_key, password, &self.kdf)?;
        let outer = master::wrap(&inner.to_bytes()?, self.provider.current())?;
        outer.encode()
    }

    /// Reverses [`seal`](Self::seal).
    pub fn unseal(&self, stored: &str, password: &str) -> VaultResult<PrivateKeyPem> {
        let inner = self.open_outer(stored)?;
        password::open_with_password(&inner, password).inspect_err(|_| {
            debug!("password layer rejected unlock attempt");
        })
    }

    /// Re-wraps the master layer under the provider's current key.
    ///
    /// The password layer is carried over byte for byte.
    pub fn rewrap(&self, stored: &str) -> VaultResult<String> {
        let outer = MasterSealedBlob::decode(stored).inspect_err(log_corruption)?;
        let inner = master::unwrap(&outer, self.provider.as_ref()).inspect_err(log_corruption)?;
        master::wrap(&inner, self.provider.current())?.encode()
    }

    /// Whether `stored` is already wrapped under the current master key.
    pub fn is_current(&self, stored: &str) -> VaultResult<bool> {
        let outer = MasterSealedBlob::decode(stored)?;
        Ok(outer.key_id == self.provider.current().id())
    }

    /// Re-seals the password layer under a new password.
    pub fn change_password(
        &self,
        stored: &str,
        old_password: &str,
        new_password: &str,
    ) -> VaultResult<String> {
        self.check_password(new_password)?;
        let private_key = self.unseal(stored, old_password)?;
        self.seal(&private_key, new_password)
    }

    fn open_outer(&self, stored: &str) -> VaultResult<PasswordSealedKey> {
        let outer = MasterSealedBlob::decode(stored).inspect_err(log_corruption)?;
        let inner = master::unwrap(&outer, self.provider.as_ref()).inspect_err(log_corruption)?;
        PasswordSealedKey::from_bytes(&inner)
    }
}

fn log_corruption(err: &VaultError) {
    if let VaultError::CorruptedKey { detail } = err {
        warn!("stored private key could not be opened: {detail}");
    }
}
