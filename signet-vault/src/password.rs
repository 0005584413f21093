//! Password layer: Argon2id-derived key -> ChaCha20-Poly1305 over the PEM.
//!
//! The salt and cost parameters travel with the ciphertext so the password
//! is the only input needed to open it.

use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use signet_crypto::{
    decrypt_with_aad, derive_key, encrypt_with_aad, EncryptedData, KdfParams, PrivateKeyPem, Salt,
    SALT_SIZE,
};
use zeroize::Zeroizing;

const FORMAT_VERSION: u8 = 1;
const AAD: &[u8] = b"signet/password-layer/v1";

/// A private key encrypted under a password-derived key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordSealedKey {
    pub version: u8,
    pub salt: [u8; SALT_SIZE],
    pub kdf: KdfParams,
    pub encrypted: EncryptedData,
}

impl PasswordSealedKey {
    pub fn to_bytes(&self) -> VaultResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses the inner layer. Any malformation is reported as
    /// [`VaultError::InvalidCredentials`], the same as a wrong password.
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        let sealed: Self =
            serde_json::from_slice(bytes).map_err(|_| VaultError::InvalidCredentials)?;
        if sealed.version != FORMAT_VERSION {
            return Err(VaultError::InvalidCredentials);
        }
        Ok(sealed)
    }
}

/// Encrypts `private_key` under `password`.
pub fn seal_with_password(
    private_key: &PrivateKeyPem,
    password: &str,
    kdf: &KdfParams,
) -> VaultResult<PasswordSealedKey> {
    let salt = Salt::random();
    let derived = derive_key(password, &salt, kdf)?;
    let encrypted = encrypt_with_aad(&derived, private_key.expose().as_bytes(), AAD)?;

    Ok(PasswordSealedKey {
        version: FORMAT_VERSION,
        salt: *salt.as_bytes(),
        kdf: *kdf,
        encrypted,
    })
}

/// Decrypts a password-sealed key.
pub fn open_with_password(sealed: &PasswordSealedKey, password: &str) -> VaultResult<PrivateKeyPem> {
    let salt = Salt::from_bytes(sealed.salt);
    let derived =
        derive_key(password, &salt, &sealed.kdf).map_err(|_| VaultError::InvalidCredentials)?;
    let plaintext = Zeroizing::new(
        decrypt_with_aad(&derived, &sealed.encrypted, AAD)
            .map_err(|_| VaultError::InvalidCredentials)?,
    );

    let pem = std::str::from_utf8(&plaintext).map_err(|_| VaultError::InvalidCredentials)?;
    Ok(PrivateKeyPem::new(pem))
}
