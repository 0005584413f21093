//! RSA key-pair generation, PEM codecs and public-key fingerprints.

use crate::error::{CryptoError, CryptoResult};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Modulus size used when the caller does not choose one.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Modulus sizes accepted by [`generate_key_pair`].
pub const SUPPORTED_KEY_BITS: [usize; 3] = [2048, 3072, 4096];

/// A PKCS#8 PEM private key held in zeroizing memory.
///
/// There is no `Display` impl and `Debug` is redacted, so the key cannot end
/// up in a log line by accident.
#[derive(Clone)]
pub struct PrivateKeyPem(Zeroizing<String>);

impl PrivateKeyPem {
    pub fn new(pem: impl Into<String>) -> Self {
        Self(Zeroizing::new(pem.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for PrivateKeyPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyPem([REDACTED])")
    }
}

/// A freshly generated key pair.
///
/// Only the public half and the fingerprint are ever persisted as-is; the
/// private half must go through the vault before it is stored.
#[derive(Debug)]
pub struct KeyPair {
    public_key: String,
    private_key: PrivateKeyPem,
    fingerprint: String,
    bits: usize,
}

impl KeyPair {
    /// SPKI PEM of the public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn private_key(&self) -> &PrivateKeyPem {
        &self.private_key
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Splits the pair, handing ownership of the private key to the caller.
    pub fn into_parts(self) -> (String, PrivateKeyPem, String) {
        (self.public_key, self.private_key, self.fingerprint)
    }
}

/// Generates an RSA key pair with the given modulus size.
pub fn generate_key_pair(bits: usize) -> CryptoResult<KeyPair> {
    if !SUPPORTED_KEY_BITS.contains(&bits) {
        return Err(CryptoError::KeyGeneration(format!(
            "unsupported modulus size: {bits} bits"
        )));
    }

    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| CryptoError::KeyGeneration(format!("failed to generate RSA key: {e}")))?;

    let public_key = private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGeneration(format!("public key encoding failed: {e}")))?;
    let private_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGeneration(format!("private key encoding failed: {e}")))?;

    let fingerprint = fingerprint(&public_key);
    Ok(KeyPair {
        public_key,
        private_key: PrivateKeyPem::new(private_pem.as_str()),
        fingerprint,
        bits,
    })
}

/// Lowercase hex SHA-256 of the public-key PEM text.
pub fn fingerprint(public_key_pem: &str) -> String {
    hex::encode(Sha256::digest(public_key_pem.as_bytes()))
}

/// Parses a PKCS#8 PEM private key, falling back to PKCS#1.
pub fn parse_private_key(pem: &str) -> CryptoResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("malformed private key: {e}")))
}

/// Parses an SPKI PEM public key, falling back to PKCS#1.
pub fn parse_public_key(pem: &str) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("malformed public key: {e}")))
}
