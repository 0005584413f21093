//! Cryptographic primitives for Signet.
//!
//! Provides:
//! - Argon2id key derivation from passwords
//! - ChaCha20-Poly1305 authenticated encryption
//! - RSA key-pair generation and public-key fingerprints
//! - RSASSA-PKCS1-v1_5 / SHA-256 content signatures
//!
//! # Architecture
//!
//! Two independent families live here:
//!
//! 1. **Symmetric** (`key`, `cipher`): used by the vault to protect private
//!    keys at rest, once under a password-derived key and once under the
//!    server master key.
//!
//! 2. **Asymmetric** (`keycodec`, `signature`): the signing keys
//!    themselves. Keys travel as PEM text (SPKI for public keys, PKCS#8 for
//!    private keys) so the persisted format does not depend on this crate's
//!    internal types.
//!
//! Private-key material is held in zeroizing containers and is never
//! formatted by `Debug`.

mod cipher;
mod error;
mod key;
pub mod keycodec;
pub mod signature;

pub use cipher::{decrypt, decrypt_with_aad, encrypt, encrypt_with_aad, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use keycodec::{
    fingerprint, generate_key_pair, KeyPair, PrivateKeyPem, DEFAULT_KEY_BITS, SUPPORTED_KEY_BITS,
};
pub use signature::{content_hash, sign, verify, verify_key_pair, SignedContent, SIGNATURE_ALGORITHM};
