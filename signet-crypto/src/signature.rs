//! Content signatures: RSASSA-PKCS1-v1_5 over SHA-256.
//!
//! PKCS#1 v1.5 is deterministic, so a given key and content always yield
//! the same signature bytes.

use crate::error::{CryptoError, CryptoResult};
use crate::keycodec::{parse_private_key, parse_public_key};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};

/// Algorithm tag recorded next to every signature.
pub const SIGNATURE_ALGORITHM: &str = "SHA256withRSA";

/// Output of [`sign`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedContent {
    /// Base64 (standard alphabet, padded) of the raw signature.
    pub signature: String,
    /// Lowercase hex SHA-256 of the signed content.
    pub content_hash: String,
}

/// Lowercase hex SHA-256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Signs `content` with a PEM private key.
pub fn sign(content: &[u8], private_key_pem: &str) -> CryptoResult<SignedContent> {
    let key = parse_private_key(private_key_pem)?;
    let hashed = Sha256::digest(content);

    let mut rng = rand::thread_rng();
    let raw = key
        .sign_with_rng(&mut rng, Pkcs1v15Sign::new::<Sha256>(), &hashed)
        .map_err(|e| CryptoError::Provider(format!("RSA signing failed: {e}")))?;

    Ok(SignedContent {
        signature: STANDARD.encode(raw),
        content_hash: hex::encode(hashed),
    })
}

/// Checks a base64 signature over `content` against a PEM public key.
///
/// Total over its inputs: a malformed key, an undecodable signature and a
/// mismatch all yield `false`.
pub fn verify(content: &[u8], signature_b64: &str, public_key_pem: &str) -> bool {
    let Ok(public) = parse_public_key(public_key_pem) else {
        return false;
    };
    let Ok(raw) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let hashed = Sha256::digest(content);
    public
        .verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, &raw)
        .is_ok()
}

/// Whether a private and a public key belong together, by signing a probe
/// message and verifying it.
pub fn verify_key_pair(private_key_pem: &str, public_key_pem: &str) -> bool {
    const PROBE: &[u8] = b"signet-key-pair-probe";
    match sign(PROBE, private_key_pem) {
        Ok(signed) => verify(PROBE, &signed.signature, public_key_pem),
        Err(_) => false,
    }
}
