//! Master-key layer: server-side encryption of the password-sealed blob.
//!
//! Every outer blob names the master key that wrapped it, so a key ring can
//! keep opening blobs sealed under retired keys until they are re-wrapped.

use crate::error::{VaultError, VaultResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use signet_crypto::{decrypt_with_aad, encrypt_with_aad, generate_random_key, DerivedKey, EncryptedData};
use std::fmt;
use zeroize::Zeroizing;

const FORMAT_VERSION: u8 = 1;

/// A server master key and the id it is known by.
#[derive(Clone)]
pub struct MasterKey {
    id: String,
    key: DerivedKey,
}

impl MasterKey {
    pub fn new(id: impl Into<String>, key: DerivedKey) -> Self {
        Self { id: id.into(), key }
    }

    /// Generates a random master key.
    pub fn generate(id: impl Into<String>) -> Self {
        Self::new(id, generate_random_key())
    }

    /// Parses a base64-encoded 32-byte secret. A `base64:` prefix is accepted.
    pub fn from_base64(id: impl Into<String>, encoded: &str) -> VaultResult<Self> {
        let trimmed = encoded.trim();
        let body = trimmed.strip_prefix("base64:").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            STANDARD
                .decode(body)
                .map_err(|e| VaultError::corrupted(format!("master key is not base64: {e}")))?,
        );
        Ok(Self::new(id, DerivedKey::from_slice(&bytes)?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn key(&self) -> &DerivedKey {
        &self.key
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Supplies the server-wide master keys.
pub trait MasterSecretProvider: Send + Sync {
    /// Key used for all new wrapping.
    fn current(&self) -> &MasterKey;

    /// Looks up a key (current or retired) by id.
    fn by_id(&self, id: &str) -> Option<&MasterKey>;
}

/// The current master key plus any retired keys still needed to open
/// blobs that have not been re-wrapped yet.
#[derive(Clone, Debug)]
pub struct MasterKeyRing {
    current: MasterKey,
    retired: Vec<MasterKey>,
}

impl MasterKeyRing {
    pub fn new(current: MasterKey) -> Self {
        Self {
            current,
            retired: Vec::new(),
        }
    }

    pub fn with_retired(mut self, key: MasterKey) -> Self {
        self.retired.push(key);
        self
    }

    /// Makes `next` current and keeps the previous key as retired.
    pub fn rotate(&mut self, next: MasterKey) {
        let previous = std::mem::replace(&mut self.current, next);
        self.retired.retain(|k| k.id != previous.id);
        self.retired.push(previous);
    }

    /// Drops a retired key. Returns whether it was present.
    pub fn forget(&mut self, id: &str) -> bool {
        let before = self.retired.len();
        self.retired.retain(|k| k.id != id);
        before != self.retired.len()
    }

    pub fn retired_ids(&self) -> impl Iterator<Item = &str> {
        self.retired.iter().map(|k| k.id.as_str())
    }
}

impl MasterSecretProvider for MasterKeyRing {
    fn current(&self) -> &MasterKey {
        &self.current
    }

    fn by_id(&self, id: &str) -> Option<&MasterKey> {
        if self.current.id == id {
            return Some(&self.current);
        }
        self.retired.iter().find(|k| k.id == id)
    }
}

/// Outer blob as persisted in `encrypted_private_key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterSealedBlob {
    pub version: u8,
    pub key_id: String,
    pub encrypted: EncryptedData,
}

impl MasterSealedBlob {
    /// Storage form: base64 of the JSON document.
    pub fn encode(&self) -> VaultResult<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    /// Any malformation here is storage corruption, not a bad password.
    pub fn decode(stored: &str) -> VaultResult<Self> {
        let bytes = STANDARD
            .decode(stored.trim())
            .map_err(|e| VaultError::corrupted(format!("outer blob is not base64: {e}")))?;
        let blob: Self = serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::corrupted(format!("outer blob is not valid JSON: {e}")))?;
        if blob.version != FORMAT_VERSION {
            return Err(VaultError::corrupted(format!(
                "unsupported outer blob version {}",
                blob.version
            )));
        }
        Ok(blob)
    }
}

fn aad_for(key_id: &str) -> Vec<u8> {
    format!("signet/master-layer/v1/{key_id}").into_bytes()
}

/// Encrypts `inner` under `master`.
pub fn wrap(inner: &[u8], master: &MasterKey) -> VaultResult<MasterSealedBlob> {
    let encrypted = encrypt_with_aad(master.key(), inner, &aad_for(master.id()))?;
    Ok(MasterSealedBlob {
        version: FORMAT_VERSION,
        key_id: master.id().to_string(),
        encrypted,
    })
}

/// Decrypts an outer blob with whichever key the provider holds for it.
pub fn unwrap(
    blob: &MasterSealedBlob,
    provider: &dyn MasterSecretProvider,
) -> VaultResult<Zeroizing<Vec<u8>>> {
    let master = provider
        .by_id(&blob.key_id)
        .ok_or_else(|| VaultError::corrupted(format!("unknown master key id {:?}", blob.key_id)))?;

    decrypt_with_aad(master.key(), &blob.encrypted, &aad_for(&blob.key_id))
        .map(Zeroizing::new)
        .map_err(|_| {
            VaultError::corrupted(format!(
                "outer layer failed to authenticate under master key {:?}",
                blob.key_id
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trip() {
        let ring = MasterKeyRing::new(MasterKey::generate("m1"));
        let blob = wrap(b"inner", ring.current()).unwrap();
        assert_eq!(blob.key_id, "m1");
        assert_eq!(unwrap(&blob, &ring).unwrap().as_slice(), b"inner");
    }

    #[test]
    fn unknown_key_id_is_corrupted() {
        let sealed_under = MasterKey::generate("m1");
        let blob = wrap(b"inner", &sealed_under).unwrap();
        let ring = MasterKeyRing::new(MasterKey::generate("m2"));
        assert!(matches!(
            unwrap(&blob, &ring),
            Err(VaultError::CorruptedKey { .. })
        ));
    }

    #[test]
    fn relabelled_key_id_fails_authentication() {
        let m1 = MasterKey::generate("m1");
        let ring = MasterKeyRing::new(MasterKey::new("m2", m1.key().clone())).with_retired(m1.clone());
        let mut blob = wrap(b"inner", &m1).unwrap();
        blob.key_id = "m2".into();
        assert!(matches!(
            unwrap(&blob, &ring),
            Err(VaultError::CorruptedKey { .. })
        ));
    }

    #[test]
    fn rotate_keeps_previous_key_available() {
        let mut ring = MasterKeyRing::new(MasterKey::generate("m1"));
        let old_blob = wrap(b"inner", ring.current()).unwrap();

        ring.rotate(MasterKey::generate("m2"));
        assert_eq!(ring.current().id(), "m2");
        assert_eq!(ring.retired_ids().collect::<Vec<_>>(), vec!["m1"]);
        assert_eq!(unwrap(&old_blob, &ring).unwrap().as_slice(), b"inner");

        assert!(ring.forget("m1"));
        assert!(unwrap(&old_blob, &ring).is_err());
    }

    #[test]
    fn encode_decode_storage_form() {
        let blob = wrap(b"inner", &MasterKey::generate("m1")).unwrap();
        let stored = blob.encode().unwrap();
        assert_eq!(MasterSealedBlob::decode(&stored).unwrap(), blob);
    }

    #[test]
    fn garbage_storage_form_is_corrupted() {
        for stored in ["", "%%%", "bm90IGpzb24="] {
            assert!(matches!(
                MasterSealedBlob::decode(stored),
                Err(VaultError::CorruptedKey { .. })
            ));
        }
    }

    #[test]
    fn master_key_from_base64() {
        let encoded = STANDARD.encode([9u8; 32]);
        let key = MasterKey::from_base64("app", &format!("base64:{encoded}")).unwrap();
        assert_eq!(key.id(), "app");
        assert!(MasterKey::from_base64("app", &STANDARD.encode([1u8; 16])).is_err());
    }

    #[test]
    fn debug_hides_key_material() {
        let key = MasterKey::new("m1", DerivedKey::from_bytes([0xAB; 32]));
        let dbg = format!("{key:?}");
        assert!(dbg.contains("m1"));
        assert!(!dbg.contains("171"));
    }
}
