//! Signing key lifecycle: generation, revocation, self-test, password
//! change and master-key rotation.

use crate::audit::AuditSink;
use crate::error::{SigningError, SigningResult};
use chrono::{DateTime, Utc};
use signet_crypto::{generate_key_pair, verify_key_pair, DEFAULT_KEY_BITS};
use signet_storage::{Database, KeyStore};
use signet_types::{
    now_millis, AuditEvent, AuditEventType, KeyRecordId, NewKeyRecord, UserId, UserKeyRecord,
};
use signet_vault::PrivateKeyVault;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct KeyManager {
    keys: KeyStore,
    vault: PrivateKeyVault,
    audit: Arc<dyn AuditSink>,
    key_bits: usize,
}

impl KeyManager {
    pub fn new(db: &Database, vault: PrivateKeyVault, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            keys: db.keys(),
            vault,
            audit,
            key_bits: DEFAULT_KEY_BITS,
        }
    }

    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// Generates a key pair for `owner`, seals the private half under
    /// `password` and makes it the owner's only active key.
    pub fn generate_key(
        &self,
        owner: &UserId,
        password: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> SigningResult<UserKeyRecord> {
        // Reject weak passwords before paying for RSA generation.
        self.vault.check_password(password)?;

        let pair = generate_key_pair(self.key_bits)?;
        let bits = pair.bits();
        let encrypted_private_key = self.vault.seal(pair.private_key(), password)?;
        let (public_key, private_key, fingerprint) = pair.into_parts();
        drop(private_key);

        let record = self.keys.insert_active(NewKeyRecord {
            owner_id: owner.clone(),
            public_key,
            encrypted_private_key,
            fingerprint,
            key_bits: bits as u32,
            generated_at: now_millis(),
            expires_at,
        })?;

        self.audit.record(
            &AuditEvent::success(AuditEventType::KeyGenerated)
                .with_actor(owner)
                .with_context("key_id", record.id.to_string())
                .with_context("key_fingerprint", record.fingerprint.clone())
                .with_context("key_size", bits),
        );
        info!("generated {bits}-bit key {} for {owner}", record.id);
        Ok(record)
    }

    /// The owner's active key record, expired or not.
    pub fn active_key(&self, owner: &UserId) -> SigningResult<Option<UserKeyRecord>> {
        Ok(self.keys.active_for(owner)?)
    }

    /// All of the owner's keys, newest first.
    pub fn list_keys(&self, owner: &UserId) -> SigningResult<Vec<UserKeyRecord>> {
        Ok(self.keys.list_for(owner)?)
    }

    pub fn get_key(&self, id: &KeyRecordId) -> SigningResult<Option<UserKeyRecord>> {
        Ok(self.keys.get(id)?)
    }

    /// Deactivates one of the owner's keys. The record is kept so existing
    /// signatures stay verifiable.
    pub fn revoke_key(&self, owner: &UserId, key_id: &KeyRecordId) -> SigningResult<()> {
        let was_active = self.keys.deactivate(owner, key_id)?;
        self.audit.record(
            &AuditEvent::success(AuditEventType::KeyRevoked)
                .with_actor(owner)
                .with_context("key_id", key_id.to_string())
                .with_context("was_active", was_active),
        );
        info!("revoked key {key_id} for {owner}");
        Ok(())
    }

    /// Unseals the key and checks that it still pairs with the stored
    /// public key. Unlock failures are returned as errors.
    pub fn test_key(
        &self,
        owner: &UserId,
        key_id: &KeyRecordId,
        password: &str,
    ) -> SigningResult<bool> {
        let record = self.owned_key(owner, key_id)?;
        let private_key = self.vault.unseal(&record.encrypted_private_key, password)?;
        let ok = verify_key_pair(private_key.expose(), &record.public_key);
        if !ok {
            warn!("key {key_id} does not match its stored public key");
        }
        Ok(ok)
    }

    /// Re-seals the password layer of one key.
    pub fn change_password(
        &self,
        owner: &UserId,
        key_id: &KeyRecordId,
        old_password: &str,
        new_password: &str,
    ) -> SigningResult<()> {
        let record = self.owned_key(owner, key_id)?;
        let resealed =
            self.vault
                .change_password(&record.encrypted_private_key, old_password, new_password)?;
        self.keys.replace_encrypted_key(key_id, &resealed)?;
        debug!("changed password of key {key_id}");
        Ok(())
    }

    /// Re-wraps every stored key under the current master key in one
    /// transaction. Returns how many keys were re-wrapped.
    ///
    /// Keys already under the current master key are skipped, so running
    /// this twice is harmless.
    pub fn rotate_master_key(&self) -> SigningResult<usize> {
        let current = self.vault.provider().current().id().to_string();
        let result = self.keys.rewrap_all::<SigningError, _>(|key| {
            if self.vault.is_current(&key.encrypted_private_key)? {
                return Ok(None);
            }
            Ok(Some(self.vault.rewrap(&key.encrypted_private_key)?))
        });

        match &result {
            Ok(count) => {
                info!("re-wrapped {count} keys under master key {current}");
                self.audit.record(
                    &AuditEvent::success(AuditEventType::MasterKeyRotated)
                        .with_context("master_key_id", current)
                        .with_context("rewrapped", *count),
                );
            }
            Err(e) => {
                warn!("master key rotation rolled back: {e}");
                self.audit.record(
                    &AuditEvent::failure(AuditEventType::MasterKeyRotated)
                        .with_context("master_key_id", current)
                        .with_context("error", e.to_string()),
                );
            }
        }
        result
    }

    fn owned_key(&self, owner: &UserId, key_id: &KeyRecordId) -> SigningResult<UserKeyRecord> {
        self.keys
            .get(key_id)?
            .filter(|k| &k.owner_id == owner)
            .ok_or_else(|| SigningError::KeyNotFound(key_id.to_string()))
    }
}
