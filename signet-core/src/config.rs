//! Signet configuration.

use crate::error::{SigningError, SigningResult};
use serde::{Deserialize, Serialize};
use signet_crypto::{KdfParams, DEFAULT_KEY_BITS, SUPPORTED_KEY_BITS};
use signet_vault::{MasterKey, MasterKeyRing, MIN_PASSWORD_LEN};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable that supplies the current master secret (base64).
pub const MASTER_KEY_ENV: &str = "SIGNET_MASTER_KEY";

/// Optional id for the master secret taken from [`MASTER_KEY_ENV`].
pub const MASTER_KEY_ID_ENV: &str = "SIGNET_MASTER_KEY_ID";

/// One configured master key. The secret is base64 of 32 random bytes.
#[derive(Clone, Serialize, Deserialize)]
pub struct MasterKeyConfig {
    pub id: String,
    pub secret_b64: String,
}

impl fmt::Debug for MasterKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeyConfig")
            .field("id", &self.id)
            .field("secret_b64", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for the signing core.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SignetConfig {
    /// SQLite database file. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,

    /// RSA modulus size for newly generated keys.
    pub key_bits: usize,

    /// Minimum password length in characters. Never below 8.
    pub min_password_len: usize,

    /// Argon2id cost for newly sealed keys.
    pub kdf: KdfParams,

    /// Master keys, current first. Later entries are retired keys kept
    /// until every stored key has been re-wrapped.
    pub master_keys: Vec<MasterKeyConfig>,
}

impl Default for SignetConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            key_bits: DEFAULT_KEY_BITS,
            min_password_len: MIN_PASSWORD_LEN,
            kdf: KdfParams::default(),
            master_keys: Vec::new(),
        }
    }
}

impl SignetConfig {
    pub fn from_toml_str(raw: &str) -> SigningResult<Self> {
        toml::from_str(raw).map_err(|e| SigningError::Config(e.to_string()))
    }

    /// Reads a TOML file, applies environment overrides and validates.
    pub fn load(path: &Path) -> SigningResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SigningError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Applies [`MASTER_KEY_ENV`] from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// A master secret from the environment becomes the current key; a
    /// configured key with the same id is replaced, the rest stay retired.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let Some(secret) = lookup(MASTER_KEY_ENV).filter(|s| !s.trim().is_empty()) else {
            return;
        };
        let id = lookup(MASTER_KEY_ID_ENV)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "env".to_string());
        self.master_keys.retain(|k| k.id != id);
        self.master_keys.insert(
            0,
            MasterKeyConfig {
                id,
                secret_b64: secret,
            },
        );
    }

    pub fn validate(&self) -> SigningResult<()> {
        if !SUPPORTED_KEY_BITS.contains(&self.key_bits) {
            return Err(SigningError::Config(format!(
                "key_bits must be one of {SUPPORTED_KEY_BITS:?}, got {}",
                self.key_bits
            )));
        }
        if self.min_password_len < MIN_PASSWORD_LEN {
            return Err(SigningError::Config(format!(
                "min_password_len must be at least {MIN_PASSWORD_LEN}, got {}",
                self.min_password_len
            )));
        }
        if self.master_keys.is_empty() {
            return Err(SigningError::Config(format!(
                "no master key configured (set master_keys or {MASTER_KEY_ENV})"
            )));
        }
        for (i, key) in self.master_keys.iter().enumerate() {
            if self.master_keys[..i].iter().any(|k| k.id == key.id) {
                return Err(SigningError::Config(format!(
                    "duplicate master key id {}",
                    key.id
                )));
            }
        }
        self.key_ring().map(|_| ())
    }

    /// Builds the master key ring: the first key is current.
    pub fn key_ring(&self) -> SigningResult<MasterKeyRing> {
        let mut keys = self.master_keys.iter().map(|k| {
            MasterKey::from_base64(k.id.clone(), &k.secret_b64)
                .map_err(|e| SigningError::Config(format!("master key {}: {e}", k.id)))
        });
        let current = keys
            .next()
            .ok_or_else(|| SigningError::Config("no master key configured".into()))??;
        keys.try_fold(MasterKeyRing::new(current), |ring, key| {
            Ok(ring.with_retired(key?))
        })
    }
}
