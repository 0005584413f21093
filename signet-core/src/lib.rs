//! Signet signing core.
//!
//! Services over one [`Database`]:
//!
//! - [`KeyManager`]: generate, revoke and self-test signing keys; change key
//!   passwords; re-wrap all keys after a master-key rotation
//! - [`SigningWorkflow`]: sign an approved document with the signer's key
//! - [`VerificationService`]: check stored signatures against content
//!
//! All services are `Send + Sync` and synchronous. Async callers should run
//! them on `tokio::task::spawn_blocking`, since key generation and Argon2 are
//! CPU-bound.

pub mod audit;
pub mod config;
mod error;
pub mod keys;
pub mod policy;
pub mod verification;
pub mod workflow;

pub use audit::{AuditSink, MultiAuditSink, StoreAuditSink, TracingAuditSink};
pub use config::{MasterKeyConfig, SignetConfig};
pub use error::{SigningError, SigningResult};
pub use keys::KeyManager;
pub use policy::{AssignedSignerPolicy, SigningPolicy};
pub use verification::{SignatureInfo, VerificationChecks, VerificationResult, VerificationService};
pub use workflow::{SignRequest, SigningWorkflow};

use signet_storage::Database;
use signet_vault::PrivateKeyVault;
use std::sync::Arc;
use tracing::info;

/// Installs a `tracing` subscriber writing to stderr, filtered by
/// `RUST_LOG` (default `info`). Does nothing if one is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// The three services wired to one database, vault and audit sink.
#[derive(Clone)]
pub struct Signet {
    pub db: Database,
    pub keys: KeyManager,
    pub workflow: SigningWorkflow,
    pub verification: VerificationService,
}

impl Signet {
    /// Opens the configured database and builds every service.
    ///
    /// Audit events go to the `audit_events` table and to `tracing`.
    pub fn from_config(config: &SignetConfig) -> SigningResult<Self> {
        config.validate()?;
        let db = match &config.database_path {
            Some(path) => Database::open(path)?,
            None => Database::open_in_memory()?,
        };
        let audit: Arc<dyn AuditSink> = Arc::new(
            MultiAuditSink::new()
                .with(Arc::new(StoreAuditSink::new(db.audit())))
                .with(Arc::new(TracingAuditSink)),
        );
        let vault = PrivateKeyVault::new(Arc::new(config.key_ring()?))
            .with_kdf(config.kdf)
            .with_min_password_len(config.min_password_len);

        info!(
            "signet ready (key_bits={}, master_keys={})",
            config.key_bits,
            config.master_keys.len()
        );
        Ok(Self::with_parts(
            db,
            vault,
            Arc::new(AssignedSignerPolicy),
            audit,
            config.key_bits,
        ))
    }

    /// Wires services from explicit parts.
    pub fn with_parts(
        db: Database,
        vault: PrivateKeyVault,
        policy: Arc<dyn SigningPolicy>,
        audit: Arc<dyn AuditSink>,
        key_bits: usize,
    ) -> Self {
        let keys = KeyManager::new(&db, vault.clone(), audit.clone()).with_key_bits(key_bits);
        let workflow = SigningWorkflow::new(&db, vault, policy, audit.clone());
        let verification = VerificationService::new(&db, audit);
        Self {
            db,
            keys,
            workflow,
            verification,
        }
    }
}
