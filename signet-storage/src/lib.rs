//! SQLite storage layer for Signet.
//!
//! One connection is shared by four typed stores:
//!
//! - [`KeyStore`]: user signing keys, at most one active per owner
//! - [`SignatureStore`]: immutable signature records
//! - [`DocumentStore`]: the letter status/content view the core reads
//! - [`AuditStore`]: append-only audit events
//!
//! Invariants that must survive concurrent writers live in the schema: a
//! partial unique index allows one active key per owner, a unique
//! constraint allows one signature per `(document, signer)`, and triggers
//! reject updates and deletes of signature rows.

mod audit_store;
mod codec;
mod document_store;
mod error;
mod key_store;
mod schema;
mod signature_store;

pub use audit_store::AuditStore;
pub use document_store::DocumentStore;
pub use error::{StorageError, StorageResult};
pub use key_store::KeyStore;
pub use signature_store::SignatureStore;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub(crate) type SharedConnection = Arc<Mutex<Connection>>;

pub(crate) fn lock(conn: &SharedConnection) -> StorageResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Handle to the Signet database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: SharedConnection,
}

impl Database {
    /// Opens or creates a database file and applies the schema.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        // WAL keeps readers unblocked while a signing transaction commits.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        debug!("opened signet database at {} (journal_mode={mode})", path.display());
        Self::from_connection(conn)
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn keys(&self) -> KeyStore {
        KeyStore::new(self.conn.clone())
    }

    pub fn signatures(&self) -> SignatureStore {
        SignatureStore::new(self.conn.clone())
    }

    pub fn documents(&self) -> DocumentStore {
        DocumentStore::new(self.conn.clone())
    }

    pub fn audit(&self) -> AuditStore {
        AuditStore::new(self.conn.clone())
    }
}
