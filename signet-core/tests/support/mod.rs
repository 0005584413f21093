//! Shared helpers for signet-core integration tests.

#![allow(dead_code)]

use signet_core::{AssignedSignerPolicy, AuditSink, Signet};
use signet_crypto::{KdfParams, DEFAULT_KEY_BITS};
use signet_storage::Database;
use signet_types::{AuditEvent, AuditEventType, Document, DocumentId, DocumentStatus, UserId};
use signet_vault::{MasterKey, MasterKeyRing, PrivateKeyVault};
use std::sync::{Arc, Mutex};

pub const PASSWORD: &str = "correct-password";
pub const CONTENT: &[u8] = b"Hello, Letter";

/// Keeps every event it is given.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub struct Harness {
    pub signet: Signet,
    pub audit: Arc<RecordingAuditSink>,
}

impl Harness {
    pub fn db(&self) -> &Database {
        &self.signet.db
    }
}

/// Fresh in-memory services with a single master key and cheap KDF
/// parameters.
pub fn harness() -> Harness {
    harness_with(
        Database::open_in_memory().unwrap(),
        MasterKeyRing::new(MasterKey::generate("m1")),
    )
}

/// Services over an existing database and a specific master key ring.
pub fn harness_with(db: Database, ring: MasterKeyRing) -> Harness {
    let audit = Arc::new(RecordingAuditSink::default());
    let vault = PrivateKeyVault::new(Arc::new(ring)).with_kdf(KdfParams::insecure_fast());
    let signet = Signet::with_parts(
        db,
        vault,
        Arc::new(AssignedSignerPolicy),
        audit.clone(),
        DEFAULT_KEY_BITS,
    );
    Harness { signet, audit }
}

/// Inserts an approved document assigned to `signer`.
pub fn approved_document(db: &Database, id: &str, signer: &str) -> DocumentId {
    document_in(db, id, signer, DocumentStatus::Approved)
}

pub fn document_in(db: &Database, id: &str, signer: &str, status: DocumentStatus) -> DocumentId {
    let doc = Document {
        id: DocumentId::from(id),
        status,
        signer_id: Some(UserId::from(signer)),
        content: CONTENT.to_vec(),
        signed_at: None,
    };
    db.documents().upsert(&doc).unwrap();
    doc.id
}
