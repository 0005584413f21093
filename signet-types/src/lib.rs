//! Shared identifiers and record types for Signet.
//!
//! These types cross every crate boundary in the workspace: the storage
//! layer persists them, the signing services produce them and callers
//! outside the core (letter workflow, audit views) read them.

mod audit;
mod ids;
mod records;

pub use audit::{AuditEvent, AuditEventType, AuditOutcome, ParseAuditError};
pub use ids::{AuditEventId, DocumentId, KeyRecordId, SignatureId, UserId};
pub use records::{
    now_millis, Document, DocumentStatus, NewKeyRecord, NewSignatureRecord, ParseStatusError,
    RequestOrigin, SignatureRecord, UserKeyRecord,
};
