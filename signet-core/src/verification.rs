//! Independent verification of a document's signature.

use crate::audit::AuditSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signet_crypto::{content_hash, verify};
use signet_storage::{Database, KeyStore, SignatureStore};
use signet_types::{
    AuditEvent, AuditEventType, DocumentId, RequestOrigin, SignatureId, SignatureRecord, UserId,
};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationChecks {
    pub signature_valid: bool,
    pub content_unchanged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature_id: SignatureId,
    pub signer_id: UserId,
    pub signed_at: DateTime<Utc>,
    pub algorithm: String,
    /// `None` when the key record the signature points at is missing.
    pub key_fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub checks: VerificationChecks,
    pub signature_info: Option<SignatureInfo>,
    pub message: Option<String>,
}

impl VerificationResult {
    fn unverified(message: impl Into<String>) -> Self {
        Self {
            verified: false,
            checks: VerificationChecks::default(),
            signature_info: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Clone)]
pub struct VerificationService {
    signatures: SignatureStore,
    keys: KeyStore,
    audit: Arc<dyn AuditSink>,
}

impl VerificationService {
    pub fn new(db: &Database, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            signatures: db.signatures(),
            keys: db.keys(),
            audit,
        }
    }

    /// Checks `content` against the signature stored for `document_id`.
    ///
    /// Never fails: missing signatures, missing keys and storage errors all
    /// come back as an unverified result with a message.
    pub fn verify(&self, document_id: &DocumentId, content: &[u8]) -> VerificationResult {
        let record = match self.signatures.for_document(document_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return VerificationResult::unverified("document has no signature");
            }
            Err(e) => {
                warn!("signature lookup for {document_id} failed: {e}");
                return VerificationResult::unverified("signature could not be loaded");
            }
        };
        self.check(&record, content)
    }

    /// [`verify`](Self::verify), then records a `signature.verified` event.
    pub fn verify_and_record(
        &self,
        document_id: &DocumentId,
        content: &[u8],
        actor: Option<&UserId>,
        origin: &RequestOrigin,
    ) -> VerificationResult {
        let result = self.verify(document_id, content);

        let mut event = AuditEvent::success(AuditEventType::SignatureVerified)
            .with_origin(origin)
            .with_context("document_id", document_id.to_string())
            .with_context("verification_result", result.verified)
            .with_context("signature_valid", result.checks.signature_valid)
            .with_context("content_unchanged", result.checks.content_unchanged);
        if let Some(actor) = actor {
            event = event.with_actor(actor);
        }
        if let Some(info) = &result.signature_info {
            event = event.with_context("signature_id", info.signature_id.to_string());
        }
        self.audit.record(&event);

        result
    }

    fn check(&self, record: &SignatureRecord, content: &[u8]) -> VerificationResult {
        let content_unchanged = content_hash(content) == record.content_hash;

        let key = match self.keys.get(&record.key_record_id) {
            Ok(key) => key,
            Err(e) => {
                warn!("key lookup for signature {} failed: {e}", record.id);
                None
            }
        };

        let signature_valid = key
            .as_ref()
            .is_some_and(|k| verify(content, &record.signature, &k.public_key));
        let verified = content_unchanged && signature_valid;

        let message = match (&key, content_unchanged, signature_valid) {
            (None, _, _) => Some("signing key record not found".to_string()),
            (Some(_), true, true) => None,
            (Some(_), false, _) => Some("content has changed since signing".to_string()),
            (Some(_), true, false) => Some("signature does not match the signing key".to_string()),
        };
        debug!(
            "verified {}: content_unchanged={content_unchanged} signature_valid={signature_valid}",
            record.document_id
        );

        VerificationResult {
            verified,
            checks: VerificationChecks {
                signature_valid,
                content_unchanged,
            },
            signature_info: Some(SignatureInfo {
                signature_id: record.id,
                signer_id: record.signer_id.clone(),
                signed_at: record.signed_at,
                algorithm: record.algorithm.clone(),
                key_fingerprint: key.map(|k| k.fingerprint),
            }),
            message,
        }
    }
}
