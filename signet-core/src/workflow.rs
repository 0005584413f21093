//! Signing an approved document.
//!
//! The workflow re-checks everything it is told: the document must still be
//! signable by this signer, the signer must hold an active unexpired key,
//! and the content offered for signing must be the content on record. The
//! signature row and the `Approved -> Signed` transition commit together.

use crate::audit::AuditSink;
use crate::error::{SigningError, SigningResult};
use crate::policy::SigningPolicy;
use chrono::Utc;
use signet_crypto::{content_hash, sign, SignedContent, SIGNATURE_ALGORITHM};
use signet_storage::{Database, DocumentStore, KeyStore, SignatureStore};
use signet_types::{
    now_millis, AuditEvent, AuditEventType, Document, DocumentId, DocumentStatus,
    NewSignatureRecord, RequestOrigin, SignatureRecord, UserId, UserKeyRecord,
};
use signet_vault::PrivateKeyVault;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// One signing attempt.
pub struct SignRequest {
    pub document_id: DocumentId,
    pub signer_id: UserId,
    pub password: Zeroizing<String>,
    /// The content the signer saw. Must equal the stored document content.
    pub content: Vec<u8>,
    pub origin: RequestOrigin,
}

impl SignRequest {
    pub fn new(
        document_id: DocumentId,
        signer_id: UserId,
        password: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            document_id,
            signer_id,
            password: Zeroizing::new(password.into()),
            content: content.into(),
            origin: RequestOrigin::default(),
        }
    }

    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }
}

impl fmt::Debug for SignRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignRequest")
            .field("document_id", &self.document_id)
            .field("signer_id", &self.signer_id)
            .field("password", &"[REDACTED]")
            .field("content_len", &self.content.len())
            .field("origin", &self.origin)
            .finish()
    }
}

#[derive(Clone)]
pub struct SigningWorkflow {
    documents: DocumentStore,
    keys: KeyStore,
    signatures: SignatureStore,
    vault: PrivateKeyVault,
    policy: Arc<dyn SigningPolicy>,
    audit: Arc<dyn AuditSink>,
}

impl SigningWorkflow {
    pub fn new(
        db: &Database,
        vault: PrivateKeyVault,
        policy: Arc<dyn SigningPolicy>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            documents: db.documents(),
            keys: db.keys(),
            signatures: db.signatures(),
            vault,
            policy,
            audit,
        }
    }

    /// Signs a document with the signer's active key.
    pub fn sign_document(&self, request: SignRequest) -> SigningResult<SignatureRecord> {
        let document = self
            .documents
            .get(&request.document_id)?
            .ok_or_else(|| SigningError::DocumentNotFound(request.document_id.clone()))?;
        self.check_signable(&request, &document)?;

        let now = Utc::now();
        let key = self
            .keys
            .active_for(&request.signer_id)?
            .filter(|k| k.is_usable_at(now))
            .ok_or_else(|| SigningError::NoActiveKey(request.signer_id.clone()))?;

        let result = self.sign_and_commit(&request, &key);
        self.record_attempt(&request, &key, &result);
        result
    }

    fn check_signable(&self, request: &SignRequest, document: &Document) -> SigningResult<()> {
        if !self.policy.can_sign(&request.signer_id, document) {
            // A signer who lost a race finds the document already signed by
            // themselves; report that as the benign conflict it is.
            if document.status == DocumentStatus::Signed
                && self
                    .signatures
                    .find(&document.id, &request.signer_id)?
                    .is_some()
            {
                return Err(SigningError::DuplicateSignature {
                    document_id: document.id.to_string(),
                    signer_id: request.signer_id.to_string(),
                });
            }
            debug!(
                "{} may not sign {} in status {}",
                request.signer_id, document.id, document.status
            );
            return Err(SigningError::NotSignable {
                document_id: document.id.clone(),
                reason: format!("signer is not allowed to sign a {} document", document.status),
            });
        }

        if content_hash(&request.content) != content_hash(&document.content) {
            return Err(SigningError::NotSignable {
                document_id: document.id.clone(),
                reason: "content differs from the stored document".into(),
            });
        }
        Ok(())
    }

    fn sign_and_commit(
        &self,
        request: &SignRequest,
        key: &UserKeyRecord,
    ) -> SigningResult<SignatureRecord> {
        let signed: SignedContent = {
            let private_key = self
                .vault
                .unseal(&key.encrypted_private_key, &request.password)?;
            sign(&request.content, private_key.expose())?
        };

        let record = self.signatures.commit(NewSignatureRecord {
            document_id: request.document_id.clone(),
            signer_id: request.signer_id.clone(),
            key_record_id: key.id,
            signature: signed.signature,
            content_hash: signed.content_hash,
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            signed_at: now_millis(),
            origin: request.origin.clone(),
        })?;
        Ok(record)
    }

    fn record_attempt(
        &self,
        request: &SignRequest,
        key: &UserKeyRecord,
        result: &SigningResult<SignatureRecord>,
    ) {
        let event = match result {
            Ok(record) => {
                info!(
                    "{} signed {} with key {}",
                    record.signer_id, record.document_id, key.id
                );
                AuditEvent::success(AuditEventType::SignatureCreated)
                    .with_context("signature_id", record.id.to_string())
                    .with_context("signed_at", record.signed_at.to_rfc3339())
            }
            Err(e) if e.is_conflict() => {
                debug!("{} already signed {}", request.signer_id, request.document_id);
                AuditEvent::failure(AuditEventType::SignatureCreated)
                    .with_context("error", e.to_string())
            }
            Err(e) => {
                warn!(
                    "signing {} by {} failed: {e}",
                    request.document_id, request.signer_id
                );
                AuditEvent::failure(AuditEventType::SignatureCreated)
                    .with_context("error", e.to_string())
            }
        };
        self.audit.record(
            &event
                .with_actor(&request.signer_id)
                .with_origin(&request.origin)
                .with_context("document_id", request.document_id.to_string())
                .with_context("key_id", key.id.to_string())
                .with_context("key_fingerprint", key.fingerprint.clone()),
        );
    }
}
