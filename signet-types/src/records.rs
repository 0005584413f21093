//! Persisted records: signing keys, signatures and the document view the
//! core needs from the letter workflow.

use crate::ids::{DocumentId, KeyRecordId, SignatureId, UserId};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The current time at the millisecond precision records are stored with.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Letter lifecycle status.
///
/// The core only performs `Approved -> Signed`; every other transition is
/// owned by the letter workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Signed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Signed => "signed",
        }
    }

    /// Whether `self -> next` is a legal workflow edge.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (*self, next),
            (Draft, Submitted)
                | (Submitted, UnderReview)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (UnderReview, Approved)
                | (UnderReview, Rejected)
                | (Approved, Signed)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for DocumentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "under_review" => Ok(Self::UnderReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "signed" => Ok(Self::Signed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// The slice of a letter the signing core reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub status: DocumentStatus,
    /// Designated signer, if one has been assigned.
    pub signer_id: Option<UserId>,
    pub content: Vec<u8>,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Where a request came from. Both fields are optional because in-process
/// callers (batch jobs, tests) have neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestOrigin {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            user_agent: Some(user_agent.into()),
        }
    }
}

/// A user's signing key as stored.
///
/// `encrypted_private_key` is the double-wrapped blob produced by the vault;
/// the public key is safe to expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKeyRecord {
    pub id: KeyRecordId,
    pub owner_id: UserId,
    pub public_key: String,
    #[serde(skip_serializing, default)]
    pub encrypted_private_key: String,
    pub fingerprint: String,
    pub key_bits: u32,
    pub generated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl UserKeyRecord {
    /// Whether the key has passed its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Active and not expired.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}

/// Input for inserting a new key; the store assigns `id` and activates it.
#[derive(Debug, Clone)]
pub struct NewKeyRecord {
    pub owner_id: UserId,
    pub public_key: String,
    pub encrypted_private_key: String,
    pub fingerprint: String,
    pub key_bits: u32,
    pub generated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The legal evidence artifact of a signing. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: SignatureId,
    pub document_id: DocumentId,
    pub signer_id: UserId,
    pub key_record_id: KeyRecordId,
    /// Base64 of the raw RSA signature.
    pub signature: String,
    /// Lowercase hex SHA-256 of the signed content.
    pub content_hash: String,
    pub algorithm: String,
    pub signed_at: DateTime<Utc>,
    pub origin_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Input for inserting a signature.
#[derive(Debug, Clone)]
pub struct NewSignatureRecord {
    pub document_id: DocumentId,
    pub signer_id: UserId,
    pub key_record_id: KeyRecordId,
    pub signature: String,
    pub content_hash: String,
    pub algorithm: String,
    pub signed_at: DateTime<Utc>,
    pub origin: RequestOrigin,
}
