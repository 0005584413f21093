//! Audit events emitted by the signing core.

use crate::ids::{AuditEventId, UserId};
use crate::records::{now_millis, RequestOrigin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventType {
    #[serde(rename = "key.generated")]
    KeyGenerated,
    #[serde(rename = "key.revoked")]
    KeyRevoked,
    #[serde(rename = "signature.created")]
    SignatureCreated,
    #[serde(rename = "signature.verified")]
    SignatureVerified,
    #[serde(rename = "master_key.rotated")]
    MasterKeyRotated,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 5] = [
        Self::KeyGenerated,
        Self::KeyRevoked,
        Self::SignatureCreated,
        Self::SignatureVerified,
        Self::MasterKeyRotated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyGenerated => "key.generated",
            Self::KeyRevoked => "key.revoked",
            Self::SignatureCreated => "signature.created",
            Self::SignatureVerified => "signature.verified",
            Self::MasterKeyRotated => "master_key.rotated",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown audit value: {0}")]
pub struct ParseAuditError(pub String);

impl FromStr for AuditEventType {
    type Err = ParseAuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseAuditError(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl FromStr for AuditOutcome {
    type Err = ParseAuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            other => Err(ParseAuditError(other.to_string())),
        }
    }
}

/// A single structured audit entry: `{actor, timestamp, outcome, context}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub event_type: AuditEventType,
    pub actor_id: Option<UserId>,
    pub outcome: AuditOutcome,
    /// Event-specific details. Never carries secrets.
    pub context: serde_json::Value,
    pub origin: RequestOrigin,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, outcome: AuditOutcome) -> Self {
        Self {
            id: AuditEventId::new(),
            event_type,
            actor_id: None,
            outcome,
            context: serde_json::Value::Object(Default::default()),
            origin: RequestOrigin::default(),
            occurred_at: now_millis(),
        }
    }

    pub fn success(event_type: AuditEventType) -> Self {
        Self::new(event_type, AuditOutcome::Success)
    }

    pub fn failure(event_type: AuditEventType) -> Self {
        Self::new(event_type, AuditOutcome::Failure)
    }

    pub fn with_actor(mut self, actor: &UserId) -> Self {
        self.actor_id = Some(actor.clone());
        self
    }

    pub fn with_origin(mut self, origin: &RequestOrigin) -> Self {
        self.origin = origin.clone();
        self
    }

    /// Adds one context field. Non-object contexts are replaced.
    pub fn with_context(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if !self.context.is_object() {
            self.context = serde_json::Value::Object(Default::default());
        }
        if let Some(map) = self.context.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
        self
    }
}
