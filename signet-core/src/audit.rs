//! Audit sinks.
//!
//! Recording is fire-and-forget: a sink that cannot store an event logs the
//! failure and returns, so auditing never changes the outcome of the
//! operation being audited.

use signet_storage::AuditStore;
use signet_types::{AuditEvent, AuditOutcome};
use std::sync::Arc;
use tracing::{error, info, warn};

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Writes events to the `tracing` subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let actor = event.actor_id.as_ref().map(|a| a.as_str()).unwrap_or("-");
        match event.outcome {
            AuditOutcome::Success => info!(
                "audit {} actor={actor} outcome=success context={}",
                event.event_type, event.context
            ),
            AuditOutcome::Failure => warn!(
                "audit {} actor={actor} outcome=failure context={}",
                event.event_type, event.context
            ),
        }
    }
}

/// Persists events to the `audit_events` table.
#[derive(Clone)]
pub struct StoreAuditSink {
    store: AuditStore,
}

impl StoreAuditSink {
    pub fn new(store: AuditStore) -> Self {
        Self { store }
    }
}

impl AuditSink for StoreAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.store.append(event) {
            error!("failed to persist audit event {} ({}): {e}", event.id, event.event_type);
        }
    }
}

/// Fans one event out to several sinks.
#[derive(Clone, Default)]
pub struct MultiAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl MultiAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for MultiAuditSink {
    fn record(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
