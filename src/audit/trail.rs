//! In-memory audit trail recorder.

use std::sync::Mutex;

use super::{AuditEvent, AuditOutcome};

/// A thread-safe, append-only list of audit events.
///
/// Attach one to a [`PolicyGate`](crate::PolicyGate) with
/// [`with_audit`](crate::PolicyGate::with_audit) to inspect decisions in
/// tests or forward them elsewhere.
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// A snapshot of every recorded event, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events with the given outcome.
    pub fn with_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.outcome() == outcome)
            .collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns true when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every event.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}
