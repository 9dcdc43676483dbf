//! Audit records for authorization decisions.
//!
//! Every decision of the [`PolicyGate`](crate::PolicyGate) is emitted as a
//! structured `tracing` event under the `payload_policy::audit` target, and
//! optionally kept in an [`AuditTrail`].

mod event;
mod trail;

pub use event::{AuditEvent, AuditOutcome};
pub use trail::AuditTrail;

/// Target of the structured audit events.
pub const AUDIT_TARGET: &str = "payload_policy::audit";

/// Emits `event` through `tracing` and records it in `trail` when given.
pub(crate) fn emit(event: &AuditEvent, trail: Option<&AuditTrail>) {
    tracing::info!(
        target: "payload_policy::audit",
        resource = %event.resource(),
        action = %event.action(),
        outcome = %event.outcome(),
        actor = ?event.actor(),
        subjects = ?event.subjects(),
        bypassed = event.outcome() == AuditOutcome::Bypassed,
        reason = ?event.reason(),
        "authorization decision"
    );
    if let Some(trail) = trail {
        trail.record(event.clone());
    }
}
