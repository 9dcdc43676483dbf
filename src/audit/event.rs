//! Authorization audit events.
//!
//! Events carry identifiers only: resource and action names, the actor id
//! and subject ids. Payload contents are never recorded.

use std::fmt;

/// How an authorization decision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The policy check passed.
    Allowed,
    /// The actor held the bypass capability; the check did not run.
    Bypassed,
    /// The policy check refused the operation.
    Denied,
    /// The request could not be dispatched (unknown policy or action,
    /// missing collaborator).
    Error,
}

impl AuditOutcome {
    /// Returns true for outcomes that let the operation proceed.
    pub fn is_allowed(self) -> bool {
        matches!(self, AuditOutcome::Allowed | AuditOutcome::Bypassed)
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Allowed => write!(f, "allowed"),
            AuditOutcome::Bypassed => write!(f, "bypassed"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Error => write!(f, "error"),
        }
    }
}

/// One authorization decision.
///
/// # Example
///
/// ```
/// use payload_policy::audit::{AuditEvent, AuditOutcome};
///
/// let event = AuditEvent::new("campaign", "delete", AuditOutcome::Denied)
///     .with_actor(Some(7))
///     .with_subjects(&[42])
///     .with_reason("campaign has contributions");
///
/// assert_eq!(event.actor(), Some(7));
/// assert_eq!(
///     event.to_string(),
///     "AuditEvent[resource=campaign, action=delete, outcome=denied, actor=7, subjects=[42], reason=campaign has contributions]"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    resource: String,
    action: String,
    outcome: AuditOutcome,
    /// `None` for anonymous requests.
    actor: Option<u64>,
    subjects: Vec<u64>,
    reason: Option<String>,
}

impl AuditEvent {
    /// Creates an event with no actor, subjects or reason.
    pub fn new(resource: impl Into<String>, action: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            outcome,
            actor: None,
            subjects: Vec::new(),
            reason: None,
        }
    }

    /// Sets the acting user.
    pub fn with_actor(mut self, actor: Option<u64>) -> Self {
        self.actor = actor;
        self
    }

    /// Sets the subject ids.
    pub fn with_subjects(mut self, subjects: &[u64]) -> Self {
        self.subjects = subjects.to_vec();
        self
    }

    /// Sets a short explanation, such as the violation message.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// The policy's resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The action, without any `authorize_` prefix.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The decision.
    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    /// The acting user's id.
    pub fn actor(&self) -> Option<u64> {
        self.actor
    }

    /// The subject ids the action targeted.
    pub fn subjects(&self) -> &[u64] {
        &self.subjects
    }

    /// Why the decision was made, when known.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEvent[resource={}, action={}, outcome={}",
            self.resource, self.action, self.outcome
        )?;
        match self.actor {
            Some(actor) => write!(f, ", actor={actor}")?,
            None => write!(f, ", actor=<anonymous>")?,
        }
        write!(f, ", subjects={:?}", self.subjects)?;
        if let Some(reason) = &self.reason {
            write!(f, ", reason={reason}")?;
        }
        write!(f, "]")
    }
}
