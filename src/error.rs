use thiserror::Error;

/// Errors raised by the engine.
///
/// User-input problems are never represented here: those are collected in a
/// [`ValidationReport`](crate::ValidationReport). An `Error` is either an
/// authorization refusal or a wiring bug.
#[derive(Debug, Error)]
pub enum Error {
    /// An authorization check refused the operation.
    #[error("policy violation: {0}")]
    Violation(#[from] Violation),
    /// A schema, policy or collaborator was wired incorrectly.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns true when the error is an authorization refusal.
    pub fn is_violation(&self) -> bool {
        matches!(self, Error::Violation(_))
    }

    /// Returns the violation, if this is one.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Error::Violation(v) => Some(v),
            Error::Config(_) => None,
        }
    }
}

/// A programmer error in a schema, sanitization spec or policy table.
///
/// These abort the request with a server error; they are never shown to the
/// end user as a validation message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A rule token does not name a registered rule.
    #[error("unknown rule `{0}`")]
    UnknownRule(String),
    /// A rule that needs a parameter was given none.
    #[error("rule `{rule}` requires a parameter")]
    MissingParameter {
        /// The rule name.
        rule: String,
    },
    /// A rule parameter could not be parsed.
    #[error("rule `{rule}` has a malformed parameter `{param}`: {reason}")]
    MalformedParameter {
        /// The rule name.
        rule: String,
        /// The raw parameter string.
        param: String,
        /// What was wrong with it.
        reason: String,
    },
    /// A `regex` rule pattern does not compile.
    #[error("invalid regex `{pattern}`: {reason}")]
    InvalidRegex {
        /// The pattern as written in the schema.
        pattern: String,
        /// The compiler's message.
        reason: String,
    },
    /// A sanitization token does not name a known transform.
    #[error("unknown sanitizer `{0}`")]
    UnknownSanitizer(String),
    /// No policy is registered for the resource.
    #[error("no policy registered for resource `{0}`")]
    UnknownPolicy(String),
    /// The policy has no check for the action.
    #[error("policy `{resource}` has no check for action `{action}`")]
    UnknownAction {
        /// The resource whose policy was consulted.
        resource: String,
        /// The action that was requested.
        action: String,
    },
    /// A rule needs a collaborator that was not injected.
    #[error("rule `{rule}` requires the `{collaborator}` collaborator")]
    MissingCollaborator {
        /// The rule name.
        rule: String,
        /// The missing collaborator.
        collaborator: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn malformed(
        rule: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let err = ConfigError::MalformedParameter {
            rule: rule.into(),
            param: param.into(),
            reason: reason.into(),
        };
        tracing::warn!(error = %err, "rule parameter rejected");
        err
    }

    pub(crate) fn missing_param(rule: impl Into<String>) -> Self {
        let err = ConfigError::MissingParameter { rule: rule.into() };
        tracing::warn!(error = %err, "rule parameter missing");
        err
    }
}

/// An authorization failure with details about what was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Violation {
    /// The kind of violation that occurred
    pub kind: ViolationKind,
    /// Human-readable message explaining the violation
    pub message: String,
}

impl Violation {
    /// Creates a new violation.
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for an [`ViolationKind::Unauthorized`] violation.
    pub fn unauthorized(
        resource: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            ViolationKind::Unauthorized {
                resource: resource.into(),
                action: action.into(),
            },
            message,
        )
    }
}

/// The kind of authorization violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    /// The check needs an acting user and none was given
    #[error("Unauthenticated")]
    Unauthenticated,
    /// The actor may not perform the action on the resource
    #[error("Unauthorized for '{resource}.{action}'")]
    Unauthorized {
        /// The resource the policy guards
        resource: String,
        /// The action that was not authorized
        action: String,
    },
}
