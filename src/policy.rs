use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Violation, ViolationKind};
use crate::services::Services;
use crate::store::UserRecord;

/// Prefix accepted in front of action names (`authorize_update`).
pub const ACTION_PREFIX: &str = "authorize_";

/// Strips [`ACTION_PREFIX`] from an action name.
pub fn action_name(action: &str) -> &str {
    action.strip_prefix(ACTION_PREFIX).unwrap_or(action)
}

/// What a policy check is asked to decide.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRequest<'a> {
    /// The policy's resource name.
    pub resource: &'a str,
    /// The action, without prefix.
    pub action: &'a str,
    /// Ids of the records the action targets.
    pub subjects: &'a [u64],
    /// The acting user, `None` when anonymous.
    pub actor: Option<&'a UserRecord>,
    /// Injected collaborators, for checks that load their subject.
    pub services: &'a Services,
}

impl<'a> PolicyRequest<'a> {
    /// The acting user, or an [`Unauthenticated`](ViolationKind::Unauthenticated)
    /// violation.
    pub fn require_actor(&self) -> Result<&'a UserRecord, Violation> {
        self.actor.ok_or_else(|| {
            Violation::new(
                ViolationKind::Unauthenticated,
                "authentication required",
            )
        })
    }

    /// Requires the acting user to hold `capability`.
    pub fn require_capability(&self, capability: &str) -> Result<(), Violation> {
        let actor = self.require_actor()?;
        if actor.can(capability) {
            Ok(())
        } else {
            Err(self.deny(format!("missing capability `{capability}`")))
        }
    }

    /// The `index`-th subject id.
    pub fn subject(&self, index: usize) -> Option<u64> {
        self.subjects.get(index).copied()
    }

    /// An [`Unauthorized`](ViolationKind::Unauthorized) violation for this
    /// resource and action.
    pub fn deny(&self, message: impl Into<String>) -> Violation {
        Violation::unauthorized(self.resource, self.action, message)
    }
}

/// A single authorization check.
pub type CheckFn = Arc<dyn Fn(&PolicyRequest<'_>) -> Result<(), Error> + Send + Sync>;

/// The named checks for one resource type.
///
/// Checks are kept in an explicit table keyed by action name; an action
/// without an entry is a configuration error when dispatched.
///
/// # Examples
///
/// ```
/// use payload_policy::Policy;
///
/// let policy = Policy::new("campaign")
///     .check("view", |_| Ok(()))
///     .check("authorize_update", |req| {
///         req.require_capability("edit_campaigns")?;
///         Ok(())
///     });
///
/// assert!(policy.has_action("update"));
/// assert_eq!(policy.actions().collect::<Vec<_>>(), ["update", "view"]);
/// ```
#[derive(Clone)]
pub struct Policy {
    resource: String,
    checks: BTreeMap<String, CheckFn>,
}

impl Policy {
    /// An empty policy for `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            checks: BTreeMap::new(),
        }
    }

    /// Adds the check for `action`. An `authorize_` prefix is stripped.
    pub fn check<F>(mut self, action: &str, check: F) -> Self
    where
        F: Fn(&PolicyRequest<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.checks
            .insert(action_name(action).to_string(), Arc::new(check));
        self
    }

    /// The resource this policy governs.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns true when `action` has a check.
    pub fn has_action(&self, action: &str) -> bool {
        self.checks.contains_key(action_name(action))
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    pub(crate) fn get(&self, action: &str) -> Option<&CheckFn> {
        self.checks.get(action_name(action))
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("resource", &self.resource)
            .field("actions", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}
