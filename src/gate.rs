use std::collections::HashMap;
use std::sync::Arc;

use crate::audit::{self, AuditEvent, AuditOutcome, AuditTrail};
use crate::error::{ConfigError, Error};
use crate::policy::{action_name, Policy, PolicyRequest};
use crate::services::{Collaborator, Services};
use crate::store::UserRecord;

/// The authorization dispatcher.
///
/// `PolicyGate` maps a resource to its [`Policy`] and an action name to the
/// policy's check. Dispatch is fail closed: an unknown resource or action is
/// a [`ConfigError`], never an implicit "allowed", and that holds even for
/// actors who would otherwise bypass the check.
///
/// Before running a check the gate loads the actor from the injected
/// [`UserDirectory`](crate::UserDirectory) and lets anyone holding the
/// configured bypass capability (`manage_options` by default) through.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use payload_policy::{MemoryUsers, Policy, PolicyGate, Services, UserRecord};
///
/// let users = MemoryUsers::new();
/// users.insert(UserRecord {
///     id: 1,
///     email: "admin@example.com".into(),
///     roles: vec!["administrator".into()],
///     capabilities: vec!["manage_options".into()],
/// });
/// users.insert(UserRecord {
///     id: 2,
///     email: "backer@example.com".into(),
///     roles: vec!["subscriber".into()],
///     capabilities: vec![],
/// });
///
/// let gate = PolicyGate::new(Services::default().with_users(Arc::new(users)))
///     .register(Policy::new("campaign").check("delete", |req| {
///         Err(req.deny("campaign has contributions").into())
///     }));
///
/// assert!(gate.authorize("campaign", "authorize_delete", &[42], Some(1)).is_ok());
/// assert!(gate.authorize("campaign", "delete", &[42], Some(2)).unwrap_err().is_violation());
/// assert!(gate.authorize("campaign", "archive", &[42], Some(1)).is_err());
/// ```
#[derive(Clone)]
pub struct PolicyGate {
    services: Services,
    policies: HashMap<String, Policy>,
    audit: Option<Arc<AuditTrail>>,
}

impl PolicyGate {
    /// A gate with no policies.
    pub fn new(services: Services) -> Self {
        Self {
            services,
            policies: HashMap::new(),
            audit: None,
        }
    }

    /// Registers `policy` under its resource name, replacing any previous
    /// policy for that resource.
    pub fn register(mut self, policy: Policy) -> Self {
        self.policies.insert(policy.resource().to_string(), policy);
        self
    }

    /// Records every decision in `trail` as well as emitting it.
    pub fn with_audit(mut self, trail: Arc<AuditTrail>) -> Self {
        self.audit = Some(trail);
        self
    }

    /// Returns true when a policy governs `resource`.
    pub fn has_policy(&self, resource: &str) -> bool {
        self.policies.contains_key(resource)
    }

    /// Authorizes `action` on `resource` for the given subjects.
    ///
    /// `action` may carry the `authorize_` prefix. `actor_id` is `None` for
    /// anonymous requests.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when no policy or no check matches, or when an
    ///   actor is given but no user directory was injected.
    /// - [`Error::Violation`] when the check refuses.
    pub fn authorize(
        &self,
        resource: &str,
        action: &str,
        subjects: &[u64],
        actor_id: Option<u64>,
    ) -> Result<(), Error> {
        let action = action_name(action);
        let result = self.decide(resource, action, subjects, actor_id);

        let (outcome, reason) = match &result {
            Ok(outcome) => (*outcome, None),
            Err(Error::Violation(v)) => (AuditOutcome::Denied, Some(v.message.clone())),
            Err(Error::Config(e)) => (AuditOutcome::Error, Some(e.to_string())),
        };
        let mut event = AuditEvent::new(resource, action, outcome)
            .with_actor(actor_id)
            .with_subjects(subjects);
        if let Some(reason) = reason {
            event = event.with_reason(reason);
        }
        audit::emit(&event, self.audit.as_deref());

        result.map(|_| ())
    }

    /// Like [`authorize`](Self::authorize), but reports a refusal as
    /// `Ok(false)`. Configuration errors still surface.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] when dispatch itself fails.
    pub fn can(
        &self,
        resource: &str,
        action: &str,
        subjects: &[u64],
        actor_id: Option<u64>,
    ) -> Result<bool, ConfigError> {
        match self.authorize(resource, action, subjects, actor_id) {
            Ok(()) => Ok(true),
            Err(Error::Violation(_)) => Ok(false),
            Err(Error::Config(e)) => Err(e),
        }
    }

    fn decide(
        &self,
        resource: &str,
        action: &str,
        subjects: &[u64],
        actor_id: Option<u64>,
    ) -> Result<AuditOutcome, Error> {
        // 1. Resolve the check first, so an unknown action fails even for
        //    bypassing actors.
        let policy = self.policies.get(resource).ok_or_else(|| {
            tracing::warn!(resource, "no policy registered");
            ConfigError::UnknownPolicy(resource.to_string())
        })?;
        let check = policy.get(action).ok_or_else(|| {
            tracing::warn!(resource, action, "policy has no such action");
            ConfigError::UnknownAction {
                resource: resource.to_string(),
                action: action.to_string(),
            }
        })?;

        // 2. Load the actor.
        let actor = self.load_actor(resource, action, actor_id)?;

        // 3. Universal bypass.
        let bypass = &self.services.config().bypass_capability;
        if actor.as_ref().is_some_and(|a| a.can(bypass)) {
            return Ok(AuditOutcome::Bypassed);
        }

        // 4. The specific check.
        let request = PolicyRequest {
            resource,
            action,
            subjects,
            actor: actor.as_ref(),
            services: &self.services,
        };
        check(&request)?;
        Ok(AuditOutcome::Allowed)
    }

    // An id that does not resolve is treated as an anonymous request.
    fn load_actor(
        &self,
        resource: &str,
        action: &str,
        actor_id: Option<u64>,
    ) -> Result<Option<UserRecord>, ConfigError> {
        let Some(id) = actor_id else {
            return Ok(None);
        };
        let users = self.services.users().ok_or_else(|| {
            tracing::warn!(resource, action, "policy gate needs a user directory");
            ConfigError::MissingCollaborator {
                rule: format!("{resource}.{action}"),
                collaborator: Collaborator::Users.name(),
            }
        })?;
        Ok(users.find(id))
    }
}

impl std::fmt::Debug for PolicyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut resources: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        resources.sort_unstable();
        f.debug_struct("PolicyGate")
            .field("policies", &resources)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViolationKind;
    use crate::store::{MemoryStore, MemoryUsers, PostRecord, RecordStore};

    fn users() -> Arc<MemoryUsers> {
        let users = MemoryUsers::new();
        users.insert(UserRecord {
            id: 1,
            email: "admin@example.com".into(),
            roles: vec!["administrator".into()],
            capabilities: vec!["manage_options".into()],
        });
        users.insert(UserRecord {
            id: 2,
            email: "author@example.com".into(),
            roles: vec!["author".into()],
            capabilities: vec!["edit_campaigns".into()],
        });
        users.insert(UserRecord {
            id: 3,
            email: "backer@example.com".into(),
            roles: vec!["subscriber".into()],
            capabilities: vec![],
        });
        Arc::new(users)
    }

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_post(PostRecord {
            id: 42,
            post_type: "campaign".into(),
            status: "publish".into(),
            parent: 0,
            author: 2,
        });
        Arc::new(store)
    }

    fn campaign_policy() -> Policy {
        Policy::new("campaign")
            .check("view", |_| Ok(()))
            .check("update", |req| {
                let actor = req.require_actor()?;
                let post = req
                    .subject(0)
                    .and_then(|id| req.services.records()?.find_post(id))
                    .ok_or_else(|| req.deny("campaign not found"))?;
                if post.author == actor.id {
                    Ok(())
                } else {
                    Err(req.deny("only the author may edit").into())
                }
            })
            .check("delete", |req| Err(req.deny("campaign has contributions").into()))
    }

    fn gate() -> (PolicyGate, Arc<AuditTrail>) {
        let trail = Arc::new(AuditTrail::new());
        let services = Services::default()
            .with_users(users())
            .with_records(store() as Arc<dyn RecordStore>);
        let gate = PolicyGate::new(services)
            .register(campaign_policy())
            .with_audit(Arc::clone(&trail));
        (gate, trail)
    }

    #[test]
    fn checks_run_for_regular_actors() {
        let (gate, _) = gate();
        assert!(gate.authorize("campaign", "update", &[42], Some(2)).is_ok());

        let err = gate.authorize("campaign", "update", &[42], Some(3)).unwrap_err();
        assert_eq!(
            err.violation().map(|v| &v.kind),
            Some(&ViolationKind::Unauthorized {
                resource: "campaign".into(),
                action: "update".into()
            })
        );
    }

    #[test]
    fn anonymous_actors_are_unauthenticated() {
        let (gate, _) = gate();
        let err = gate.authorize("campaign", "update", &[42], None).unwrap_err();
        assert_eq!(err.violation().unwrap().kind, ViolationKind::Unauthenticated);
        assert!(gate.authorize("campaign", "view", &[42], None).is_ok());
    }

    #[test]
    fn bypass_capability_skips_the_check() {
        let (gate, trail) = gate();
        assert!(gate.authorize("campaign", "authorize_delete", &[42], Some(1)).is_ok());
        assert!(gate.authorize("campaign", "delete", &[42], Some(2)).is_err());

        let outcomes: Vec<_> = trail.events().iter().map(|e| e.outcome()).collect();
        assert_eq!(outcomes, [AuditOutcome::Bypassed, AuditOutcome::Denied]);
        assert_eq!(trail.events()[1].reason(), Some("campaign has contributions"));
    }

    #[test]
    fn bypass_capability_comes_from_config() {
        let config = crate::config::EngineConfig {
            bypass_capability: "edit_campaigns".into(),
            ..Default::default()
        };
        let gate = PolicyGate::new(Services::new(config).with_users(users()))
            .register(campaign_policy());
        assert!(gate.authorize("campaign", "delete", &[42], Some(2)).is_ok());
        assert!(gate.authorize("campaign", "delete", &[42], Some(1)).is_err());
    }

    #[test]
    fn unknown_policy_and_action_fail_closed_even_for_admins() {
        let (gate, trail) = gate();
        assert!(matches!(
            gate.authorize("pledge", "view", &[], Some(1)),
            Err(Error::Config(ConfigError::UnknownPolicy(_)))
        ));
        assert!(matches!(
            gate.authorize("campaign", "authorize_archive", &[42], Some(1)),
            Err(Error::Config(ConfigError::UnknownAction { .. }))
        ));
        assert_eq!(trail.with_outcome(AuditOutcome::Error).len(), 2);
    }

    #[test]
    fn dispatch_errors_are_audited_with_their_reason() {
        let (gate, trail) = gate();
        let _ = gate.authorize("campaign", "archive", &[42, 43], Some(2));

        let events = trail.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome(), AuditOutcome::Error);
        assert_eq!(events[0].actor(), Some(2));
        assert_eq!(events[0].subjects(), &[42, 43]);
        assert_eq!(
            events[0].reason(),
            Some("policy `campaign` has no check for action `archive`")
        );
    }

    #[test]
    fn can_maps_refusals_to_false() {
        let (gate, _) = gate();
        assert_eq!(gate.can("campaign", "update", &[42], Some(2)), Ok(true));
        assert_eq!(gate.can("campaign", "update", &[42], Some(3)), Ok(false));
        assert!(gate.can("campaign", "archive", &[42], Some(2)).is_err());
    }

    #[test]
    fn actor_without_directory_is_a_config_error() {
        let gate = PolicyGate::new(Services::default()).register(campaign_policy());
        assert!(matches!(
            gate.authorize("campaign", "view", &[], Some(1)),
            Err(Error::Config(ConfigError::MissingCollaborator { .. }))
        ));
        assert!(gate.authorize("campaign", "view", &[], None).is_ok());
    }

    #[test]
    fn gate_is_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolicyGate>();
    }
}
