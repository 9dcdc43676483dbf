use std::fmt;
use std::sync::Arc;

use crate::config::{EngineConfig, Settings};
use crate::messages::{MessageFormatter, PlainFormatter};
use crate::store::{RecordStore, UserDirectory};

/// A collaborator a rule or policy can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    /// A [`RecordStore`].
    Records,
    /// A [`UserDirectory`].
    Users,
}

impl Collaborator {
    /// Name used in configuration errors.
    pub fn name(self) -> &'static str {
        match self {
            Collaborator::Records => "record store",
            Collaborator::Users => "user directory",
        }
    }
}

/// The collaborators injected into the validator and the policy gate.
///
/// Cheap to clone; everything is behind an `Arc`.
#[derive(Clone)]
pub struct Services {
    config: Arc<EngineConfig>,
    records: Option<Arc<dyn RecordStore>>,
    users: Option<Arc<dyn UserDirectory>>,
    formatter: Arc<dyn MessageFormatter>,
}

impl Services {
    /// Services with the given configuration, no stores and plain messages.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            records: None,
            users: None,
            formatter: Arc::new(PlainFormatter),
        }
    }

    /// Services configured from the host settings.
    pub fn from_settings(settings: &dyn Settings) -> Self {
        Self::new(EngineConfig::from_settings(settings))
    }

    /// Attaches a record store.
    pub fn with_records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Attaches a user directory.
    pub fn with_users(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    /// Replaces the message formatter.
    pub fn with_formatter(mut self, formatter: Arc<dyn MessageFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The record store, if one was attached.
    pub fn records(&self) -> Option<&dyn RecordStore> {
        self.records.as_deref()
    }

    /// The user directory, if one was attached.
    pub fn users(&self) -> Option<&dyn UserDirectory> {
        self.users.as_deref()
    }

    /// The message formatter.
    pub fn formatter(&self) -> &dyn MessageFormatter {
        self.formatter.as_ref()
    }

    /// Returns true when the collaborator is available.
    pub fn provides(&self, collaborator: Collaborator) -> bool {
        match collaborator {
            Collaborator::Records => self.records.is_some(),
            Collaborator::Users => self.users.is_some(),
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("config", &self.config)
            .field("records", &self.records.is_some())
            .field("users", &self.users.is_some())
            .finish()
    }
}
