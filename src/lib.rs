//! Declarative validation, sanitization and authorization for request payloads.
//!
//! This crate checks nested JSON payloads against rule chains attached to
//! dotted field paths, normalizes them before validation, and guards
//! operations behind per-resource policies:
//! - **Validation**: a [`Schema`] maps path patterns (`items.*.amount`) to
//!   rule chains (`required|number|min:1`); the [`Validator`] collects every
//!   failure into a [`ValidationReport`]
//! - **Sanitization**: a [`SanitizationSpec`] rewrites values in place with
//!   idempotent transforms (`text`, `email`, `money`, ...)
//! - **Taint tracking**: inbound data is [`Tainted`]; only the [`Pipeline`]
//!   produces [`Verified`] payloads, and only verified payloads become
//!   [`TransferObject`]s
//! - **Authorization**: the [`PolicyGate`] dispatches `(resource, action)` to
//!   a [`Policy`] check, fails closed on unknown names, and audits every
//!   decision
//!
//! Rules that touch storage or users go through injected collaborators
//! ([`RecordStore`], [`UserDirectory`]) bundled in [`Services`].
//!
//! # Examples
//!
//! ```
//! use payload_policy::{Pipeline, SanitizationSpec, Schema, Tainted, Validator};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .field("title", "required|max:40")
//!     .field("goal", "required|number|gt:0")
//!     .field("tiers.*.amount", "required|number|min:1");
//! let sanitizer = SanitizationSpec::new()
//!     .field("title", "text")
//!     .unwrap()
//!     .field("tiers.*.amount", "money")
//!     .unwrap();
//! let pipeline = Pipeline::new(Validator::default(), sanitizer, &schema).unwrap();
//!
//! let rejected = pipeline
//!     .process(Tainted::new(json!({
//!         "title": "<b>Clean water</b>",
//!         "goal": 0,
//!         "tiers": [{"amount": "$10"}, {"amount": ""}]
//!     })))
//!     .unwrap_err();
//!
//! assert_eq!(
//!     rejected.report.fields().collect::<Vec<_>>(),
//!     ["goal", "tiers.1.amount"]
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
mod cast;
pub mod coerce;
mod config;
mod error;
mod gate;
mod messages;
pub mod path;
mod pipeline;
mod policy;
mod report;
pub mod rules;
mod sanitizer;
mod schema;
mod services;
mod store;
mod tainted;
mod validator;
mod verified;

#[cfg(test)]
mod test_utils;

pub use cast::{cast, Cast, CastError, CastSpec, TransferObject};
pub use config::{EngineConfig, JsonSettings, Settings, SETTINGS_NAMESPACE};
pub use error::{ConfigError, Error, Violation, ViolationKind};
pub use gate::PolicyGate;
pub use messages::{CatalogFormatter, MessageFormatter, PlainFormatter};
pub use pipeline::{Pipeline, Rejected};
pub use policy::{action_name, CheckFn, Policy, PolicyRequest, ACTION_PREFIX};
pub use report::ValidationReport;
pub use rules::{Rule, RuleContext, RuleRegistry};
pub use sanitizer::{sanitize, SanitizationSpec, SanitizeToken, Transform};
pub use schema::{Predicate, RuleChain, RuleEntry, Schema};
pub use services::{Collaborator, Services};
pub use store::{MemoryStore, MemoryUsers, PostRecord, RecordStore, UserDirectory, UserRecord};
pub use tainted::Tainted;
pub use validator::{always_runs, CompiledSchema, Validator, ALWAYS_RUN_RULES};
pub use verified::Verified;
