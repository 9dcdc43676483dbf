//! The sanitize-then-validate pipeline.
//!
//! This is the only place a [`Tainted`] payload becomes [`Verified`]:
//!
//! 1. the [`SanitizationSpec`] rewrites the payload,
//! 2. the compiled [`Schema`] validates the rewritten payload,
//! 3. an empty report promotes it; anything else is [`Rejected`].

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::ConfigError;
use crate::report::ValidationReport;
use crate::sanitizer::SanitizationSpec;
use crate::schema::Schema;
use crate::tainted::Tainted;
use crate::validator::{CompiledSchema, Validator};
use crate::verified::Verified;

/// A payload refused by validation, with every collected message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payload rejected: {} field(s) failed validation", .report.len())]
pub struct Rejected {
    /// The failures, keyed by concrete field path.
    pub report: ValidationReport,
}

impl Rejected {
    /// Consumes the error, returning the report.
    pub fn into_report(self) -> ValidationReport {
        self.report
    }
}

/// Sanitizes and validates inbound payloads.
///
/// # Examples
///
/// ```
/// use payload_policy::{Pipeline, SanitizationSpec, Schema, Tainted, Validator};
/// use serde_json::json;
///
/// let pipeline = Pipeline::new(
///     Validator::default(),
///     SanitizationSpec::new().field("title", "text").unwrap(),
///     &Schema::new().field("title", "required|max:20"),
/// )
/// .unwrap();
///
/// let verified = pipeline
///     .process(Tainted::new(json!({"title": "  <b>Clean water</b> "})))
///     .unwrap();
/// assert_eq!(verified.as_ref()["title"], "Clean water");
///
/// let rejected = pipeline
///     .process(Tainted::new(json!({"title": "<i></i>"})))
///     .unwrap_err();
/// assert!(rejected.report.has("title"));
/// ```
#[derive(Debug)]
pub struct Pipeline {
    validator: Validator,
    sanitizer: SanitizationSpec,
    schema: CompiledSchema,
}

impl Pipeline {
    /// Compiles `schema` and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] raised by [`Validator::compile`].
    pub fn new(
        validator: Validator,
        sanitizer: SanitizationSpec,
        schema: &Schema,
    ) -> Result<Self, ConfigError> {
        let schema = validator.compile(schema)?;
        Ok(Self {
            validator,
            sanitizer,
            schema,
        })
    }

    /// The validator, for callers that need its services.
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Sanitizes, validates and, when nothing failed, verifies `input`.
    ///
    /// # Errors
    ///
    /// [`Rejected`] with the full report when any rule failed.
    pub fn process(&self, input: Tainted<Value>) -> Result<Verified<Value>, Rejected> {
        let payload = self.sanitizer.sanitize(input).into_inner();
        let report = self.validator.validate(&payload, &self.schema);
        if report.is_valid() {
            Ok(Verified::new_unchecked(payload))
        } else {
            debug!(failed_fields = report.len(), "payload rejected");
            Err(Rejected { report })
        }
    }
}
