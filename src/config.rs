//! Read-only settings access and the engine's own configuration.
//!
//! Rules never reach for global state. Whatever they need from the host
//! application's settings is read once through a [`Settings`] accessor and
//! handed to the engine as an [`EngineConfig`].

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::path;

/// Namespace of the engine's keys inside the host settings.
pub const SETTINGS_NAMESPACE: &str = "payload_policy";

/// A key-value settings reader addressed by dotted keys.
pub trait Settings: Send + Sync {
    /// Returns the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Returns a string setting or `default`.
    fn get_str(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s,
            _ => default.to_string(),
        }
    }

    /// Returns an unsigned integer setting or `default`.
    fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    /// Returns a boolean setting or `default`.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

/// Settings backed by a JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonSettings {
    root: Value,
}

impl JsonSettings {
    /// Wraps a JSON document.
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Parses settings from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self::new)
    }
}

impl Settings for JsonSettings {
    fn get(&self, key: &str) -> Option<Value> {
        path::get(&self.root, key).cloned()
    }
}

/// Configuration consumed by rules, sanitizers, casts and the policy gate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capability that bypasses every policy check.
    pub bypass_capability: String,
    /// Minor-unit digits used when no currency-specific value applies.
    pub currency_decimals: u32,
    /// Sibling field holding the currency code of a money value.
    pub currency_field: String,
    /// Minor-unit digits per currency code (`JPY` → 0).
    pub currency_decimals_by_code: HashMap<String, u32>,
    /// Format used by the `date` cast and by `date_format` when none is given.
    pub date_format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bypass_capability: "manage_options".to_string(),
            currency_decimals: 2,
            currency_field: "currency".to_string(),
            currency_decimals_by_code: HashMap::from([
                ("JPY".to_string(), 0),
                ("KRW".to_string(), 0),
                ("BHD".to_string(), 3),
                ("KWD".to_string(), 3),
            ]),
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the `payload_policy` namespace.
    ///
    /// Missing keys fall back to their defaults. A namespace that does not
    /// deserialize is logged and replaced by the defaults.
    pub fn from_settings(settings: &dyn Settings) -> Self {
        let Some(raw) = settings.get(SETTINGS_NAMESPACE) else {
            return Self::default();
        };
        match serde_json::from_value(raw) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "invalid engine settings, using defaults");
                Self::default()
            }
        }
    }

    /// Minor-unit digits for a currency code, falling back to the default.
    pub fn decimals_for(&self, currency: Option<&str>) -> u32 {
        currency
            .map(|code| code.trim().to_ascii_uppercase())
            .and_then(|code| self.currency_decimals_by_code.get(&code).copied())
            .unwrap_or(self.currency_decimals)
    }
}
