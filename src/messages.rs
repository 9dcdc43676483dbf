//! Localized message formatting.
//!
//! Rules describe their failure with an English template such as
//! `"The {0} field must be at least {1} characters."`. A
//! [`MessageFormatter`] may translate the template before filling in its
//! positional arguments.

use std::collections::HashMap;

/// Formats a message template with positional arguments.
pub trait MessageFormatter: Send + Sync {
    /// Renders `template`, replacing `{0}`, `{1}`, ... with `args`.
    fn format(&self, template: &str, args: &[&str]) -> String;
}

/// Substitutes arguments into the template as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

impl MessageFormatter for PlainFormatter {
    fn format(&self, template: &str, args: &[&str]) -> String {
        substitute(template, args)
    }
}

/// Looks the template up in a translation catalog, then substitutes.
///
/// Templates missing from the catalog are used untranslated.
///
/// # Examples
///
/// ```
/// use payload_policy::{CatalogFormatter, MessageFormatter};
///
/// let fr = CatalogFormatter::new([(
///     "The {0} field is required.",
///     "Le champ {0} est obligatoire.",
/// )]);
/// assert_eq!(
///     fr.format("The {0} field is required.", &["titre"]),
///     "Le champ titre est obligatoire."
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct CatalogFormatter {
    catalog: HashMap<String, String>,
}

impl CatalogFormatter {
    /// Builds a formatter from `(template, translation)` pairs.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            catalog: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl MessageFormatter for CatalogFormatter {
    fn format(&self, template: &str, args: &[&str]) -> String {
        let translated = self
            .catalog
            .get(template)
            .map_or(template, String::as_str);
        substitute(translated, args)
    }
}

fn substitute(template: &str, args: &[&str]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |acc, (i, arg)| {
            acc.replace(&format!("{{{i}}}"), arg)
        })
}
