//! Key formatting between canonical (underscored) names and wire names.

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Extension point for application-specific key formats.
pub trait KeyFormatter: Send + Sync {
    /// Short name folded into cache keys.
    fn name(&self) -> &str;

    fn format(&self, name: &str) -> String;

    fn unformat(&self, formatted: &str) -> String;
}

/// How canonical names are rendered on the wire.
///
/// Internal structures always hold the canonical underscored name; the
/// format is applied only when serializing and reversed when parsing request
/// parameters.
///
/// ```
/// use jsonapi_graph::v1::KeyFormat;
///
/// assert_eq!(KeyFormat::Camelized.format("author_name"), "authorName");
/// assert_eq!(KeyFormat::Dasherized.format("author_name"), "author-name");
/// assert_eq!(KeyFormat::Dasherized.unformat("author-name"), "author_name");
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    Underscored,
    Camelized,
    #[default]
    Dasherized,
    #[serde(skip)]
    Custom(Arc<dyn KeyFormatter>),
}

impl fmt::Debug for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFormat::Custom(formatter) => write!(f, "Custom({})", formatter.name()),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl KeyFormat {
    pub fn custom(formatter: impl KeyFormatter + 'static) -> Self {
        KeyFormat::Custom(Arc::new(formatter))
    }

    pub fn name(&self) -> &str {
        match self {
            KeyFormat::Underscored => "underscored",
            KeyFormat::Camelized => "camelized",
            KeyFormat::Dasherized => "dasherized",
            KeyFormat::Custom(formatter) => formatter.name(),
        }
    }

    pub fn format(&self, name: &str) -> String {
        match self {
            KeyFormat::Underscored => name.to_string(),
            KeyFormat::Camelized => name.to_case(Case::Camel),
            KeyFormat::Dasherized => name.replace('_', "-"),
            KeyFormat::Custom(formatter) => formatter.format(name),
        }
    }

    pub fn unformat(&self, formatted: &str) -> String {
        match self {
            KeyFormat::Underscored => formatted.to_string(),
            KeyFormat::Camelized => formatted.to_case(Case::Snake),
            KeyFormat::Dasherized => formatted.replace('-', "_"),
            KeyFormat::Custom(formatter) => formatter.unformat(formatted),
        }
    }
}
