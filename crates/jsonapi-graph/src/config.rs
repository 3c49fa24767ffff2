use crate::key_format::KeyFormat;
use serde::{Deserialize, Serialize};

/// Pagination strategy for primary collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Paginator {
    /// Page parameters are ignored.
    #[default]
    None,
    /// `page[number]` (1-based) and `page[size]`.
    Paged { default_size: usize, max_size: usize },
    /// `page[offset]` and `page[limit]`.
    Offset { default_limit: usize, max_limit: usize },
}

/// Request-resolution configuration.
///
/// A single immutable snapshot is handed to every request, so concurrent
/// requests never observe each other's settings. Every member has a default,
/// so a partial JSON object is a valid configuration:
///
/// ```
/// use jsonapi_graph::v1::{Configuration, KeyFormat};
///
/// let config: Configuration =
///     serde_json::from_str(r#"{"json_key_format": "camelized"}"#).unwrap();
/// assert_eq!(config.json_key_format.name(), "camelized");
/// assert_eq!(config.route_format.name(), "dasherized");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Applied to attribute keys, relationship names, meta keys and types.
    pub json_key_format: KeyFormat,
    /// Applied to type and relationship segments in links.
    pub route_format: KeyFormat,
    /// Prefix for every generated link (e.g. `https://api.example.com`).
    pub base_url: String,
    /// Emit to-one linkage data even for relationships that are not included.
    pub always_include_to_one_linkage_data: bool,
    pub default_paginator: Paginator,
    pub top_level_links_include_pagination: bool,
    pub top_level_meta_include_record_count: bool,
    pub top_level_meta_record_count_key: String,
    pub top_level_meta_include_page_count: bool,
    pub top_level_meta_page_count_key: String,
    /// Master switch for fragment caching; resources opt in individually.
    pub resource_cache: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            json_key_format: KeyFormat::Dasherized,
            route_format: KeyFormat::Dasherized,
            base_url: String::new(),
            always_include_to_one_linkage_data: false,
            default_paginator: Paginator::None,
            top_level_links_include_pagination: true,
            top_level_meta_include_record_count: false,
            top_level_meta_record_count_key: "record_count".to_string(),
            top_level_meta_include_page_count: false,
            top_level_meta_page_count_key: "page_count".to_string(),
            resource_cache: false,
        }
    }
}

impl Configuration {
    pub fn with_key_format(mut self, format: KeyFormat) -> Self {
        self.json_key_format = format;
        self
    }

    pub fn with_route_format(mut self, format: KeyFormat) -> Self {
        self.route_format = format;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.default_paginator = paginator;
        self
    }

    pub fn is_paginated(&self) -> bool {
        self.default_paginator != Paginator::None
    }
}
