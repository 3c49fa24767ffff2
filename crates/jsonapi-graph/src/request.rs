//! Raw request parameters and their validated, canonical form.
//!
//! Parsing is eager: every include path, sort key, filter and fieldset is
//! checked against the schema before any data access happens, so a malformed
//! request never triggers partial resolution work.

use crate::config::{Configuration, Paginator};
use crate::error::{Error, Result};
use crate::include::IncludeDirectives;
use crate::key_format::KeyFormat;
use crate::path::{ParseOptions, Path};
use crate::schema::{Cardinality, Schema};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Query parameters exactly as received, with wire-formatted keys.
///
/// `fields`, `filter` and `page` are keyed by the bracketed part of
/// `fields[people]`, `filter[title]` and `page[size]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParams {
    pub include: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub sort: Option<String>,
    pub filter: BTreeMap<String, String>,
    pub page: BTreeMap<String, String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include(mut self, include: impl Into<String>) -> Self {
        self.include = Some(include.into());
        self
    }

    pub fn with_fields(mut self, resource_type: impl Into<String>, fields: impl Into<String>) -> Self {
        self.fields.insert(resource_type.into(), fields.into());
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(name.into(), value.into());
        self
    }

    pub fn with_page(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.page.insert(key.into(), value.into());
        self
    }
}

/// A field reached through zero or more to-one/to-many hops.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    pub relationships: Vec<String>,
    pub field: String,
}

impl FieldPath {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            relationships: Vec::new(),
            field: name.into(),
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        let field = path.field()?;
        Some(Self {
            relationships: path
                .relationship_segments()
                .map(|s| s.name().to_string())
                .collect(),
            field: field.field_name.clone(),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rel in &self.relationships {
            write!(f, "{}.", rel)?;
        }
        write!(f, "{}", self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortCriterion {
    pub path: FieldPath,
    pub direction: SortDirection,
}

/// Match when the value at `path` equals any of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub path: FieldPath,
    pub values: Vec<String>,
}

impl Filter {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            path: FieldPath::field(crate::schema::ID_FIELD),
            values: vec![id.into()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

/// Requested sparse fieldsets, keyed by canonical type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseFields {
    by_type: BTreeMap<String, BTreeSet<String>>,
}

impl SparseFields {
    pub fn restrict(
        mut self,
        resource_type: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.by_type.insert(
            resource_type.into(),
            fields.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Whether `field` of `resource_type` should be emitted.
    pub fn allows(&self, resource_type: &str, field: &str) -> bool {
        self.by_type
            .get(resource_type)
            .is_none_or(|fields| fields.contains(field))
    }

    /// Stable description of the fieldset of one type, for cache keys.
    pub fn signature(&self, resource_type: &str) -> String {
        match self.by_type.get(resource_type) {
            Some(fields) => fields.iter().cloned().collect::<Vec<_>>().join(","),
            None => "*".to_string(),
        }
    }
}

/// A request after validation against the schema, with canonical names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub include: IncludeDirectives,
    pub fields: SparseFields,
    pub sort: Vec<SortCriterion>,
    pub filters: Vec<Filter>,
    pub pagination: Option<Pagination>,
}

impl ParsedRequest {
    pub fn parse(
        schema: &Schema,
        resource_type: &str,
        params: &RequestParams,
        config: &Configuration,
    ) -> Result<Self> {
        let key_format = &config.json_key_format;
        let def = schema.require(resource_type)?;

        let include = match &params.include {
            Some(param) => {
                let paths: Vec<String> = param
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| unformat_path(key_format, p))
                    .collect();
                IncludeDirectives::parse(schema, resource_type, &paths)?
            }
            None => IncludeDirectives::empty(resource_type),
        };

        let fields = parse_fields(schema, &params.fields, key_format)?;

        let sort = match &params.sort {
            Some(sort) => parse_sort(schema, resource_type, sort, key_format)?,
            None => parse_sort(
                schema,
                resource_type,
                &def.default_sort.join(","),
                &KeyFormat::Underscored,
            )?,
        };

        let mut filters = Vec::with_capacity(params.filter.len());
        for (name, value) in &params.filter {
            filters.push(parse_filter(schema, resource_type, name, value, key_format)?);
        }

        let pagination = parse_page(&params.page, config.default_paginator)?;

        Ok(Self {
            include,
            fields,
            sort,
            filters,
            pagination,
        })
    }
}

fn unformat_path(key_format: &KeyFormat, path: &str) -> String {
    path.split('.')
        .map(|segment| match segment.split_once('#') {
            Some((name, t)) => format!("{}#{}", key_format.unformat(name), key_format.unformat(t)),
            None => key_format.unformat(segment),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn parse_fields(
    schema: &Schema,
    raw: &BTreeMap<String, String>,
    key_format: &KeyFormat,
) -> Result<SparseFields> {
    let mut fields = SparseFields::default();
    for (raw_type, list) in raw {
        let resource_type = key_format.unformat(raw_type);
        let def = schema.require(&resource_type)?;
        let mut names = BTreeSet::new();
        for raw_field in split_list(list) {
            let field = key_format.unformat(raw_field);
            if !def.has_field(&field) {
                return Err(Error::InvalidField {
                    resource_type,
                    field: raw_field.to_string(),
                });
            }
            names.insert(field);
        }
        fields = fields.restrict(resource_type, names);
    }
    Ok(fields)
}

/// Parse a comma separated sort parameter (`-created_at,author.name`).
///
/// A path ending in a relationship sorts by that relationship's `id`.
/// Sorting through a to-many hop or an un-narrowed polymorphic hop is
/// ambiguous and rejected.
pub fn parse_sort(
    schema: &Schema,
    resource_type: &str,
    sort: &str,
    key_format: &KeyFormat,
) -> Result<Vec<SortCriterion>> {
    let mut criteria = Vec::new();
    for raw in split_list(sort) {
        let (direction, name) = match raw.strip_prefix('-') {
            Some(rest) => (SortDirection::Descending, rest),
            None => (SortDirection::Ascending, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let path = Path::parse(
            schema,
            resource_type,
            &unformat_path(key_format, name),
            ParseOptions::FIELDS,
        )?;
        let sortable = path
            .relationship_segments()
            .all(|s| s.relationship.cardinality == Cardinality::ToOne && s.resource_type().is_some());
        let field_path = FieldPath::from_path(&path).filter(|_| sortable);
        let Some(field_path) = field_path else {
            return Err(Error::InvalidSortCriteria {
                resource_type: resource_type.to_string(),
                criteria: raw.to_string(),
            });
        };
        criteria.push(SortCriterion {
            path: field_path,
            direction,
        });
    }
    Ok(criteria)
}

fn parse_filter(
    schema: &Schema,
    resource_type: &str,
    raw_name: &str,
    value: &str,
    key_format: &KeyFormat,
) -> Result<Filter> {
    let name = unformat_path(key_format, raw_name);
    let values: Vec<String> = split_list(value).map(str::to_string).collect();

    if name.contains('.') {
        let path = Path::parse(schema, resource_type, &name, ParseOptions::FIELDS)?;
        if let Some(path) = FieldPath::from_path(&path) {
            return Ok(Filter { path, values });
        }
    } else if schema.require(resource_type)?.has_filter(&name) {
        return Ok(Filter {
            path: FieldPath::field(name),
            values,
        });
    }
    Err(Error::FilterNotAllowed {
        filter: raw_name.to_string(),
    })
}

fn parse_page_value(key: &str, raw: &str, min: usize, max: usize) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(v) if v >= min && v <= max => Ok(v),
        _ => Err(Error::InvalidPageValue {
            param: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn parse_page(raw: &BTreeMap<String, String>, paginator: Paginator) -> Result<Option<Pagination>> {
    let allowed: &[&str] = match paginator {
        Paginator::None => return Ok(None),
        Paginator::Paged { .. } => &["number", "size"],
        Paginator::Offset { .. } => &["offset", "limit"],
    };
    if let Some(key) = raw.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(Error::ParameterNotAllowed(format!("page[{}]", key)));
    }

    let pagination = match paginator {
        Paginator::Paged {
            default_size,
            max_size,
        } => {
            let number = match raw.get("number") {
                Some(v) => parse_page_value("number", v, 1, usize::MAX)?,
                None => 1,
            };
            let size = match raw.get("size") {
                Some(v) => parse_page_value("size", v, 1, max_size)?,
                None => default_size,
            };
            Pagination {
                offset: (number - 1).saturating_mul(size),
                limit: size,
            }
        }
        Paginator::Offset {
            default_limit,
            max_limit,
        } => {
            let offset = match raw.get("offset") {
                Some(v) => parse_page_value("offset", v, 0, usize::MAX)?,
                None => 0,
            };
            let limit = match raw.get("limit") {
                Some(v) => parse_page_value("limit", v, 1, max_limit)?,
                None => default_limit,
            };
            Pagination { offset, limit }
        }
        Paginator::None => return Ok(None),
    };
    Ok(Some(pagination))
}
