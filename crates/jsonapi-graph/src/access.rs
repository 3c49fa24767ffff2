//! The data-access seam: everything the resolution core needs from storage.

use crate::config::Configuration;
use crate::identity::ResourceIdentity;
use crate::request::{Filter, Pagination, SortCriterion};
use crate::schema::{RelationshipDef, Schema};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Failures a [`DataAccess`] implementation may report.
///
/// `NotAuthorized` never reaches the client: the affected identities are
/// simply left out of the response.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("record not found: {0}")]
    RecordNotFound(ResourceIdentity),

    #[error("not authorized")]
    NotAuthorized,

    #[error("{0}")]
    Backend(String),
}

/// The minimal per-identity data a lookup returns before population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFragment {
    pub identity: ResourceIdentity,
    /// Value of the resource's cache field, when caching is enabled.
    pub cache: Option<String>,
    /// Linkage for the relationships requested through [`LinkagePlan`].
    pub linkage: BTreeMap<String, Vec<ResourceIdentity>>,
}

impl FetchedFragment {
    pub fn new(identity: ResourceIdentity) -> Self {
        Self {
            identity,
            cache: None,
            linkage: BTreeMap::new(),
        }
    }
}

/// One edge of a batched relationship lookup: `source` points at `fragment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedFragment {
    pub source: ResourceIdentity,
    pub fragment: FetchedFragment,
}

/// A fully loaded resource, as used during population.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub identity: ResourceIdentity,
    /// Attribute values keyed by canonical attribute name.
    pub attributes: Map<String, Value>,
    pub meta: Option<Value>,
}

/// Which relationships must come back with linkage even when not included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkagePlan {
    by_type: BTreeMap<String, Vec<String>>,
}

impl LinkagePlan {
    pub fn new(schema: &Schema, config: &Configuration) -> Self {
        let mut by_type = BTreeMap::new();
        for type_name in schema.types() {
            let Some(def) = schema.resource(type_name) else {
                continue;
            };
            let names: Vec<String> = def
                .relationships
                .iter()
                .filter(|r| {
                    r.always_include_linkage_data
                        || (r.is_to_one() && config.always_include_to_one_linkage_data)
                })
                .map(|r| r.name.clone())
                .collect();
            if !names.is_empty() {
                by_type.insert(type_name.to_string(), names);
            }
        }
        Self { by_type }
    }

    pub fn for_type(&self, resource_type: &str) -> &[String] {
        self.by_type
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Parameters of a primary lookup.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryQuery<'a> {
    pub filters: &'a [Filter],
    pub sort: &'a [SortCriterion],
    pub pagination: Option<Pagination>,
    pub linkage: &'a LinkagePlan,
}

/// Parameters of one batched relationship lookup.
#[derive(Debug, Clone, Copy)]
pub struct RelatedQuery<'a> {
    pub source_type: &'a str,
    pub relationship: &'a RelationshipDef,
    pub sources: &'a [ResourceIdentity],
    /// Narrowing for polymorphic targets; `None` admits every target type.
    pub target_types: Option<&'a BTreeSet<String>>,
    pub sort: &'a [SortCriterion],
    pub linkage: &'a LinkagePlan,
}

/// Storage collaborator consulted by the resolver and the resource set.
///
/// Implementations are responsible for authorization: identities the
/// context may not see must simply be absent from every result.
pub trait DataAccess {
    /// Request-scoped authorization context.
    type Context;

    /// Identities matching filters, in sort order, one page at a time.
    fn find_primary(
        &self,
        resource_type: &str,
        query: &PrimaryQuery<'_>,
        context: &Self::Context,
    ) -> Result<Vec<FetchedFragment>, AccessError>;

    /// Related identities of every source in a single call.
    fn find_related(
        &self,
        query: &RelatedQuery<'_>,
        context: &Self::Context,
    ) -> Result<Vec<RelatedFragment>, AccessError>;

    /// Full records for a batch of ids of one type. Missing ids are skipped.
    fn find_resources(
        &self,
        resource_type: &str,
        ids: &[String],
        context: &Self::Context,
    ) -> Result<Vec<ResourceRecord>, AccessError>;

    /// Total number of primary matches, ignoring pagination.
    fn count_primary(
        &self,
        _resource_type: &str,
        _filters: &[Filter],
        _context: &Self::Context,
    ) -> Result<Option<usize>, AccessError> {
        Ok(None)
    }

    /// Folded into cache keys when attribute values depend on the context.
    fn cache_context(&self, _context: &Self::Context) -> String {
        String::new()
    }
}
