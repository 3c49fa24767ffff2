//! In-memory [`DataAccess`] implementation backed by fixture records.
//!
//! Used by the CLI and by tests. Besides answering queries it counts every
//! data-access call it receives, which is how the batching guarantees are
//! checked.

use crate::access::{
    AccessError, DataAccess, FetchedFragment, LinkagePlan, PrimaryQuery, RelatedFragment,
    RelatedQuery, ResourceRecord,
};
use crate::config::Configuration;
use crate::document::ResourceLinkage;
use crate::error::Result;
use crate::identity::ResourceIdentity;
use crate::request::{FieldPath, Filter, SortCriterion, SortDirection};
use crate::schema::{ID_FIELD, Schema};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// One stored resource: attributes plus relationship linkage.
///
/// ```json
/// { "id": "10", "attributes": { "title": "Hello" },
///   "relationships": { "author": { "type": "people", "id": "1003" } } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, ResourceLinkage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl StoredRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
            relationships: BTreeMap::new(),
            meta: None,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn to_one(mut self, name: impl Into<String>, resource_type: &str, id: &str) -> Self {
        self.relationships.insert(
            name.into(),
            ResourceLinkage::One(Some(ResourceIdentity::new(resource_type, id))),
        );
        self
    }

    pub fn to_many(
        mut self,
        name: impl Into<String>,
        resource_type: &str,
        ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let identities = ids
            .into_iter()
            .map(|id| ResourceIdentity::new(resource_type, id))
            .collect();
        self.relationships
            .insert(name.into(), ResourceLinkage::Many(identities));
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    fn linkage(&self, relationship: &str) -> Vec<ResourceIdentity> {
        self.relationships
            .get(relationship)
            .map(|l| l.identities().into_iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Authorization context: identities the caller may not see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryContext {
    pub denied: BTreeSet<ResourceIdentity>,
}

impl MemoryContext {
    pub fn denying(identities: impl IntoIterator<Item = ResourceIdentity>) -> Self {
        Self {
            denied: identities.into_iter().collect(),
        }
    }

    pub fn can_see(&self, identity: &ResourceIdentity) -> bool {
        !self.denied.contains(identity)
    }
}

/// Snapshot of the data-access calls a store has answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub find_primary: usize,
    pub find_related: usize,
    pub find_resources: usize,
    pub count_primary: usize,
}

#[derive(Debug, Default)]
struct CallCounters {
    find_primary: AtomicUsize,
    find_related: AtomicUsize,
    find_resources: AtomicUsize,
    count_primary: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, AtomicOrdering::Relaxed);
}

#[derive(Debug)]
pub struct MemoryStore {
    schema: Schema,
    records: RwLock<BTreeMap<String, Vec<StoredRecord>>>,
    calls: CallCounters,
}

impl MemoryStore {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: RwLock::new(BTreeMap::new()),
            calls: CallCounters::default(),
        }
    }

    pub fn with(self, resource_type: impl Into<String>, record: StoredRecord) -> Self {
        self.insert(resource_type, record);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Insert or replace a record.
    pub fn insert(&self, resource_type: impl Into<String>, record: StoredRecord) {
        let mut records = self.records.write();
        let of_type = records.entry(resource_type.into()).or_default();
        match of_type.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => of_type.push(record),
        }
    }

    pub fn remove(&self, identity: &ResourceIdentity) -> Option<StoredRecord> {
        let mut records = self.records.write();
        let of_type = records.get_mut(&identity.resource_type)?;
        let index = of_type.iter().position(|r| r.id == identity.id)?;
        Some(of_type.remove(index))
    }

    pub fn calls(&self) -> CallStats {
        CallStats {
            find_primary: self.calls.find_primary.load(AtomicOrdering::Relaxed),
            find_related: self.calls.find_related.load(AtomicOrdering::Relaxed),
            find_resources: self.calls.find_resources.load(AtomicOrdering::Relaxed),
            count_primary: self.calls.count_primary.load(AtomicOrdering::Relaxed),
        }
    }

    pub fn reset_calls(&self) {
        for counter in [
            &self.calls.find_primary,
            &self.calls.find_related,
            &self.calls.find_resources,
            &self.calls.count_primary,
        ] {
            counter.store(0, AtomicOrdering::Relaxed);
        }
    }

    fn matching(
        &self,
        records: &BTreeMap<String, Vec<StoredRecord>>,
        resource_type: &str,
        filters: &[Filter],
        context: &MemoryContext,
    ) -> Vec<StoredRecord> {
        records
            .get(resource_type)
            .map(|of_type| {
                of_type
                    .iter()
                    .filter(|r| context.can_see(&ResourceIdentity::new(resource_type, &r.id)))
                    .filter(|r| {
                        filters.iter().all(|f| {
                            values_at(records, r, &f.path, context)
                                .iter()
                                .any(|v| f.values.iter().any(|wanted| wanted == v))
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn sort(
        &self,
        records: &BTreeMap<String, Vec<StoredRecord>>,
        matched: &mut [StoredRecord],
        sort: &[SortCriterion],
        context: &MemoryContext,
    ) {
        if sort.is_empty() {
            return;
        }
        matched.sort_by(|a, b| {
            for criterion in sort {
                let left = sort_value(records, a, &criterion.path, context);
                let right = sort_value(records, b, &criterion.path, context);
                let ordering = match criterion.direction {
                    SortDirection::Ascending => cmp_values(&left, &right),
                    SortDirection::Descending => cmp_values(&right, &left),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    fn fetched(
        &self,
        records: &BTreeMap<String, Vec<StoredRecord>>,
        resource_type: &str,
        record: &StoredRecord,
        linkage: &LinkagePlan,
        context: &MemoryContext,
    ) -> FetchedFragment {
        let mut fragment = FetchedFragment::new(ResourceIdentity::new(resource_type, &record.id));
        if let Some(def) = self.schema.resource(resource_type) {
            fragment.cache = def
                .cache_field
                .as_ref()
                .and_then(|field| record.attributes.get(field))
                .map(value_string);
        }
        for name in linkage.for_type(resource_type) {
            let visible = record
                .linkage(name)
                .into_iter()
                .filter(|target| context.can_see(target) && lookup(records, target).is_some())
                .collect();
            fragment.linkage.insert(name.clone(), visible);
        }
        fragment
    }
}

fn lookup<'r>(
    records: &'r BTreeMap<String, Vec<StoredRecord>>,
    identity: &ResourceIdentity,
) -> Option<&'r StoredRecord> {
    records
        .get(&identity.resource_type)?
        .iter()
        .find(|r| r.id == identity.id)
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every value reachable from `record` along `path`, as strings.
fn values_at(
    records: &BTreeMap<String, Vec<StoredRecord>>,
    record: &StoredRecord,
    path: &FieldPath,
    context: &MemoryContext,
) -> Vec<String> {
    let mut current = vec![record];
    for relationship in &path.relationships {
        current = current
            .into_iter()
            .flat_map(|r| r.linkage(relationship))
            .filter(|target| context.can_see(target))
            .filter_map(|target| lookup(records, &target))
            .collect();
    }
    current
        .into_iter()
        .filter_map(|r| {
            if path.field == ID_FIELD {
                Some(r.id.clone())
            } else {
                r.attributes.get(&path.field).map(value_string)
            }
        })
        .collect()
}

fn sort_value(
    records: &BTreeMap<String, Vec<StoredRecord>>,
    record: &StoredRecord,
    path: &FieldPath,
    context: &MemoryContext,
) -> Value {
    let mut current = record;
    for relationship in &path.relationships {
        let target = current
            .linkage(relationship)
            .into_iter()
            .find(|t| context.can_see(t))
            .and_then(|t| lookup(records, &t));
        match target {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    if path.field == ID_FIELD {
        return match current.id.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(current.id.clone()),
        };
    }
    current.attributes.get(&path.field).cloned().unwrap_or(Value::Null)
}

/// Nulls first, numbers numerically, everything else by its string form.
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => value_string(a).cmp(&value_string(b)),
    }
}

impl DataAccess for MemoryStore {
    type Context = MemoryContext;

    fn find_primary(
        &self,
        resource_type: &str,
        query: &PrimaryQuery<'_>,
        context: &MemoryContext,
    ) -> std::result::Result<Vec<FetchedFragment>, AccessError> {
        bump(&self.calls.find_primary);
        let records = self.records.read();
        let mut matched = self.matching(&records, resource_type, query.filters, context);
        self.sort(&records, &mut matched, query.sort, context);

        let page: Vec<&StoredRecord> = match query.pagination {
            Some(p) => matched.iter().skip(p.offset).take(p.limit).collect(),
            None => matched.iter().collect(),
        };
        Ok(page
            .into_iter()
            .map(|r| self.fetched(&records, resource_type, r, query.linkage, context))
            .collect())
    }

    fn find_related(
        &self,
        query: &RelatedQuery<'_>,
        context: &MemoryContext,
    ) -> std::result::Result<Vec<RelatedFragment>, AccessError> {
        bump(&self.calls.find_related);
        let records = self.records.read();
        let mut related = Vec::new();
        for source in query.sources {
            let Some(source_record) = lookup(&records, source) else {
                continue;
            };
            let mut targets: Vec<(String, StoredRecord)> = source_record
                .linkage(&query.relationship.name)
                .into_iter()
                .filter(|t| query.target_types.is_none_or(|types| types.contains(&t.resource_type)))
                .filter(|t| context.can_see(t))
                .filter_map(|t| lookup(&records, &t).map(|r| (t.resource_type, r.clone())))
                .collect();
            if !query.sort.is_empty() {
                // Sorting is only meaningful when every target shares a type.
                if let Some(target_type) = query.relationship.target_type() {
                    let mut only: Vec<StoredRecord> = targets.into_iter().map(|(_, r)| r).collect();
                    self.sort(&records, &mut only, query.sort, context);
                    targets = only.into_iter().map(|r| (target_type.to_string(), r)).collect();
                }
            }
            for (target_type, record) in targets {
                related.push(RelatedFragment {
                    source: source.clone(),
                    fragment: self.fetched(&records, &target_type, &record, query.linkage, context),
                });
            }
        }
        Ok(related)
    }

    fn find_resources(
        &self,
        resource_type: &str,
        ids: &[String],
        context: &MemoryContext,
    ) -> std::result::Result<Vec<ResourceRecord>, AccessError> {
        bump(&self.calls.find_resources);
        let records = self.records.read();
        let Some(of_type) = records.get(resource_type) else {
            return Ok(Vec::new());
        };
        Ok(of_type
            .iter()
            .filter(|r| ids.contains(&r.id))
            .map(|r| (ResourceIdentity::new(resource_type, &r.id), r))
            .filter(|(identity, _)| context.can_see(identity))
            .map(|(identity, r)| ResourceRecord {
                identity,
                attributes: r.attributes.clone(),
                meta: r.meta.clone(),
            })
            .collect())
    }

    fn count_primary(
        &self,
        resource_type: &str,
        filters: &[Filter],
        context: &MemoryContext,
    ) -> std::result::Result<Option<usize>, AccessError> {
        bump(&self.calls.count_primary);
        let records = self.records.read();
        Ok(Some(self.matching(&records, resource_type, filters, context).len()))
    }

    fn cache_context(&self, context: &MemoryContext) -> String {
        context
            .denied
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

// ── Fixture files ────────────────────────────────────────────────────

/// A self-contained fixture: schema, configuration and records.
///
/// ```json
/// {
///   "configuration": { "json_key_format": "camelized" },
///   "resources": [ { "type": "people", "attributes": ["name"] } ],
///   "records": { "people": [ { "id": "1", "attributes": { "name": "Joe" } } ] }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub configuration: Configuration,
    pub resources: Schema,
    #[serde(default)]
    pub records: BTreeMap<String, Vec<StoredRecord>>,
}

impl StoreFile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the schema and record types, then build the store.
    pub fn into_store(self) -> Result<(Configuration, MemoryStore)> {
        self.resources.validate()?;
        for resource_type in self.records.keys() {
            self.resources.require(resource_type)?;
        }
        let store = MemoryStore::new(self.resources);
        for (resource_type, records) in self.records {
            for record in records {
                store.insert(resource_type.clone(), record);
            }
        }
        Ok((self.configuration, store))
    }
}
