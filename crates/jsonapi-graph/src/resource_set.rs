//! Flattening an id tree into one loaded, deduplicated set of resources.

use crate::access::{AccessError, DataAccess, ResourceRecord};
use crate::cache::{CachePolicy, CachedFragment};
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::fragment::ResourceFragment;
use crate::id_tree::{PrimaryResourceIdTree, ResourceIdTree};
use crate::identity::ResourceIdentity;
use crate::schema::Schema;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Where a populated resource's payload came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSource {
    /// Loaded from data access; attribute keys are canonical.
    Record(ResourceRecord),
    /// Served from the fragment cache; already formatted for the wire.
    Cached(Arc<CachedFragment>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResource {
    pub identity: ResourceIdentity,
    /// Cache field value the fragment was resolved with.
    pub cache: Option<String>,
    pub source: ResourceSource,
}

/// One linkage entry. `resource` is set when the target is part of the set.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedRef {
    pub identity: ResourceIdentity,
    pub resource: Option<Rc<ResolvedResource>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulatedResource {
    pub resource: Rc<ResolvedResource>,
    pub primary: bool,
    /// Linkage per relationship name, present only for relationships whose
    /// linkage was resolved (included or requested through the linkage plan).
    pub relationships: BTreeMap<String, Vec<RelatedRef>>,
}

impl PopulatedResource {
    pub fn identity(&self) -> &ResourceIdentity {
        &self.resource.identity
    }
}

/// A merged fragment together with the relationship names included for it.
struct FlatFragment {
    fragment: ResourceFragment,
    included: BTreeSet<String>,
}

/// All resources of one response, keyed by type then id.
///
/// Each identity appears once no matter how many include paths reach it.
/// Primary resources keep the order of the primary query; the remaining
/// resources are ordered by the breadth-first level that first reached them.
#[derive(Debug, Default)]
pub struct ResourceSet {
    resources: BTreeMap<String, BTreeMap<String, PopulatedResource>>,
    primary: Vec<ResourceIdentity>,
    included: Vec<ResourceIdentity>,
}

impl ResourceSet {
    /// Load every resource named by `tree`.
    ///
    /// Records are fetched with one `find_resources` call per type, after
    /// serving whatever `cache` already holds. Identities whose record has
    /// vanished since id resolution are dropped along with any linkage to
    /// them through included relationships.
    pub fn populate<D: DataAccess>(
        tree: &PrimaryResourceIdTree,
        schema: &Schema,
        store: &D,
        context: &D::Context,
        cache: Option<CachePolicy<'_>>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let (flat, discovery) = flatten(tree);

        let mut by_type: BTreeMap<&str, Vec<&ResourceFragment>> = BTreeMap::new();
        for entry in flat.values() {
            by_type
                .entry(entry.fragment.identity.resource_type.as_str())
                .or_default()
                .push(&entry.fragment);
        }

        let mut loaded: BTreeMap<ResourceIdentity, Rc<ResolvedResource>> = BTreeMap::new();
        for (resource_type, fragments) in by_type {
            let def = schema.require(resource_type)?;
            let policy = cache.filter(|_| def.caching);

            let mut misses = Vec::new();
            for fragment in fragments {
                let hit = match (&policy, &fragment.cache) {
                    (Some(policy), Some(version)) => policy.get(&fragment.identity, version),
                    _ => None,
                };
                match hit {
                    Some(cached) => {
                        trace!(identity = %fragment.identity, "fragment cache hit");
                        loaded.insert(
                            fragment.identity.clone(),
                            Rc::new(ResolvedResource {
                                identity: fragment.identity.clone(),
                                cache: fragment.cache.clone(),
                                source: ResourceSource::Cached(cached),
                            }),
                        );
                    }
                    None => misses.push(fragment),
                }
            }
            if misses.is_empty() {
                continue;
            }

            cancel.check()?;
            let ids: Vec<String> = misses.iter().map(|f| f.identity.id.clone()).collect();
            let records = match store.find_resources(resource_type, &ids, context) {
                Ok(records) => records,
                Err(AccessError::NotAuthorized) | Err(AccessError::RecordNotFound(_)) => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            debug!(resource_type, requested = ids.len(), loaded = records.len(), "populated resources");

            let mut records: BTreeMap<String, ResourceRecord> = records
                .into_iter()
                .filter(|r| r.identity.resource_type == resource_type)
                .map(|r| (r.identity.id.clone(), r))
                .collect();
            for fragment in misses {
                let Some(record) = records.remove(&fragment.identity.id) else {
                    warn!(identity = %fragment.identity, "resource vanished before population");
                    continue;
                };
                loaded.insert(
                    fragment.identity.clone(),
                    Rc::new(ResolvedResource {
                        identity: fragment.identity.clone(),
                        cache: fragment.cache.clone(),
                        source: ResourceSource::Record(record),
                    }),
                );
            }
        }

        let mut set = ResourceSet::default();
        for (identity, entry) in flat {
            let Some(resource) = loaded.get(&identity) else {
                continue;
            };
            let mut relationships = BTreeMap::new();
            for (name, identities) in &entry.fragment.related {
                let included = entry.included.contains(name);
                let refs: Vec<RelatedRef> = identities
                    .iter()
                    .filter_map(|target| {
                        let resource = loaded.get(target).cloned();
                        if included && resource.is_none() {
                            return None;
                        }
                        Some(RelatedRef {
                            identity: target.clone(),
                            resource,
                        })
                    })
                    .collect();
                relationships.insert(name.clone(), refs);
            }
            set.resources
                .entry(identity.resource_type.clone())
                .or_default()
                .insert(
                    identity.id.clone(),
                    PopulatedResource {
                        resource: Rc::clone(resource),
                        primary: entry.fragment.primary,
                        relationships,
                    },
                );
        }

        for identity in discovery {
            match set.get(&identity).map(|r| r.primary) {
                Some(true) => set.primary.push(identity),
                Some(false) => set.included.push(identity),
                None => {}
            }
        }
        Ok(set)
    }

    pub fn get(&self, identity: &ResourceIdentity) -> Option<&PopulatedResource> {
        self.resources
            .get(&identity.resource_type)
            .and_then(|by_id| by_id.get(&identity.id))
    }

    pub fn contains(&self, identity: &ResourceIdentity) -> bool {
        self.get(identity).is_some()
    }

    /// Primary resources in primary query order.
    pub fn primary(&self) -> impl Iterator<Item = &PopulatedResource> {
        self.primary.iter().filter_map(|i| self.get(i))
    }

    /// Non-primary resources in discovery order.
    pub fn included(&self) -> impl Iterator<Item = &PopulatedResource> {
        self.included.iter().filter_map(|i| self.get(i))
    }

    pub fn len(&self) -> usize {
        self.resources.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merge every level of `tree` into one fragment per identity.
///
/// Returns the merged fragments and the identities in discovery order:
/// primary order first, then breadth-first by level.
fn flatten(
    tree: &PrimaryResourceIdTree,
) -> (BTreeMap<ResourceIdentity, FlatFragment>, Vec<ResourceIdentity>) {
    let mut flat = BTreeMap::new();
    let mut discovery = Vec::new();

    let root = tree.tree();
    visit_level(root, tree.order().iter(), &mut flat, &mut discovery);

    let mut queue: VecDeque<&ResourceIdTree> =
        root.related_trees.values().map(|r| r.tree()).collect();
    while let Some(level) = queue.pop_front() {
        visit_level(level, level.fragments.keys(), &mut flat, &mut discovery);
        queue.extend(level.related_trees.values().map(|r| r.tree()));
    }
    (flat, discovery)
}

fn visit_level<'a>(
    level: &'a ResourceIdTree,
    identities: impl Iterator<Item = &'a ResourceIdentity>,
    flat: &mut BTreeMap<ResourceIdentity, FlatFragment>,
    discovery: &mut Vec<ResourceIdentity>,
) {
    for identity in identities {
        let Some(fragment) = level.fragments.get(identity) else {
            continue;
        };
        let included: BTreeSet<String> = level
            .related_trees
            .keys()
            .filter(|(source_type, name)| {
                *source_type == identity.resource_type && fragment.related.contains_key(name)
            })
            .map(|(_, name)| name.clone())
            .collect();
        match flat.entry(identity.clone()) {
            Entry::Vacant(e) => {
                discovery.push(identity.clone());
                e.insert(FlatFragment {
                    fragment: fragment.clone(),
                    included,
                });
            }
            Entry::Occupied(mut e) => {
                let entry = e.get_mut();
                entry.fragment.merge(fragment.clone());
                entry.included.extend(included);
            }
        }
    }
}
