use crate::access::FetchedFragment;
use crate::identity::ResourceIdentity;
use std::collections::{BTreeMap, BTreeSet};

/// Per-identity record held by an id tree while relationships are resolved.
///
/// `related` maps a relationship name to the identities it links to; an
/// initialized but empty set means "resolved, links to nothing", while a
/// missing key means the relationship was not requested at all.
/// `related_from` records which parent fragments reached this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFragment {
    pub identity: ResourceIdentity,
    pub primary: bool,
    pub cache: Option<String>,
    pub related: BTreeMap<String, BTreeSet<ResourceIdentity>>,
    pub related_from: BTreeSet<ResourceIdentity>,
}

impl ResourceFragment {
    pub fn new(identity: ResourceIdentity) -> Self {
        Self {
            identity,
            primary: false,
            cache: None,
            related: BTreeMap::new(),
            related_from: BTreeSet::new(),
        }
    }

    pub fn initialize_related(&mut self, relationship: &str) {
        self.related.entry(relationship.to_string()).or_default();
    }

    pub fn add_related_identity(&mut self, relationship: &str, identity: ResourceIdentity) {
        self.related
            .entry(relationship.to_string())
            .or_default()
            .insert(identity);
    }

    pub fn merge_related_identities(
        &mut self,
        relationship: &str,
        identities: impl IntoIterator<Item = ResourceIdentity>,
    ) {
        self.related
            .entry(relationship.to_string())
            .or_default()
            .extend(identities);
    }

    pub fn add_related_from(&mut self, identity: ResourceIdentity) {
        self.related_from.insert(identity);
    }

    /// Fold another fragment for the same identity into this one.
    pub fn merge(&mut self, other: ResourceFragment) {
        debug_assert_eq!(self.identity, other.identity);
        self.primary |= other.primary;
        if self.cache.is_none() {
            self.cache = other.cache;
        }
        self.related_from.extend(other.related_from);
        for (name, identities) in other.related {
            self.merge_related_identities(&name, identities);
        }
    }
}

impl From<FetchedFragment> for ResourceFragment {
    fn from(fetched: FetchedFragment) -> Self {
        let mut fragment = ResourceFragment::new(fetched.identity);
        fragment.cache = fetched.cache;
        for (name, identities) in fetched.linkage {
            fragment.merge_related_identities(&name, identities);
        }
        fragment
    }
}
