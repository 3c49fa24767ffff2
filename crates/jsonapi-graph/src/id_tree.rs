//! Identity resolution across the include tree.
//!
//! A [`PrimaryResourceIdTree`] holds the fragments matched by the primary
//! query; each included relationship hangs a [`RelatedResourceIdTree`] off
//! the level it starts from. Every level is filled with one batched
//! `find_related` call per relationship name (and per concrete source type
//! on polymorphic levels), never one call per fragment.
//!
//! Child trees are keyed by source type and relationship name, so a
//! polymorphic level expands each concrete type with its own include
//! children.
//!
//! Closure: every identity in a parent fragment's `related[name]` set is a
//! key in the fragment map of the child tree for its type and `name`.

use crate::access::{
    AccessError, DataAccess, FetchedFragment, LinkagePlan, PrimaryQuery, RelatedFragment,
    RelatedQuery,
};
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::fragment::ResourceFragment;
use crate::identity::ResourceIdentity;
use crate::include::IncludeNode;
use crate::request::SortCriterion;
use crate::schema::{RelationshipDef, Schema};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{debug, trace, warn};

/// Fragments of one level plus the child trees hanging off it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIdTree {
    pub fragments: BTreeMap<ResourceIdentity, ResourceFragment>,
    /// Keyed by `(source type, relationship name)`.
    pub related_trees: BTreeMap<(String, String), RelatedResourceIdTree>,
}

impl ResourceIdTree {
    /// The level reached from this level's `source_type` resources through
    /// `relationship`.
    pub fn related_tree(
        &self,
        source_type: &str,
        relationship: &str,
    ) -> Option<&RelatedResourceIdTree> {
        self.related_trees
            .get(&(source_type.to_string(), relationship.to_string()))
    }

    /// Identities of this level grouped by concrete type.
    pub fn identities_by_type(&self) -> BTreeMap<String, Vec<ResourceIdentity>> {
        let mut by_type: BTreeMap<String, Vec<ResourceIdentity>> = BTreeMap::new();
        for identity in self.fragments.keys() {
            by_type
                .entry(identity.resource_type.clone())
                .or_default()
                .push(identity.clone());
        }
        by_type
    }

    /// Check the closure property over this tree and all its descendants.
    pub fn is_closed(&self) -> bool {
        self.related_trees.iter().all(|((source_type, name), child)| {
            let closed_here = self
                .fragments
                .values()
                .filter(|f| &f.identity.resource_type == source_type)
                .filter_map(|f| f.related.get(name))
                .flatten()
                .all(|identity| child.tree.fragments.contains_key(identity));
            closed_here && child.tree.is_closed()
        })
    }
}

/// The root level: fragments matched by the primary query, in query order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryResourceIdTree {
    order: Vec<ResourceIdentity>,
    tree: ResourceIdTree,
}

impl PrimaryResourceIdTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource_fragment(&mut self, mut fragment: ResourceFragment) {
        fragment.primary = true;
        match self.tree.fragments.entry(fragment.identity.clone()) {
            Entry::Vacant(e) => {
                self.order.push(fragment.identity.clone());
                e.insert(fragment);
            }
            Entry::Occupied(mut e) => e.get_mut().merge(fragment),
        }
    }

    /// Add query results, keeping the order they arrive in.
    pub fn add_resource_fragments(&mut self, fragments: impl IntoIterator<Item = FetchedFragment>) {
        for fetched in fragments {
            self.add_resource_fragment(ResourceFragment::from(fetched));
        }
    }

    /// Primary identities in the order the query returned them.
    pub fn order(&self) -> &[ResourceIdentity] {
        &self.order
    }

    pub fn tree(&self) -> &ResourceIdTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ResourceIdTree {
        &mut self.tree
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

/// A level reached from its parent through one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedResourceIdTree {
    relationship: RelationshipDef,
    tree: ResourceIdTree,
}

impl RelatedResourceIdTree {
    pub fn new(relationship: RelationshipDef) -> Self {
        Self {
            relationship,
            tree: ResourceIdTree::default(),
        }
    }

    pub fn relationship(&self) -> &RelationshipDef {
        &self.relationship
    }

    pub fn tree(&self) -> &ResourceIdTree {
        &self.tree
    }

    /// Record `source -> fetched` and keep a single fragment per identity.
    fn add_resource_fragment(
        &mut self,
        source_fragments: &mut BTreeMap<ResourceIdentity, ResourceFragment>,
        source: ResourceIdentity,
        fetched: FetchedFragment,
    ) {
        let Some(source_fragment) = source_fragments.get_mut(&source) else {
            return;
        };
        source_fragment.add_related_identity(&self.relationship.name, fetched.identity.clone());

        let mut fragment = ResourceFragment::from(fetched);
        fragment.add_related_from(source);
        match self.tree.fragments.entry(fragment.identity.clone()) {
            Entry::Vacant(e) => {
                e.insert(fragment);
            }
            Entry::Occupied(mut e) => {
                trace!(identity = %fragment.identity, "merging repeated fragment");
                e.get_mut().merge(fragment);
            }
        }
    }
}

/// Turns lookups that must stay invisible into empty results.
fn omit_hidden<T>(result: std::result::Result<Vec<T>, AccessError>) -> Result<Vec<T>> {
    match result {
        Ok(found) => Ok(found),
        Err(AccessError::NotAuthorized) | Err(AccessError::RecordNotFound(_)) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Builds id trees against a [`DataAccess`] collaborator for one request.
pub struct IdTreeResolver<'a, D: DataAccess> {
    schema: &'a Schema,
    store: &'a D,
    context: &'a D::Context,
    linkage: &'a LinkagePlan,
    cancel: &'a CancellationToken,
}

impl<'a, D: DataAccess> IdTreeResolver<'a, D> {
    pub fn new(
        schema: &'a Schema,
        store: &'a D,
        context: &'a D::Context,
        linkage: &'a LinkagePlan,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            schema,
            store,
            context,
            linkage,
            cancel,
        }
    }

    /// Resolve the primary fragments and then every included level.
    ///
    /// A filtered query that finds nothing (or nothing visible) yields an
    /// empty tree; callers looking up a single id turn that into
    /// `RecordNotFound`.
    pub fn find_primary(
        &self,
        resource_type: &str,
        query: &PrimaryQuery<'_>,
        include: &IncludeNode,
    ) -> Result<PrimaryResourceIdTree> {
        self.cancel.check()?;
        let fetched = omit_hidden(self.store.find_primary(resource_type, query, self.context))?;
        debug!(resource_type, found = fetched.len(), "resolved primary identities");

        let mut primary = PrimaryResourceIdTree::new();
        primary.add_resource_fragments(
            fetched
                .into_iter()
                .filter(|f| f.identity.resource_type == resource_type),
        );
        self.load_included(primary.tree_mut(), include)?;
        Ok(primary)
    }

    /// Resolve the targets of one source's relationship as primary data.
    pub fn find_related_primary(
        &self,
        source: &ResourceIdentity,
        relationship: &RelationshipDef,
        sort: &[SortCriterion],
        include: &IncludeNode,
    ) -> Result<PrimaryResourceIdTree> {
        self.cancel.check()?;
        let sources = std::slice::from_ref(source);
        let query = RelatedQuery {
            source_type: &source.resource_type,
            relationship,
            sources,
            target_types: None,
            sort,
            linkage: self.linkage,
        };
        let related = omit_hidden(self.store.find_related(&query, self.context))?;

        let mut primary = PrimaryResourceIdTree::new();
        primary.add_resource_fragments(
            related
                .into_iter()
                .filter(|r| &r.source == source && relationship.accepts_type(&r.fragment.identity.resource_type))
                .map(|r| r.fragment),
        );
        self.load_included(primary.tree_mut(), include)?;
        Ok(primary)
    }

    /// Expand `tree` along the children of `include` that apply to each
    /// concrete type on this level, recursively.
    pub fn load_included(&self, tree: &mut ResourceIdTree, include: &IncludeNode) -> Result<()> {
        if include.is_leaf() || tree.fragments.is_empty() {
            return Ok(());
        }
        let by_type = tree.identities_by_type();

        for (source_type, sources) in &by_type {
            let def = self.schema.require(source_type)?;
            for (name, node) in include.children_for(source_type) {
                let Some(relationship) = def.relationship(name) else {
                    continue;
                };

                let related = self.related(source_type, relationship, sources, node)?;

                // The include lookup is authoritative for this relationship.
                for source in sources {
                    if let Some(fragment) = tree.fragments.get_mut(source) {
                        fragment.related.insert(name.clone(), Default::default());
                    }
                }

                let child = tree
                    .related_trees
                    .entry((source_type.clone(), name.clone()))
                    .or_insert_with(|| RelatedResourceIdTree::new(relationship.clone()));
                for RelatedFragment { source, fragment } in related {
                    let target_type = &fragment.identity.resource_type;
                    if !node.admits(target_type) {
                        continue;
                    }
                    if !relationship.accepts_type(target_type) {
                        warn!(
                            relationship = %name,
                            identity = %fragment.identity,
                            "data access returned an undeclared target type"
                        );
                        continue;
                    }
                    child.add_resource_fragment(&mut tree.fragments, source, fragment);
                }
                self.load_included(&mut child.tree, node)?;
            }
        }
        Ok(())
    }

    fn related(
        &self,
        source_type: &str,
        relationship: &RelationshipDef,
        sources: &[ResourceIdentity],
        node: &IncludeNode,
    ) -> Result<Vec<RelatedFragment>> {
        self.cancel.check()?;
        let query = RelatedQuery {
            source_type,
            relationship,
            sources,
            target_types: node.types.as_ref(),
            sort: &[],
            linkage: self.linkage,
        };
        let related = omit_hidden(self.store.find_related(&query, self.context))?;
        debug!(
            source_type,
            relationship = %relationship.name,
            sources = sources.len(),
            found = related.len(),
            "resolved related identities"
        );
        Ok(related)
    }
}
