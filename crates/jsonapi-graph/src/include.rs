//! The merged include tree for one request.

use crate::error::Result;
use crate::path::{ParseOptions, Path};
use crate::schema::Schema;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

static NO_CHILDREN: BTreeMap<String, IncludeNode> = BTreeMap::new();

/// One relationship in the include tree.
///
/// Children reached through a `#type` narrowing are kept apart per concrete
/// type, so `imageable#documents.owner` never expands `owner` on products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IncludeNode {
    /// Concrete types a polymorphic hop is narrowed to; `None` means all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, IncludeNode>,
    /// Children that apply to one concrete target type only.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub typed_children: BTreeMap<String, BTreeMap<String, IncludeNode>>,
}

impl IncludeNode {
    fn new(type_override: Option<&str>) -> Self {
        Self {
            types: type_override.map(|t| BTreeSet::from([t.to_string()])),
            ..Self::default()
        }
    }

    /// Widen the type narrowing to cover another reference to this node.
    fn merge_type(&mut self, type_override: Option<&str>) {
        match (&mut self.types, type_override) {
            (Some(types), Some(t)) => {
                types.insert(t.to_string());
            }
            (types, None) => *types = None,
            (None, Some(_)) => {}
        }
    }

    /// Whether identities of `resource_type` pass this node's narrowing.
    pub fn admits(&self, resource_type: &str) -> bool {
        self.types.as_ref().is_none_or(|t| t.contains(resource_type))
    }

    /// The relationships to expand on resources of `resource_type`.
    pub fn children_for(&self, resource_type: &str) -> &BTreeMap<String, IncludeNode> {
        self.typed_children
            .get(resource_type)
            .unwrap_or(&self.children)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.typed_children.is_empty()
    }

    /// Path labels for this node paired with the children behind each.
    fn branches(&self, name: &str) -> Vec<(String, &BTreeMap<String, IncludeNode>)> {
        match &self.types {
            Some(types) => types
                .iter()
                .map(|t| {
                    let children = self.typed_children.get(t).unwrap_or(&NO_CHILDREN);
                    (format!("{}#{}", name, t), children)
                })
                .collect(),
            None => std::iter::once((name.to_string(), &self.children))
                .chain(
                    self.typed_children
                        .iter()
                        .map(|(t, children)| (format!("{}#{}", name, t), children)),
                )
                .collect(),
        }
    }
}

fn collect_paths(children: &BTreeMap<String, IncludeNode>, prefix: &str, out: &mut BTreeSet<String>) {
    for (name, child) in children {
        for (label, grandchildren) in child.branches(name) {
            let path = if prefix.is_empty() {
                label
            } else {
                format!("{}.{}", prefix, label)
            };
            if grandchildren.is_empty() {
                out.insert(path);
            } else {
                collect_paths(grandchildren, &path, out);
            }
        }
    }
}

/// Include paths merged into a tree with one node per relationship.
///
/// `"comments"`, `"comments.author"` and `"comments.tags"` yield a single
/// `comments` node with `author` and `tags` children. Children are kept in
/// name order, so parsing the same paths in any order yields an identical
/// tree and the tree can serve as a cache key.
///
/// ```
/// use jsonapi_graph::v1::{IncludeDirectives, ResourceDef, Schema};
///
/// let schema = Schema::new()
///     .with(ResourceDef::new("people"))
///     .with(ResourceDef::new("comments").has_one("author", "people"))
///     .with(ResourceDef::new("posts").has_many("comments", "comments").has_one("author", "people"));
///
/// let includes =
///     IncludeDirectives::parse(&schema, "posts", &["comments", "comments.author", "author"]).unwrap();
/// assert_eq!(includes.root().children.len(), 2);
/// assert_eq!(includes.paths(), vec!["author", "comments.author"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IncludeDirectives {
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(rename = "include")]
    root: IncludeNode,
}

impl IncludeDirectives {
    pub fn empty(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            root: IncludeNode::default(),
        }
    }

    pub fn parse(schema: &Schema, resource_type: &str, paths: &[impl AsRef<str>]) -> Result<Self> {
        let mut directives = Self::empty(resource_type);
        for path in paths {
            directives.add_path(schema, path.as_ref())?;
        }
        Ok(directives)
    }

    /// Parse a comma separated `include` parameter value.
    pub fn from_param(schema: &Schema, resource_type: &str, param: &str) -> Result<Self> {
        let paths: Vec<&str> = param
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        Self::parse(schema, resource_type, &paths)
    }

    fn add_path(&mut self, schema: &Schema, path_string: &str) -> Result<()> {
        let path = Path::parse(
            schema,
            &self.resource_type,
            path_string,
            ParseOptions::RELATIONSHIPS,
        )?;
        let mut segments = path.relationship_segments().peekable();
        let mut children = &mut self.root.children;
        while let Some(segment) = segments.next() {
            let type_override = segment.type_override.as_deref();
            let node = match children.entry(segment.name().to_string()) {
                Entry::Vacant(e) => e.insert(IncludeNode::new(type_override)),
                Entry::Occupied(e) => {
                    let node = e.into_mut();
                    node.merge_type(type_override);
                    node
                }
            };
            if segments.peek().is_none() {
                break;
            }
            children = match type_override {
                Some(t) => node.typed_children.entry(t.to_string()).or_default(),
                None => &mut node.children,
            };
        }
        Ok(())
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn root(&self) -> &IncludeNode {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_leaf()
    }

    /// The maximal include paths, in sorted order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = BTreeSet::new();
        collect_paths(&self.root.children, "", &mut out);
        out.into_iter().collect()
    }
}
