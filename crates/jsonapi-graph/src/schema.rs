//! Static resource descriptors, built once at startup and looked up by type.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The implicit primary key field every resource exposes.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// A declared relationship of one resource type.
///
/// Polymorphic relationships list every concrete type the target may resolve
/// to; the concrete type of each related identity is only known at fetch time.
///
/// # JSON shape
///
/// ```json
/// { "name": "imageable", "cardinality": "to_one",
///   "target_types": ["documents", "products"], "polymorphic": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub name: String,
    pub cardinality: Cardinality,
    pub target_types: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub polymorphic: bool,
    /// Emit linkage data even when the relationship is not included.
    #[serde(default, skip_serializing_if = "is_false")]
    pub always_include_linkage_data: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclude_links: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl RelationshipDef {
    pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, Cardinality::ToOne, vec![target.into()], false)
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, Cardinality::ToMany, vec![target.into()], false)
    }

    pub fn polymorphic(
        name: impl Into<String>,
        cardinality: Cardinality,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let targets = targets.into_iter().map(Into::into).collect();
        Self::new(name, cardinality, targets, true)
    }

    fn new(
        name: impl Into<String>,
        cardinality: Cardinality,
        target_types: Vec<String>,
        polymorphic: bool,
    ) -> Self {
        Self {
            name: name.into(),
            cardinality,
            target_types,
            polymorphic,
            always_include_linkage_data: false,
            exclude_links: false,
        }
    }

    pub fn with_linkage_data(mut self) -> Self {
        self.always_include_linkage_data = true;
        self
    }

    pub fn without_links(mut self) -> Self {
        self.exclude_links = true;
        self
    }

    pub fn is_to_one(&self) -> bool {
        self.cardinality == Cardinality::ToOne
    }

    /// The single statically known target type, or `None` when polymorphic.
    pub fn target_type(&self) -> Option<&str> {
        if self.polymorphic {
            None
        } else {
            self.target_types.first().map(String::as_str)
        }
    }

    pub fn accepts_type(&self, resource_type: &str) -> bool {
        self.target_types.iter().any(|t| t == resource_type)
    }
}

/// Descriptor for one resource type: its fields, relationships, and filters.
///
/// # Builder API
///
/// ```
/// use jsonapi_graph::v1::{Cardinality, ResourceDef};
///
/// let pictures = ResourceDef::new("pictures")
///     .attribute("name")
///     .has_one("author", "people")
///     .has_polymorphic("imageable", Cardinality::ToOne, ["documents", "products"])
///     .filter("name");
///
/// assert!(pictures.relationship("imageable").unwrap().polymorphic);
/// assert!(pictures.has_field("id"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDef {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
    #[serde(default)]
    pub filters: Vec<String>,
    /// Sort applied when a request gives none, e.g. `["-created_at"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_sort: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub caching: bool,
    /// Attribute whose value versions cached fragments (e.g. `updated_at`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_field: Option<String>,
}

impl ResourceDef {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            filters: Vec::new(),
            default_sort: Vec::new(),
            caching: false,
            cache_field: None,
        }
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    pub fn attributes(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn has_one(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship_def(RelationshipDef::to_one(name, target))
    }

    pub fn has_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship_def(RelationshipDef::to_many(name, target))
    }

    pub fn has_polymorphic(
        self,
        name: impl Into<String>,
        cardinality: Cardinality,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.relationship_def(RelationshipDef::polymorphic(name, cardinality, targets))
    }

    pub fn relationship_def(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filters.push(name.into());
        self
    }

    pub fn default_sort(mut self, criteria: impl Into<String>) -> Self {
        self.default_sort.push(criteria.into());
        self
    }

    /// Enable fragment caching, versioned by `cache_field`.
    pub fn caching(mut self, cache_field: impl Into<String>) -> Self {
        self.caching = true;
        self.cache_field = Some(cache_field.into());
        self
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    /// `id`, any attribute, or any relationship.
    pub fn has_field(&self, name: &str) -> bool {
        name == ID_FIELD || self.has_attribute(name) || self.relationship(name).is_some()
    }

    pub fn has_filter(&self, name: &str) -> bool {
        name == ID_FIELD || self.filters.iter().any(|f| f == name)
    }
}

/// Registry of every resource type known to the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ResourceDef>", into = "Vec<ResourceDef>")]
pub struct Schema {
    resources: BTreeMap<String, ResourceDef>,
}

impl From<Vec<ResourceDef>> for Schema {
    fn from(defs: Vec<ResourceDef>) -> Self {
        defs.into_iter().fold(Schema::new(), Schema::with)
    }
}

impl From<Schema> for Vec<ResourceDef> {
    fn from(schema: Schema) -> Self {
        schema.resources.into_values().collect()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource, replacing any previous one of the same type.
    pub fn with(mut self, def: ResourceDef) -> Self {
        self.register(def);
        self
    }

    pub fn register(&mut self, def: ResourceDef) {
        self.resources.insert(def.type_name.clone(), def);
    }

    pub fn resource(&self, resource_type: &str) -> Option<&ResourceDef> {
        self.resources.get(resource_type)
    }

    /// Like [`Schema::resource`] but fails with `InvalidResource`.
    pub fn require(&self, resource_type: &str) -> Result<&ResourceDef> {
        self.resource(resource_type)
            .ok_or_else(|| Error::InvalidResource(resource_type.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Check that every relationship resolves and no names collide.
    pub fn validate(&self) -> Result<()> {
        for def in self.resources.values() {
            for rel in &def.relationships {
                if rel.target_types.is_empty() || (!rel.polymorphic && rel.target_types.len() != 1)
                {
                    return Err(Error::invalid_relationship(&def.type_name, &rel.name));
                }
                for target in &rel.target_types {
                    self.require(target)?;
                }
                if rel.name == ID_FIELD || def.has_attribute(&rel.name) {
                    return Err(Error::InvalidField {
                        resource_type: def.type_name.clone(),
                        field: rel.name.clone(),
                    });
                }
            }
            if def.has_attribute(ID_FIELD) {
                return Err(Error::InvalidField {
                    resource_type: def.type_name.clone(),
                    field: ID_FIELD.to_string(),
                });
            }
        }
        Ok(())
    }
}
