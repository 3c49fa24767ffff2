//! JSON:API top-level documents as produced by the serializer.

use crate::identity::ResourceIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A successful response document.
///
/// `included` never contains a resource that also appears in `data`, and
/// never contains the same identity twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Document {
    pub fn new(data: PrimaryData) -> Self {
        Self {
            data,
            included: Vec::new(),
            links: BTreeMap::new(),
            meta: Map::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Resource objects of `data`, in order. Empty for linkage documents.
    pub fn primary_resources(&self) -> Vec<&ResourceObject> {
        match &self.data {
            PrimaryData::Many(resources) => resources.iter().collect(),
            PrimaryData::One(resource) => resource.iter().collect(),
            PrimaryData::Linkage(_) => Vec::new(),
        }
    }

    /// `(type, id)` of every included resource, as serialized.
    pub fn included_identities(&self) -> Vec<ResourceIdentity> {
        self.included.iter().map(ResourceObject::identity).collect()
    }
}

/// The `data` member: a collection, a single (possibly null) resource, or
/// bare linkage for relationship endpoints.
///
/// A resource object without attributes, relationships, links or meta has
/// the same JSON shape as a resource identifier, so parsing cannot tell the
/// two apart. [`Document::from_json`] always reads such data as resources;
/// linkage documents come back as `Many` or `One` with identities intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<ResourceObject>),
    One(Option<ResourceObject>),
    Linkage(ResourceLinkage),
}

/// Resource linkage of a relationship object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceLinkage {
    One(Option<ResourceIdentity>),
    Many(Vec<ResourceIdentity>),
}

impl ResourceLinkage {
    pub fn identities(&self) -> Vec<&ResourceIdentity> {
        match self {
            ResourceLinkage::One(one) => one.iter().collect(),
            ResourceLinkage::Many(many) => many.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipObject>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ResourceObject {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: Map::new(),
            relationships: BTreeMap::new(),
            links: BTreeMap::new(),
            meta: None,
        }
    }

    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(&self.resource_type, &self.id)
    }
}

/// A member of `relationships`.
///
/// `data` is absent when linkage was not requested, and `null` for an empty
/// to-one relationship whose linkage was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipObject {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResourceLinkage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl RelationshipObject {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.data.is_none() && self.meta.is_none()
    }
}

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub title: String,
    pub detail: String,
    pub code: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}
