//! Rendering a populated resource set as a JSON:API document.

use crate::cache::{CachePolicy, CachedFragment};
use crate::config::Configuration;
use crate::document::{Document, PrimaryData, RelationshipObject, ResourceLinkage, ResourceObject};
use crate::error::Result;
use crate::identity::ResourceIdentity;
use crate::request::SparseFields;
use crate::resource_set::{PopulatedResource, RelatedRef, ResourceSet, ResourceSource};
use crate::schema::{RelationshipDef, ResourceDef, Schema};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::trace;

/// Serializes resource sets for one request.
///
/// Canonical names never leave this type unformatted: resource types,
/// attribute keys and relationship names go through the configured key
/// format, link segments through the route format.
pub struct Serializer<'a> {
    schema: &'a Schema,
    config: &'a Configuration,
    fields: &'a SparseFields,
    cache: Option<CachePolicy<'a>>,
}

impl<'a> Serializer<'a> {
    pub fn new(schema: &'a Schema, config: &'a Configuration, fields: &'a SparseFields) -> Self {
        Self {
            schema,
            config,
            fields,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Option<CachePolicy<'a>>) -> Self {
        self.cache = cache;
        self
    }

    /// Primary data as an array.
    pub fn serialize_collection(&self, set: &ResourceSet) -> Result<Document> {
        let data = set
            .primary()
            .map(|r| self.resource_object(r))
            .collect::<Result<Vec<_>>>()?;
        let mut document = Document::new(PrimaryData::Many(data));
        document.included = self.included(set)?;
        Ok(document)
    }

    /// Primary data as a single object, or `null` when the set has none.
    pub fn serialize_single(&self, set: &ResourceSet) -> Result<Document> {
        let data = set.primary().next().map(|r| self.resource_object(r)).transpose()?;
        let mut document = Document::new(PrimaryData::One(data));
        document.included = self.included(set)?;
        Ok(document)
    }

    /// Bare linkage for a relationship endpoint.
    pub fn serialize_linkage(
        &self,
        source: &ResourceIdentity,
        relationship: &RelationshipDef,
        targets: &[ResourceIdentity],
    ) -> Document {
        let identities = targets.iter().map(|t| self.identifier(t));
        let linkage = if relationship.is_to_one() {
            ResourceLinkage::One(identities.into_iter().next())
        } else {
            ResourceLinkage::Many(identities.collect())
        };
        let mut document = Document::new(PrimaryData::Linkage(linkage));
        if !relationship.exclude_links {
            document.links = self.relationship_links(source, &relationship.name);
        }
        document
    }

    fn included(&self, set: &ResourceSet) -> Result<Vec<ResourceObject>> {
        set.included().map(|r| self.resource_object(r)).collect()
    }

    /// A type, attribute or relationship name as it appears in the body.
    pub fn format_key(&self, name: &str) -> String {
        self.config.json_key_format.format(name)
    }

    /// A type or relationship name as it appears in a link.
    pub fn format_route(&self, name: &str) -> String {
        self.config.route_format.format(name)
    }

    /// `{base_url}/{type}/{id}`
    pub fn self_link(&self, identity: &ResourceIdentity) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url,
            self.format_route(&identity.resource_type),
            identity.id
        )
    }

    /// `self` and `related` links of one relationship of `source`.
    pub fn relationship_links(
        &self,
        source: &ResourceIdentity,
        relationship: &str,
    ) -> BTreeMap<String, String> {
        let base = self.self_link(source);
        let route = self.format_route(relationship);
        BTreeMap::from([
            ("self".to_string(), format!("{}/relationships/{}", base, route)),
            ("related".to_string(), format!("{}/{}", base, route)),
        ])
    }

    fn identifier(&self, identity: &ResourceIdentity) -> ResourceIdentity {
        ResourceIdentity::new(self.format_key(&identity.resource_type), &identity.id)
    }

    pub fn resource_object(&self, populated: &PopulatedResource) -> Result<ResourceObject> {
        let identity = populated.identity();
        let def = self.schema.require(&identity.resource_type)?;

        let fragment = match &populated.resource.source {
            ResourceSource::Cached(cached) => CachedFragment::clone(cached),
            ResourceSource::Record(record) => {
                let fragment = CachedFragment {
                    attributes: self.attributes(def, &record.attributes),
                    links: BTreeMap::from([("self".to_string(), self.self_link(identity))]),
                    meta: record.meta.clone(),
                };
                if let Some(policy) = &self.cache
                    && def.caching
                    && let Some(version) = &populated.resource.cache
                {
                    trace!(%identity, "writing fragment cache");
                    policy.put(identity, version, fragment.clone());
                }
                fragment
            }
        };

        let mut object = ResourceObject::new(self.format_key(&identity.resource_type), &identity.id);
        object.attributes = fragment.attributes;
        object.links = fragment.links;
        object.meta = fragment.meta;
        object.relationships = self.relationships(def, identity, &populated.relationships);
        Ok(object)
    }

    fn attributes(&self, def: &ResourceDef, values: &Map<String, Value>) -> Map<String, Value> {
        def.attributes
            .iter()
            .filter(|name| self.fields.allows(&def.type_name, name))
            .map(|name| {
                let value = values.get(name).cloned().unwrap_or(Value::Null);
                (self.format_key(name), value)
            })
            .collect()
    }

    fn relationships(
        &self,
        def: &ResourceDef,
        identity: &ResourceIdentity,
        resolved: &BTreeMap<String, Vec<RelatedRef>>,
    ) -> BTreeMap<String, RelationshipObject> {
        let mut relationships = BTreeMap::new();
        for relationship in &def.relationships {
            if !self.fields.allows(&def.type_name, &relationship.name) {
                continue;
            }
            let mut object = RelationshipObject::default();
            if !relationship.exclude_links {
                object.links = self.relationship_links(identity, &relationship.name);
            }
            if let Some(refs) = resolved.get(&relationship.name) {
                let identifiers = refs.iter().map(|r| self.identifier(&r.identity));
                object.data = Some(if relationship.is_to_one() {
                    ResourceLinkage::One(identifiers.into_iter().next())
                } else {
                    let identifiers: Vec<_> = identifiers.collect();
                    if self.config.is_paginated() {
                        object.meta = Some(json!({ "count": identifiers.len() }));
                    }
                    ResourceLinkage::Many(identifiers)
                });
            }
            if !object.is_empty() {
                relationships.insert(self.format_key(&relationship.name), object);
            }
        }
        relationships
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{LinkagePlan, PrimaryQuery};
    use crate::cache::MemoryFragmentCache;
    use crate::cancel::CancellationToken;
    use crate::config::Paginator;
    use crate::id_tree::IdTreeResolver;
    use crate::include::IncludeDirectives;
    use crate::key_format::KeyFormat;
    use crate::memory::{MemoryContext, MemoryStore};
    use crate::request::Filter;
    use crate::test_support::{blog_schema, blog_store};

    fn resolve(
        store: &MemoryStore,
        config: &Configuration,
        resource_type: &str,
        filters: &[Filter],
        includes: &[&str],
    ) -> ResourceSet {
        let schema = blog_schema();
        let include = IncludeDirectives::parse(&schema, resource_type, includes).unwrap();
        let linkage = LinkagePlan::new(&schema, config);
        let cancel = CancellationToken::new();
        let context = MemoryContext::default();
        let resolver = IdTreeResolver::new(&schema, store, &context, &linkage, &cancel);
        let query = PrimaryQuery {
            filters,
            sort: &[],
            pagination: None,
            linkage: &linkage,
        };
        let tree = resolver.find_primary(resource_type, &query, include.root()).unwrap();
        ResourceSet::populate(&tree, &schema, store, &context, None, &cancel).unwrap()
    }

    fn to_value(config: &Configuration, set: &ResourceSet, fields: &SparseFields) -> Value {
        let schema = blog_schema();
        let document = Serializer::new(&schema, config, fields)
            .serialize_collection(set)
            .unwrap();
        serde_json::to_value(&document).unwrap()
    }

    #[test]
    fn test_included_resources_and_linkage() {
        let store = blog_store();
        let config = Configuration::default();
        let set = resolve(&store, &config, "posts", &[Filter::id("10")], &["author"]);
        let doc = to_value(&config, &set, &SparseFields::default());

        let post = &doc["data"][0];
        assert_eq!(post["type"], "posts");
        assert_eq!(post["attributes"]["title"], "JR Solves your serialization woes!");
        assert_eq!(
            post["relationships"]["author"]["data"],
            json!({"type": "people", "id": "1003"})
        );
        assert_eq!(post["links"]["self"], "/posts/10");
        assert_eq!(
            post["relationships"]["author"]["links"]["related"],
            "/posts/10/author"
        );
        // not included, so no linkage data
        assert!(post["relationships"]["comments"].get("data").is_none());

        assert_eq!(doc["included"].as_array().unwrap().len(), 1);
        assert_eq!(doc["included"][0]["id"], "1003");
    }

    #[test]
    fn test_key_format_applies_to_every_key() {
        let store = blog_store();
        let config = Configuration::default()
            .with_key_format(KeyFormat::Camelized)
            .with_base_url("https://api.example.com");
        let set = resolve(&store, &config, "people", &[Filter::id("1003")], &["favorite_post"]);
        let doc = to_value(&config, &set, &SparseFields::default());

        let person = &doc["data"][0];
        assert!(person["attributes"].get("updatedAt").is_some());
        assert!(person["relationships"].get("favoritePost").is_some());
        assert_eq!(
            person["relationships"]["favoritePost"]["links"]["self"],
            "https://api.example.com/people/1003/relationships/favorite-post"
        );
    }

    #[test]
    fn test_empty_to_one_serializes_null() {
        let store = blog_store();
        let config = Configuration::default();
        let set = resolve(&store, &config, "people", &[Filter::id("1004")], &["favorite_post"]);
        let doc = to_value(&config, &set, &SparseFields::default());
        assert_eq!(doc["data"][0]["relationships"]["favorite-post"]["data"], Value::Null);
        assert!(doc.get("included").is_none());
    }

    #[test]
    fn test_sparse_fields_restrict_output() {
        let store = blog_store();
        let config = Configuration::default();
        let set = resolve(&store, &config, "posts", &[Filter::id("10")], &[]);
        let fields = SparseFields::default().restrict("posts", ["title", "author"]);
        let doc = to_value(&config, &set, &fields);
        let post = &doc["data"][0];
        assert_eq!(post["attributes"].as_object().unwrap().len(), 1);
        assert_eq!(
            post["relationships"].as_object().unwrap().keys().collect::<Vec<_>>(),
            vec!["author"]
        );
        assert_eq!(post["id"], "10");
    }

    #[test]
    fn test_to_many_count_when_paginated() {
        let store = blog_store();
        let config = Configuration::default().with_paginator(Paginator::Paged {
            default_size: 10,
            max_size: 20,
        });
        let set = resolve(&store, &config, "posts", &[Filter::id("10")], &["comments"]);
        let doc = to_value(&config, &set, &SparseFields::default());
        assert_eq!(doc["data"][0]["relationships"]["comments"]["meta"]["count"], 2);
    }

    #[test]
    fn test_always_include_to_one_linkage() {
        let store = blog_store();
        let config = Configuration {
            always_include_to_one_linkage_data: true,
            ..Configuration::default()
        };
        let set = resolve(&store, &config, "comments", &[Filter::id("100")], &[]);
        let doc = to_value(&config, &set, &SparseFields::default());
        let rels = &doc["data"][0]["relationships"];
        assert_eq!(rels["author"]["data"]["id"], "1003");
        assert_eq!(rels["post"]["data"]["id"], "10");
        assert!(rels["tags"].get("data").is_none());
        assert!(doc.get("included").is_none());
    }

    #[test]
    fn test_polymorphic_linkage_uses_concrete_type() {
        let store = blog_store();
        let config = Configuration::default();
        let set = resolve(&store, &config, "pictures", &[], &["imageable"]);
        let doc = to_value(&config, &set, &SparseFields::default());
        let types: Vec<&str> = doc["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["relationships"]["imageable"]["data"]["type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["documents", "products", "documents"]);
    }

    #[test]
    fn test_cache_written_on_miss() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let set = resolve(&store, &config, "people", &[], &[]);
        let cache = MemoryFragmentCache::new();
        let fields = SparseFields::default();
        let policy = CachePolicy {
            cache: &cache,
            key_format: &config.json_key_format,
            base_url: &config.base_url,
            route_format: &config.route_format,
            context: "",
            fields: &fields,
        };
        Serializer::new(&schema, &config, &fields)
            .with_cache(Some(policy))
            .serialize_collection(&set)
            .unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_linkage_document() {
        let schema = blog_schema();
        let config = Configuration::default();
        let fields = SparseFields::default();
        let serializer = Serializer::new(&schema, &config, &fields);
        let post = ResourceIdentity::new("posts", "10");
        let comments = schema.require("posts").unwrap().relationship("comments").unwrap();
        let doc = serializer.serialize_linkage(
            &post,
            comments,
            &[ResourceIdentity::new("comments", "100")],
        );
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "data": [{"type": "comments", "id": "100"}],
                "links": {
                    "self": "/posts/10/relationships/comments",
                    "related": "/posts/10/comments"
                }
            })
        );
    }
}
