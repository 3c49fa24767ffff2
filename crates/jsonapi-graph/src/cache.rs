//! Serialized-fragment cache consulted during population.
//!
//! Only the request-independent part of a resource object is cached: its
//! formatted attributes, self link and meta. Relationship members depend on
//! the include tree of each request and are always rebuilt.

use crate::identity::ResourceIdentity;
use crate::key_format::KeyFormat;
use crate::request::SparseFields;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use parking_lot::RwLock;
use std::sync::Arc;

/// Everything a cached fragment depends on.
///
/// `version` is the value of the resource's cache field; a changed record
/// gets a new key instead of an invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource_type: String,
    pub id: String,
    pub version: String,
    pub fields: String,
    pub key_format: String,
    /// Base URL and route format the cached self link was built with.
    pub links: String,
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedFragment {
    pub attributes: Map<String, Value>,
    pub links: BTreeMap<String, String>,
    pub meta: Option<Value>,
}

/// Storage for cached fragments, shared across concurrent requests.
pub trait FragmentCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedFragment>>;

    fn put(&self, key: CacheKey, fragment: CachedFragment);
}

/// Process-local [`FragmentCache`] behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryFragmentCache {
    entries: RwLock<HashMap<CacheKey, Arc<CachedFragment>>>,
}

impl MemoryFragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl FragmentCache for MemoryFragmentCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedFragment>> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: CacheKey, fragment: CachedFragment) {
        self.entries.write().insert(key, Arc::new(fragment));
    }
}

/// Request-scoped view of a cache: knows how to build keys for this request.
#[derive(Clone, Copy)]
pub struct CachePolicy<'a> {
    pub cache: &'a dyn FragmentCache,
    pub key_format: &'a KeyFormat,
    pub base_url: &'a str,
    pub route_format: &'a KeyFormat,
    pub context: &'a str,
    pub fields: &'a SparseFields,
}

impl<'a> CachePolicy<'a> {
    pub fn key(&self, identity: &ResourceIdentity, version: &str) -> CacheKey {
        CacheKey {
            resource_type: identity.resource_type.clone(),
            id: identity.id.clone(),
            version: version.to_string(),
            fields: self.fields.signature(&identity.resource_type),
            key_format: self.key_format.name().to_string(),
            links: format!("{} {}", self.route_format.name(), self.base_url),
            context: self.context.to_string(),
        }
    }

    pub fn get(&self, identity: &ResourceIdentity, version: &str) -> Option<Arc<CachedFragment>> {
        self.cache.get(&self.key(identity, version))
    }

    pub fn put(&self, identity: &ResourceIdentity, version: &str, fragment: CachedFragment) {
        self.cache.put(self.key(identity, version), fragment);
    }
}
