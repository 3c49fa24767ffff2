//! Request operations: parse, resolve identities, populate, serialize.

use crate::access::{AccessError, DataAccess, LinkagePlan, PrimaryQuery};
use crate::cache::{CachePolicy, FragmentCache};
use crate::cancel::CancellationToken;
use crate::config::{Configuration, Paginator};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::id_tree::{IdTreeResolver, PrimaryResourceIdTree};
use crate::identity::ResourceIdentity;
use crate::include::IncludeDirectives;
use crate::request::{Filter, Pagination, ParsedRequest, RequestParams, SparseFields};
use crate::resource_set::ResourceSet;
use crate::schema::{RelationshipDef, Schema};
use crate::serializer::Serializer;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, debug_span};

/// Entry point for resolving JSON:API read requests against a [`DataAccess`].
///
/// A processor borrows the startup-built schema, the store and one
/// configuration snapshot; it holds no per-request state, so a single
/// instance may serve any number of requests. The optional fragment cache is
/// the only state shared between requests.
///
/// ```
/// use jsonapi_graph::v1::{
///     Configuration, MemoryContext, MemoryStore, Processor, RequestParams, ResourceDef, Schema,
///     StoredRecord,
/// };
///
/// let schema = Schema::new()
///     .with(ResourceDef::new("people").attribute("name"))
///     .with(ResourceDef::new("posts").attribute("title").has_one("author", "people"));
/// let store = MemoryStore::new(schema.clone())
///     .with("people", StoredRecord::new("9").attr("name", "Dan"))
///     .with("posts", StoredRecord::new("1").attr("title", "Hi").to_one("author", "people", "9"));
/// let config = Configuration::default();
///
/// let processor = Processor::new(&schema, &store, &config);
/// let params = RequestParams::new().with_include("author");
/// let doc = processor.find("posts", &params, &MemoryContext::default()).unwrap();
/// assert_eq!(doc.included.len(), 1);
/// assert_eq!(doc.included[0].attributes["name"], "Dan");
/// ```
pub struct Processor<'a, D: DataAccess> {
    schema: &'a Schema,
    store: &'a D,
    config: &'a Configuration,
    cache: Option<&'a dyn FragmentCache>,
    cancel: CancellationToken,
}

impl<'a, D: DataAccess> Processor<'a, D> {
    pub fn new(schema: &'a Schema, store: &'a D, config: &'a Configuration) -> Self {
        Self {
            schema,
            store,
            config,
            cache: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a fragment cache; consulted only when `resource_cache` is on.
    pub fn with_cache(mut self, cache: &'a dyn FragmentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A filtered, sorted, paginated collection of `resource_type`.
    pub fn find(
        &self,
        resource_type: &str,
        params: &RequestParams,
        context: &D::Context,
    ) -> Result<Document> {
        let _span = debug_span!("find", resource_type).entered();
        let request = ParsedRequest::parse(self.schema, resource_type, params, self.config)?;
        let linkage = LinkagePlan::new(self.schema, self.config);
        let query = PrimaryQuery {
            filters: &request.filters,
            sort: &request.sort,
            pagination: request.pagination,
            linkage: &linkage,
        };
        let tree = self
            .resolver(context, &linkage)
            .find_primary(resource_type, &query, request.include.root())?;

        let cache_context = self.store.cache_context(context);
        let set = self.populate(&tree, context, &request.fields, &cache_context)?;
        let mut document = self
            .serializer(&request.fields, &cache_context)
            .serialize_collection(&set)?;

        self.add_top_level(&mut document, resource_type, &request, context)?;
        Ok(document)
    }

    /// One resource by id. Fails with `RecordNotFound` when it is absent or
    /// not visible to `context`.
    pub fn show(
        &self,
        resource_type: &str,
        id: &str,
        params: &RequestParams,
        context: &D::Context,
    ) -> Result<Document> {
        let _span = debug_span!("show", resource_type, id).entered();
        let request = ParsedRequest::parse(self.schema, resource_type, params, self.config)?;
        let linkage = LinkagePlan::new(self.schema, self.config);
        let filters = [Filter::id(id)];
        let query = PrimaryQuery {
            filters: &filters,
            sort: &[],
            pagination: None,
            linkage: &linkage,
        };
        let tree = self
            .resolver(context, &linkage)
            .find_primary(resource_type, &query, request.include.root())?;
        if tree.is_empty() {
            return Err(record_not_found(resource_type, id));
        }

        let cache_context = self.store.cache_context(context);
        let set = self.populate(&tree, context, &request.fields, &cache_context)?;
        let document = self
            .serializer(&request.fields, &cache_context)
            .serialize_single(&set)?;
        Ok(document)
    }

    /// The targets of one relationship of one resource, as primary data.
    ///
    /// To-one relationships yield a single object (or `null`), to-many an
    /// array. Includes and sorting are validated against the target type,
    /// so they are only accepted for non-polymorphic relationships.
    pub fn show_related(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        params: &RequestParams,
        context: &D::Context,
    ) -> Result<Document> {
        let _span = debug_span!("show_related", resource_type, id, relationship).entered();
        let relationship = self.relationship(resource_type, relationship)?;
        let request = match relationship.target_type() {
            Some(target) => ParsedRequest::parse(self.schema, target, params, self.config)?,
            None => self.parse_polymorphic(resource_type, relationship, params)?,
        };

        let source = self.find_source(resource_type, id, context)?;
        let linkage = LinkagePlan::new(self.schema, self.config);
        let tree = self.resolver(context, &linkage).find_related_primary(
            &source,
            relationship,
            &request.sort,
            request.include.root(),
        )?;

        let cache_context = self.store.cache_context(context);
        let set = self.populate(&tree, context, &request.fields, &cache_context)?;
        let serializer = self.serializer(&request.fields, &cache_context);
        let mut document = if relationship.is_to_one() {
            serializer.serialize_single(&set)?
        } else {
            serializer.serialize_collection(&set)?
        };
        if !relationship.exclude_links {
            let links = serializer.relationship_links(&source, &relationship.name);
            if let Some(related) = links.get("related") {
                document.links.insert("self".to_string(), related.clone());
            }
        }
        Ok(document)
    }

    /// Bare linkage of one relationship of one resource.
    pub fn show_relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        context: &D::Context,
    ) -> Result<Document> {
        let _span = debug_span!("show_relationship", resource_type, id, relationship).entered();
        let relationship = self.relationship(resource_type, relationship)?;
        let source = self.find_source(resource_type, id, context)?;

        let linkage = LinkagePlan::default();
        let tree = self.resolver(context, &linkage).find_related_primary(
            &source,
            relationship,
            &[],
            IncludeDirectives::empty(resource_type).root(),
        )?;

        let fields = SparseFields::default();
        let serializer = Serializer::new(self.schema, self.config, &fields);
        Ok(serializer.serialize_linkage(&source, relationship, tree.order()))
    }

    fn relationship(&self, resource_type: &str, name: &str) -> Result<&'a RelationshipDef> {
        let schema: &'a Schema = self.schema;
        schema
            .require(resource_type)?
            .relationship(name)
            .ok_or_else(|| Error::invalid_relationship(resource_type, name))
    }

    fn parse_polymorphic(
        &self,
        resource_type: &str,
        relationship: &RelationshipDef,
        params: &RequestParams,
    ) -> Result<ParsedRequest> {
        if params.include.as_deref().is_some_and(|i| !i.trim().is_empty()) {
            return Err(Error::invalid_relationship(resource_type, &relationship.name));
        }
        if let Some(sort) = params.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            return Err(Error::InvalidSortCriteria {
                resource_type: resource_type.to_string(),
                criteria: sort.to_string(),
            });
        }
        let target = relationship
            .target_types
            .first()
            .ok_or_else(|| Error::invalid_relationship(resource_type, &relationship.name))?;
        let fields_only = RequestParams {
            fields: params.fields.clone(),
            ..RequestParams::default()
        };
        let mut request = ParsedRequest::parse(self.schema, target, &fields_only, self.config)?;
        request.sort.clear();
        Ok(request)
    }

    /// Look up the source of a relationship request, failing when invisible.
    fn find_source(
        &self,
        resource_type: &str,
        id: &str,
        context: &D::Context,
    ) -> Result<ResourceIdentity> {
        let linkage = LinkagePlan::default();
        let filters = [Filter::id(id)];
        let query = PrimaryQuery {
            filters: &filters,
            sort: &[],
            pagination: None,
            linkage: &linkage,
        };
        let tree = self.resolver(context, &linkage).find_primary(
            resource_type,
            &query,
            IncludeDirectives::empty(resource_type).root(),
        )?;
        tree.order()
            .first()
            .cloned()
            .ok_or_else(|| record_not_found(resource_type, id))
    }

    fn resolver<'r>(
        &'r self,
        context: &'r D::Context,
        linkage: &'r LinkagePlan,
    ) -> IdTreeResolver<'r, D> {
        IdTreeResolver::new(self.schema, self.store, context, linkage, &self.cancel)
    }

    fn cache_policy<'r>(
        &'r self,
        fields: &'r SparseFields,
        cache_context: &'r str,
    ) -> Option<CachePolicy<'r>> {
        let cache = self.cache.filter(|_| self.config.resource_cache)?;
        Some(CachePolicy {
            cache,
            key_format: &self.config.json_key_format,
            base_url: &self.config.base_url,
            route_format: &self.config.route_format,
            context: cache_context,
            fields,
        })
    }

    fn populate(
        &self,
        tree: &PrimaryResourceIdTree,
        context: &D::Context,
        fields: &SparseFields,
        cache_context: &str,
    ) -> Result<ResourceSet> {
        ResourceSet::populate(
            tree,
            self.schema,
            self.store,
            context,
            self.cache_policy(fields, cache_context),
            &self.cancel,
        )
    }

    fn serializer<'r>(&'r self, fields: &'r SparseFields, cache_context: &'r str) -> Serializer<'r> {
        Serializer::new(self.schema, self.config, fields)
            .with_cache(self.cache_policy(fields, cache_context))
    }

    fn count(&self, resource_type: &str, filters: &[Filter], context: &D::Context) -> Result<Option<usize>> {
        self.cancel.check()?;
        match self.store.count_primary(resource_type, filters, context) {
            Ok(count) => Ok(count),
            Err(AccessError::NotAuthorized) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Pagination links and record/page count meta of a collection.
    fn add_top_level(
        &self,
        document: &mut Document,
        resource_type: &str,
        request: &ParsedRequest,
        context: &D::Context,
    ) -> Result<()> {
        let config = self.config;
        let links_wanted = request.pagination.is_some() && config.top_level_links_include_pagination;
        let page_count_wanted = request.pagination.is_some() && config.top_level_meta_include_page_count;
        if !(links_wanted || page_count_wanted || config.top_level_meta_include_record_count) {
            return Ok(());
        }

        let count = self.count(resource_type, &request.filters, context)?;
        debug!(resource_type, count = ?count, "counted primary records");

        if let Some(count) = count {
            if config.top_level_meta_include_record_count {
                document.meta.insert(
                    config.json_key_format.format(&config.top_level_meta_record_count_key),
                    Value::from(count),
                );
            }
            if page_count_wanted && let Some(pagination) = request.pagination {
                document.meta.insert(
                    config.json_key_format.format(&config.top_level_meta_page_count_key),
                    Value::from(page_count(count, pagination.limit)),
                );
            }
        }

        if links_wanted && let Some(pagination) = request.pagination {
            let returned = document.primary_resources().len();
            let base = format!(
                "{}/{}",
                config.base_url,
                config.route_format.format(resource_type)
            );
            for (name, page) in pagination_links(config.default_paginator, pagination, returned, count) {
                document.links.insert(name.to_string(), page_link(&base, &page));
            }
        }
        Ok(())
    }
}

fn record_not_found(resource_type: &str, id: &str) -> Error {
    Error::RecordNotFound {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
    }
}

fn page_count(count: usize, limit: usize) -> usize {
    count.div_ceil(limit.max(1))
}

fn page_link(base: &str, page: &BTreeMap<&'static str, usize>) -> String {
    let query: Vec<String> = page
        .iter()
        .map(|(key, value)| format!("page%5B{}%5D={}", key, value))
        .collect();
    format!("{}?{}", base, query.join("&"))
}

/// `first`/`prev`/`next`/`last` page parameters for the current page.
///
/// Without a known record count `last` is omitted and `next` is offered
/// whenever the current page came back full.
fn pagination_links(
    paginator: Paginator,
    current: Pagination,
    returned: usize,
    count: Option<usize>,
) -> Vec<(&'static str, BTreeMap<&'static str, usize>)> {
    let limit = current.limit.max(1);
    let has_next = match count {
        Some(count) => current.offset.saturating_add(limit) < count,
        None => returned >= limit,
    };
    let mut links = Vec::new();
    match paginator {
        Paginator::None => {}
        Paginator::Paged { .. } => {
            let page = |number: usize| BTreeMap::from([("number", number), ("size", limit)]);
            let number = (current.offset / limit).saturating_add(1);
            links.push(("first", page(1)));
            if number > 1 {
                links.push(("prev", page(number - 1)));
            }
            if has_next {
                links.push(("next", page(number.saturating_add(1))));
            }
            if let Some(count) = count {
                links.push(("last", page(page_count(count, limit).max(1))));
            }
        }
        Paginator::Offset { .. } => {
            let page = |offset: usize| BTreeMap::from([("limit", limit), ("offset", offset)]);
            links.push(("first", page(0)));
            if current.offset > 0 {
                links.push(("prev", page(current.offset.saturating_sub(limit))));
            }
            if has_next {
                links.push(("next", page(current.offset.saturating_add(limit))));
            }
            if let Some(count) = count {
                let last = count.saturating_sub(1) / limit * limit;
                links.push(("last", page(last)));
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryFragmentCache;
    use crate::document::PrimaryData;
    use crate::key_format::KeyFormat;
    use crate::memory::MemoryContext;
    use crate::test_support::{blog_schema, blog_store};
    use std::collections::BTreeSet;

    fn rid(t: &str, id: &str) -> ResourceIdentity {
        ResourceIdentity::new(t, id)
    }

    /// Every linkage identity is primary data or included.
    fn assert_no_dangling_linkage(doc: &Document) {
        let present: BTreeSet<ResourceIdentity> = doc
            .primary_resources()
            .into_iter()
            .map(|r| r.identity())
            .chain(doc.included_identities())
            .collect();
        for resource in doc.primary_resources().into_iter().chain(doc.included.iter()) {
            for (name, rel) in &resource.relationships {
                for target in rel.data.iter().flat_map(|d| d.identities()) {
                    assert!(
                        present.contains(target),
                        "{} -> {} ({}) dangles",
                        resource.identity(),
                        target,
                        name
                    );
                }
            }
        }
    }

    fn assert_unique_included(doc: &Document) {
        let ids = doc.included_identities();
        let unique: BTreeSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len());
    }

    #[test]
    fn test_find_with_nested_includes() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let params = RequestParams::new().with_include("comments.author,author,tags");
        let doc = processor.find("posts", &params, &MemoryContext::default()).unwrap();

        assert_eq!(doc.primary_resources().len(), 3);
        assert_unique_included(&doc);
        assert_no_dangling_linkage(&doc);
        let included = doc.included_identities();
        assert!(included.contains(&rid("people", "1003")));
        assert!(included.contains(&rid("people", "1004")));
        assert!(included.contains(&rid("tags", "6")));
        // 3 names at depth 1 plus comments.author at depth 2
        assert_eq!(store.calls().find_related, 4);
        // posts, comments, people, tags
        assert_eq!(store.calls().find_resources, 4);
    }

    #[test]
    fn test_invalid_include_fails_before_data_access() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let params = RequestParams::new().with_include("comments.writer");
        let err = processor.find("posts", &params, &MemoryContext::default()).unwrap_err();
        assert_eq!(err.to_string(), "writer is not a valid relationship of comments");
        assert_eq!(store.calls(), crate::memory::CallStats::default());
    }

    #[test]
    fn test_show_and_record_not_found() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let doc = processor
            .show("posts", "12", &RequestParams::new().with_include("author"), &MemoryContext::default())
            .unwrap();
        assert!(matches!(&doc.data, PrimaryData::One(Some(post)) if post.id == "12"));
        assert_eq!(doc.included_identities(), vec![rid("people", "1003")]);

        let err = processor
            .show("posts", "99", &RequestParams::new(), &MemoryContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { .. }));
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_denied_primary_is_not_found() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let context = MemoryContext::denying([rid("posts", "10")]);
        assert!(matches!(
            processor.show("posts", "10", &RequestParams::new(), &context),
            Err(Error::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_authorization_omits_included_resource() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let context = MemoryContext::denying([rid("people", "1004")]);
        let doc = processor
            .find("comments", &RequestParams::new().with_include("author"), &context)
            .unwrap();
        assert_eq!(doc.primary_resources().len(), 3);
        assert_eq!(doc.included_identities(), vec![rid("people", "1003")]);
        assert_no_dangling_linkage(&doc);
        let comment_101 = doc
            .primary_resources()
            .into_iter()
            .find(|c| c.id == "101")
            .unwrap();
        assert_eq!(
            comment_101.relationships["author"].data,
            Some(crate::document::ResourceLinkage::One(None))
        );
    }

    #[test]
    fn test_polymorphic_narrowed_include() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let params = RequestParams::new().with_include("imageable#documents");
        let doc = processor.find("pictures", &params, &MemoryContext::default()).unwrap();
        assert_eq!(
            doc.included_identities(),
            vec![rid("documents", "1"), rid("documents", "2")]
        );
        assert_no_dangling_linkage(&doc);
    }

    #[test]
    fn test_show_related_to_many_and_to_one() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let ctx = MemoryContext::default();

        let doc = processor
            .show_related("posts", "10", "comments", &RequestParams::new().with_include("author"), &ctx)
            .unwrap();
        let ids: Vec<String> = doc.primary_resources().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["100", "101"]);
        assert_eq!(doc.included.len(), 2);
        assert_eq!(doc.links["self"], "/posts/10/comments");

        let doc = processor
            .show_related("posts", "15", "author", &RequestParams::new(), &ctx)
            .unwrap();
        assert!(matches!(&doc.data, PrimaryData::One(Some(p)) if p.id == "1004"));

        let doc = processor
            .show_related("pictures", "2", "imageable", &RequestParams::new(), &ctx)
            .unwrap();
        assert!(matches!(&doc.data, PrimaryData::One(Some(p)) if p.resource_type == "products"));
    }

    #[test]
    fn test_show_related_errors() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let ctx = MemoryContext::default();
        assert!(matches!(
            processor.show_related("posts", "10", "writers", &RequestParams::new(), &ctx),
            Err(Error::InvalidRelationship { .. })
        ));
        assert!(matches!(
            processor.show_related("posts", "99", "comments", &RequestParams::new(), &ctx),
            Err(Error::RecordNotFound { .. })
        ));
        assert!(matches!(
            processor.show_related(
                "pictures",
                "1",
                "imageable",
                &RequestParams::new().with_include("pictures"),
                &ctx
            ),
            Err(Error::InvalidRelationship { .. })
        ));
    }

    #[test]
    fn test_show_relationship_linkage() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let doc = processor
            .show_relationship("posts", "12", "tags", &MemoryContext::default())
            .unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value["data"],
            serde_json::json!([{"type": "tags", "id": "5"}, {"type": "tags", "id": "6"}])
        );
        assert_eq!(value["links"]["self"], "/posts/12/relationships/tags");
        assert!(value.get("included").is_none());
    }

    #[test]
    fn test_pagination_links_and_meta() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration {
            top_level_meta_include_record_count: true,
            top_level_meta_include_page_count: true,
            ..Configuration::default().with_paginator(Paginator::Paged {
                default_size: 2,
                max_size: 10,
            })
        };
        let processor = Processor::new(&schema, &store, &config);
        let doc = processor
            .find("posts", &RequestParams::new(), &MemoryContext::default())
            .unwrap();
        assert_eq!(doc.primary_resources().len(), 2);
        assert_eq!(doc.meta["record-count"], 3);
        assert_eq!(doc.meta["page-count"], 2);
        assert_eq!(doc.links["first"], "/posts?page%5Bnumber%5D=1&page%5Bsize%5D=2");
        assert_eq!(doc.links["next"], "/posts?page%5Bnumber%5D=2&page%5Bsize%5D=2");
        assert_eq!(doc.links["last"], "/posts?page%5Bnumber%5D=2&page%5Bsize%5D=2");
        assert!(!doc.links.contains_key("prev"));
    }

    #[test]
    fn test_offset_pagination_links() {
        let links = pagination_links(
            Paginator::Offset {
                default_limit: 2,
                max_limit: 10,
            },
            Pagination { offset: 2, limit: 2 },
            1,
            Some(3),
        );
        let names: Vec<&str> = links.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["first", "prev", "last"]);
        assert_eq!(page_link("/posts", &links[2].1), "/posts?page%5Blimit%5D=2&page%5Boffset%5D=2");
    }

    #[test]
    fn test_huge_page_values_do_not_overflow() {
        let schema = blog_schema();
        let store = blog_store();
        let max = usize::MAX.to_string();
        let ctx = MemoryContext::default();

        let config = Configuration::default().with_paginator(Paginator::Paged {
            default_size: 2,
            max_size: 10,
        });
        let processor = Processor::new(&schema, &store, &config);
        let doc = processor
            .find("posts", &RequestParams::new().with_page("number", max.as_str()), &ctx)
            .unwrap();
        assert!(doc.primary_resources().is_empty());
        assert!(!doc.links.contains_key("next"));
        assert!(doc.links.contains_key("prev"));

        let config = Configuration::default().with_paginator(Paginator::Offset {
            default_limit: 2,
            max_limit: 10,
        });
        let processor = Processor::new(&schema, &store, &config);
        let doc = processor
            .find("posts", &RequestParams::new().with_page("offset", max.as_str()), &ctx)
            .unwrap();
        assert!(doc.primary_resources().is_empty());
        assert!(!doc.links.contains_key("next"));
        assert_eq!(doc.links["last"], "/posts?page%5Blimit%5D=2&page%5Boffset%5D=2");
    }

    #[test]
    fn test_next_link_without_count_at_max_offset() {
        let links = pagination_links(
            Paginator::Offset {
                default_limit: 2,
                max_limit: 10,
            },
            Pagination {
                offset: usize::MAX,
                limit: 2,
            },
            2,
            None,
        );
        let next = links.iter().find(|(n, _)| *n == "next").unwrap();
        assert_eq!(next.1["offset"], usize::MAX);
    }

    #[test]
    fn test_camelized_document() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default().with_key_format(KeyFormat::Camelized);
        let processor = Processor::new(&schema, &store, &config);
        let params = RequestParams::new()
            .with_include("favoritePost")
            .with_fields("people", "name,favoritePost");
        let doc = processor
            .show("people", "1003", &params, &MemoryContext::default())
            .unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["data"]["attributes"], serde_json::json!({"name": "Joe Author"}));
        assert_eq!(value["data"]["relationships"]["favoritePost"]["data"]["id"], "10");
        assert_eq!(value["included"][0]["type"], "posts");
    }

    #[test]
    fn test_second_request_served_from_cache() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration {
            resource_cache: true,
            ..Configuration::default()
        };
        let cache = MemoryFragmentCache::new();
        let processor = Processor::new(&schema, &store, &config).with_cache(&cache);
        let ctx = MemoryContext::default();

        let first = processor.find("people", &RequestParams::new(), &ctx).unwrap();
        assert_eq!(cache.len(), 2);
        store.reset_calls();
        let second = processor.find("people", &RequestParams::new(), &ctx).unwrap();
        assert_eq!(store.calls().find_resources, 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_shared_cache_respects_link_settings() {
        let schema = blog_schema();
        let store = blog_store();
        let cache = MemoryFragmentCache::new();
        let ctx = MemoryContext::default();
        let config_a = Configuration {
            resource_cache: true,
            base_url: "https://a.example".to_string(),
            ..Configuration::default()
        };
        let config_b = Configuration {
            base_url: "https://b.example".to_string(),
            ..config_a.clone()
        };

        let self_link = |config: &Configuration| {
            let doc = Processor::new(&schema, &store, config)
                .with_cache(&cache)
                .show("people", "1003", &RequestParams::new(), &ctx)
                .unwrap();
            match doc.data {
                PrimaryData::One(Some(person)) => person.links["self"].clone(),
                other => panic!("unexpected data {:?}", other),
            }
        };
        assert_eq!(self_link(&config_a), "https://a.example/people/1003");
        assert_eq!(self_link(&config_b), "https://b.example/people/1003");
        assert_eq!(self_link(&config_a), "https://a.example/people/1003");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_ignored_when_disabled() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let cache = MemoryFragmentCache::new();
        let processor = Processor::new(&schema, &store, &config).with_cache(&cache);
        processor
            .find("people", &RequestParams::new(), &MemoryContext::default())
            .unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_canceled_request() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let cancel = CancellationToken::new();
        let processor = Processor::new(&schema, &store, &config).with_cancellation(cancel.clone());
        cancel.cancel();
        let err = processor
            .find("posts", &RequestParams::new().with_include("author"), &MemoryContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::Canceled));
        assert_eq!(err.to_document().errors[0].status, "499");
    }

    #[test]
    fn test_repeated_requests_are_identical() {
        let schema = blog_schema();
        let store = blog_store();
        let config = Configuration::default();
        let processor = Processor::new(&schema, &store, &config);
        let params = RequestParams::new().with_include("author.comments.post,tags.posts");
        let ctx = MemoryContext::default();
        let a = processor.find("posts", &params, &ctx).unwrap();
        let b = processor.find("posts", &params, &ctx).unwrap();
        assert_eq!(a, b);
        assert_unique_included(&a);
        assert_no_dangling_linkage(&a);
    }
}
