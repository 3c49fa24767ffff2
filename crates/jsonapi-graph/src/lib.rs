#![doc = include_str!("../README.md")]

mod access;
mod cache;
mod cancel;
mod config;
mod document;
mod error;
mod fragment;
mod id_tree;
mod identity;
mod include;
mod key_format;
mod memory;
mod path;
mod processor;
mod request;
mod resource_set;
mod schema;
mod serializer;

#[cfg(test)]
mod test_support;

pub mod v1 {
    //! Versioned public API for resolving JSON:API read requests.
    //!
    //! Everything you need is re-exported from this module. Types are organized
    //! into five groups:
    //!
    //! # Schema and configuration
    //!
    //! Built once at startup and shared by every request:
    //!
    //! - [`Schema`], [`ResourceDef`], [`RelationshipDef`], [`Cardinality`]
    //! - [`Configuration`], [`Paginator`]
    //! - [`KeyFormat`], [`KeyFormatter`] for wire names
    //!
    //! # Request parsing
    //!
    //! - [`RequestParams`] as received, [`ParsedRequest`] once validated
    //! - [`Path`], [`PathSegment`] for dotted relationship/field paths
    //! - [`IncludeDirectives`], [`IncludeNode`] for the merged include tree
    //!
    //! # Resolution
    //!
    //! - [`Processor`] drives a whole request
    //! - [`IdTreeResolver`], [`PrimaryResourceIdTree`], [`RelatedResourceIdTree`]
    //!   resolve identities level by level
    //! - [`ResourceSet`] loads each identity once
    //! - [`Serializer`] renders the [`Document`]
    //!
    //! # Data access
    //!
    //! - [`DataAccess`] is the storage seam; [`MemoryStore`] implements it
    //!   over fixture records
    //! - [`FragmentCache`], [`MemoryFragmentCache`] for cached fragments
    //! - [`CancellationToken`] to abort resolution between calls
    //!
    //! # Errors
    //!
    //! - [`Error`] maps onto JSON:API error objects via
    //!   [`Error::to_document`]
    //!
    //! # Example: include the author of every post
    //!
    //! ```
    //! use jsonapi_graph::v1::*;
    //!
    //! let schema = Schema::new()
    //!     .with(ResourceDef::new("people").attribute("name"))
    //!     .with(
    //!         ResourceDef::new("posts")
    //!             .attribute("title")
    //!             .has_one("author", "people"),
    //!     );
    //! let store = MemoryStore::new(schema.clone())
    //!     .with("people", StoredRecord::new("1003").attr("name", "Joe"))
    //!     .with("posts", StoredRecord::new("10").attr("title", "A").to_one("author", "people", "1003"))
    //!     .with("posts", StoredRecord::new("12").attr("title", "B").to_one("author", "people", "1003"));
    //! let config = Configuration::default();
    //!
    //! let doc = Processor::new(&schema, &store, &config)
    //!     .find("posts", &RequestParams::new().with_include("author"), &MemoryContext::default())
    //!     .unwrap();
    //!
    //! assert_eq!(doc.primary_resources().len(), 2);
    //! assert_eq!(doc.included_identities(), vec![ResourceIdentity::new("people", "1003")]);
    //! assert_eq!(store.calls().find_related, 1);
    //! ```
    pub use crate::access::{
        AccessError, DataAccess, FetchedFragment, LinkagePlan, PrimaryQuery, RelatedFragment,
        RelatedQuery, ResourceRecord,
    };
    pub use crate::cache::{CacheKey, CachePolicy, CachedFragment, FragmentCache, MemoryFragmentCache};
    pub use crate::cancel::CancellationToken;
    pub use crate::config::{Configuration, Paginator};
    pub use crate::document::{
        Document, ErrorDocument, ErrorObject, ErrorSource, PrimaryData, RelationshipObject,
        ResourceLinkage, ResourceObject,
    };
    pub use crate::error::{Error, Result, codes};
    pub use crate::fragment::ResourceFragment;
    pub use crate::id_tree::{
        IdTreeResolver, PrimaryResourceIdTree, RelatedResourceIdTree, ResourceIdTree,
    };
    pub use crate::identity::ResourceIdentity;
    pub use crate::include::{IncludeDirectives, IncludeNode};
    pub use crate::key_format::{KeyFormat, KeyFormatter};
    pub use crate::memory::{CallStats, MemoryContext, MemoryStore, StoreFile, StoredRecord};
    pub use crate::path::{FieldSegment, ParseOptions, Path, PathSegment, RelationshipSegment};
    pub use crate::processor::Processor;
    pub use crate::request::{
        FieldPath, Filter, Pagination, ParsedRequest, RequestParams, SortCriterion,
        SortDirection, SparseFields, parse_sort,
    };
    pub use crate::resource_set::{
        PopulatedResource, RelatedRef, ResolvedResource, ResourceSet, ResourceSource,
    };
    pub use crate::schema::{Cardinality, ID_FIELD, RelationshipDef, ResourceDef, Schema};
    pub use crate::serializer::Serializer;
}
