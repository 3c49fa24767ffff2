use crate::fixture::{parse_pair, print_json, read_store};
use anyhow::{Context, Result, anyhow};
use clap::Args;
use jsonapi_graph::v1::{
    CancellationToken, MemoryContext, MemoryFragmentCache, Processor, RequestParams,
    ResourceIdentity,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Args, Debug, Default)]
pub struct ResolveArgs {
    /// Fixture store file
    #[arg(short, long)]
    pub store: PathBuf,

    /// Primary resource type
    #[arg(short = 't', long = "type")]
    pub resource_type: String,

    /// Resource id (show a single resource)
    #[arg(long)]
    pub id: Option<String>,

    /// Relationship of the resource given by --id
    #[arg(long, requires = "id")]
    pub relationship: Option<String>,

    /// Print bare linkage for --relationship instead of the related resources
    #[arg(long, requires = "relationship")]
    pub linkage: bool,

    /// Comma separated include paths
    #[arg(long)]
    pub include: Option<String>,

    /// Sparse fieldset, TYPE=field,field (repeatable)
    #[arg(long)]
    pub fields: Vec<String>,

    /// Sort criteria, e.g. -title,author.name
    #[arg(long)]
    pub sort: Option<String>,

    /// Filter, NAME=value,value (repeatable)
    #[arg(long)]
    pub filter: Vec<String>,

    /// Page parameter, KEY=value (repeatable)
    #[arg(long)]
    pub page: Vec<String>,

    /// Hide an identity from the request context, TYPE:ID (repeatable)
    #[arg(long)]
    pub deny: Vec<String>,

    /// Abort resolution after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

fn request_params(args: &ResolveArgs) -> Result<RequestParams> {
    let mut params = RequestParams::new();
    params.include = args.include.clone();
    params.sort = args.sort.clone();
    for raw in &args.fields {
        let (resource_type, fields) = parse_pair(raw)?;
        params.fields.insert(resource_type, fields);
    }
    for raw in &args.filter {
        let (name, value) = parse_pair(raw)?;
        params.filter.insert(name, value);
    }
    for raw in &args.page {
        let (key, value) = parse_pair(raw)?;
        params.page.insert(key, value);
    }
    Ok(params)
}

fn context(args: &ResolveArgs) -> Result<MemoryContext> {
    let denied = args
        .deny
        .iter()
        .map(|raw| {
            ResourceIdentity::parse(raw).ok_or_else(|| anyhow!("Expected TYPE:ID, got {:?}", raw))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(MemoryContext::denying(denied))
}

pub fn run(args: ResolveArgs, pretty: bool) -> Result<()> {
    let (config, store) = read_store(&args.store)?;
    let schema = store.schema().clone();
    let params = request_params(&args)?;
    let context = context(&args)?;

    let mut cancel = CancellationToken::new();
    if let Some(ms) = args.timeout_ms {
        cancel = cancel.with_timeout(Duration::from_millis(ms));
    }
    let cache = MemoryFragmentCache::new();
    let processor = Processor::new(&schema, &store, &config)
        .with_cache(&cache)
        .with_cancellation(cancel);

    let resource_type = args.resource_type.as_str();
    let result = match (&args.id, &args.relationship) {
        (None, _) => processor.find(resource_type, &params, &context),
        (Some(id), None) => processor.show(resource_type, id, &params, &context),
        (Some(id), Some(rel)) if args.linkage => {
            processor.show_relationship(resource_type, id, rel, &context)
        }
        (Some(id), Some(rel)) => processor.show_related(resource_type, id, rel, &params, &context),
    };
    debug!(calls = ?store.calls(), "resolved request");

    match result {
        Ok(document) => print_json(&document, pretty),
        Err(err) => {
            print_json(&err.to_document(), pretty)?;
            Err(err).context(format!("Failed to resolve {}", resource_type))
        }
    }
}
