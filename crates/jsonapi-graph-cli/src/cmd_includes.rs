use crate::fixture::{print_json, read_store};
use anyhow::{Context, Result};
use jsonapi_graph::v1::{IncludeDirectives, ParsedRequest, RequestParams};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct IncludeReport<'a> {
    tree: &'a IncludeDirectives,
    paths: Vec<String>,
}

fn parse_includes(store: &Path, resource_type: &str, include: &str) -> Result<IncludeDirectives> {
    let (config, store) = read_store(store)?;
    let params = RequestParams::new().with_include(include);
    let request = ParsedRequest::parse(store.schema(), resource_type, &params, &config)
        .with_context(|| format!("Invalid include for {}", resource_type))?;
    Ok(request.include)
}

pub fn run(store: PathBuf, resource_type: String, include: String, pretty: bool) -> Result<()> {
    let tree = parse_includes(&store, &resource_type, &include)?;
    let report = IncludeReport {
        paths: tree.paths(),
        tree: &tree,
    };
    print_json(&report, pretty)
}
