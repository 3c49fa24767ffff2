use anyhow::{Context, Result, bail};
use jsonapi_graph::v1::{Configuration, MemoryStore, StoreFile};
use serde::Serialize;
use std::path::Path;

pub fn read_store_file(path: &Path) -> Result<StoreFile> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    StoreFile::from_json(&content).with_context(|| format!("Failed to parse {:?}", path))
}

pub fn read_store(path: &Path) -> Result<(Configuration, MemoryStore)> {
    read_store_file(path)?
        .into_store()
        .with_context(|| format!("Invalid store {:?}", path))
}

/// Split `key=value`.
pub fn parse_pair(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("Expected key=value, got {:?}", raw),
    }
}

pub fn print_json(value: &impl Serialize, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const BLOG_STORE: &str = r#"{
        "configuration": {"json_key_format": "dasherized"},
        "resources": [
            {"type": "people", "attributes": ["name", "updated_at"],
             "relationships": [
                {"name": "posts", "cardinality": "to_many", "target_types": ["posts"]}]},
            {"type": "posts", "attributes": ["title"], "filters": ["title"],
             "relationships": [
                {"name": "author", "cardinality": "to_one", "target_types": ["people"]},
                {"name": "comments", "cardinality": "to_many", "target_types": ["comments"]}]},
            {"type": "comments", "attributes": ["body"],
             "relationships": [
                {"name": "author", "cardinality": "to_one", "target_types": ["people"]}]}
        ],
        "records": {
            "people": [
                {"id": "1003", "attributes": {"name": "Joe", "updated_at": "2026-01-01"},
                 "relationships": {"posts": [{"type": "posts", "id": "10"}, {"type": "posts", "id": "12"}]}}
            ],
            "posts": [
                {"id": "10", "attributes": {"title": "First"},
                 "relationships": {"author": {"type": "people", "id": "1003"},
                                   "comments": [{"type": "comments", "id": "100"}]}},
                {"id": "12", "attributes": {"title": "Second"},
                 "relationships": {"author": {"type": "people", "id": "1003"}}}
            ],
            "comments": [
                {"id": "100", "attributes": {"body": "Nice"},
                 "relationships": {"author": {"type": "people", "id": "1003"}}}
            ]
        }
    }"#;

    pub(crate) fn write_temp_store(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{}", content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("title=Hello").unwrap(),
            ("title".to_string(), "Hello".to_string())
        );
        assert_eq!(parse_pair("a=b=c").unwrap().1, "b=c");
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn test_read_store() {
        let f = write_temp_store(BLOG_STORE);
        let (config, store) = read_store(f.path()).unwrap();
        assert_eq!(config.json_key_format.name(), "dasherized");
        assert!(store.schema().resource("posts").is_some());
    }

    #[test]
    fn test_read_store_missing_file() {
        assert!(read_store(Path::new("/nonexistent/store.json")).is_err());
    }

    #[test]
    fn test_read_store_invalid_schema() {
        let f = write_temp_store(
            r#"{"resources": [{"type": "posts", "relationships": [
                {"name": "author", "cardinality": "to_one", "target_types": ["people"]}]}]}"#,
        );
        let err = read_store(f.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("people is not a valid resource"));
    }
}
