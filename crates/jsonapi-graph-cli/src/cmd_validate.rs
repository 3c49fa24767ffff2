use crate::fixture::read_store_file;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn run(store: PathBuf) -> Result<()> {
    let file = read_store_file(&store)?;
    let types = file.resources.types().count();
    let records: usize = file.records.values().map(Vec::len).sum();
    file.into_store()
        .with_context(|| format!("Invalid store {:?}", store))?;
    println!("Valid: {} resource types, {} records", types, records);
    Ok(())
}
