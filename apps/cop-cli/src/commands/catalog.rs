use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use cop_core::{AttributeCatalog, AttributeCategory, PolicyDefinition};
use serde_json::json;

use super::util::{print_json, read_json};

#[derive(Args)]
pub struct CatalogArgs {
    /// Policy definition JSON (`{"namespace": ..., "attributes": [...]}`)
    #[arg(long)]
    pub definition: PathBuf,
    /// Pretty-print JSON
    #[arg(long)]
    pub pretty: bool,
}

pub fn run(args: CatalogArgs) -> Result<()> {
    let def: PolicyDefinition = read_json(&args.definition)?;
    let catalog = AttributeCatalog::from_definition(&def);
    let mut out = serde_json::Map::new();
    for category in AttributeCategory::ALL {
        let entries: Vec<_> = catalog
            .entries(category)
            .iter()
            .map(|e| json!({"label": e.label, "fqn": e.value.as_str(), "group": e.group}))
            .collect();
        out.insert(category.as_str().to_string(), entries.into());
    }
    let levels: Vec<&str> = catalog
        .classification_levels()
        .iter()
        .map(|l| l.as_str())
        .collect();
    out.insert("levels".into(), json!(levels));
    print_json(&out, args.pretty)
}
