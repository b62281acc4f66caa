use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use cop_core::classify;
use serde_json::json;

use super::util::print_json;

#[derive(Args)]
pub struct ClassifyArgs {
    /// Ciphertext files to inspect
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Emit JSON instead of `path<TAB>codec` lines
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ClassifyArgs) -> Result<()> {
    let mut rows = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let codec = classify(&bytes);
        tracing::debug!(path = %path.display(), %codec, "classified");
        if args.json {
            rows.push(json!({
                "path": path.display().to_string(),
                "codec": codec.as_str(),
                "bytes": bytes.len(),
            }));
        } else {
            println!("{}\t{}", path.display(), codec);
        }
    }
    if args.json {
        print_json(&rows, false)?;
    }
    Ok(())
}
