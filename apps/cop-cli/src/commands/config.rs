use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use cop_core::{config_schema_json, load_config, load_effective_config, write_schema_file};

use super::util::print_json;

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Print the configuration JSON schema, or write it to a file
    Schema {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a config file and print the effective configuration
    Check {
        /// Config file; defaults to COP_CONFIG or configs/default.toml
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
}

pub fn run(cmd: ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Schema { out: Some(path) } => {
            write_schema_file(&path)?;
            println!("wrote {}", path.display());
            Ok(())
        }
        ConfigCmd::Schema { out: None } => print_json(&config_schema_json()?, true),
        ConfigCmd::Check { path, pretty } => {
            let cfg = match path {
                Some(p) => load_config(p)?,
                None => load_effective_config()?,
            };
            print_json(&cfg, pretty)
        }
    }
}
