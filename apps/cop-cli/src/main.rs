use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::{BannerArgs, CatalogArgs, ClassifyArgs, ConfigCmd, EvaluateArgs};

#[derive(Parser)]
#[command(name = "cop-cli", version, about = "Common operating picture entitlement tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which codec each ciphertext file would be decrypted with
    Classify(ClassifyArgs),
    /// Check decrypted objects and notes against a set of entitlements
    Evaluate(EvaluateArgs),
    /// Print the classification banner for a set of decrypted objects
    Banner(BannerArgs),
    /// Build the attribute catalog from a policy definition
    Catalog(CatalogArgs),
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let res = match cli.command {
        Commands::Classify(args) => commands::classify::run(args),
        Commands::Evaluate(args) => commands::evaluate::run_evaluate(args),
        Commands::Banner(args) => commands::evaluate::run_banner(args),
        Commands::Catalog(args) => commands::catalog::run(args),
        Commands::Config { cmd } => commands::config::run(cmd),
    };
    if let Err(e) = res {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
