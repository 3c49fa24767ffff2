mod cmd_includes;
mod cmd_resolve;
mod cmd_validate;
mod fixture;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jsonapi")]
#[command(about = "Resolve JSON:API requests against a fixture store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a request and print the resulting document
    Resolve {
        #[command(flatten)]
        args: cmd_resolve::ResolveArgs,
    },
    /// Print the merged include tree for an include parameter
    Includes {
        /// Fixture store file
        #[arg(short, long)]
        store: PathBuf,

        /// Primary resource type
        #[arg(short = 't', long = "type")]
        resource_type: String,

        /// Comma separated include paths
        #[arg(long)]
        include: String,
    },
    /// Validate a fixture store's schema and records
    Validate {
        /// Fixture store file
        #[arg(short, long)]
        store: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { args } => cmd_resolve::run(args, cli.pretty),
        Commands::Includes {
            store,
            resource_type,
            include,
        } => cmd_includes::run(store, resource_type, include, cli.pretty),
        Commands::Validate { store } => cmd_validate::run(store),
    }
}
