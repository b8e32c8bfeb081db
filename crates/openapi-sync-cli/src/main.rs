mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_CONFIG_FILE, DEFAULT_LOGO};

#[derive(Parser)]
#[command(name = "openapi-sync")]
#[command(version, about = "Fetch, cache, and combine remote OpenAPI specs")]
struct Cli {
    /// Log debug output (RUST_LOG overrides this)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh every configured spec, then write the combined document
    Sync {
        /// Path to the config file
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Stop after syncing; do not combine
        #[arg(long)]
        no_combine: bool,
    },
    /// Rebuild the combined document from the existing cache
    Combine {
        /// Path to the config file
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Download a single spec without a config file
    Fetch {
        /// URL (or local path) of the spec
        #[arg(long)]
        url: String,
        /// Where to store the downloaded spec
        #[arg(long)]
        dest: PathBuf,
        /// Also write a combined document here
        #[arg(long)]
        combined_schema_file: Option<PathBuf>,
        /// Inject a logo into the spec's `info` block when combining
        #[arg(long)]
        apply_patch_workarounds: bool,
        /// Logo reference used by --apply-patch-workarounds
        #[arg(long, default_value = DEFAULT_LOGO)]
        logo: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Sync { config, no_combine } => commands::sync::run(&config, no_combine).await,
        Command::Combine { config } => commands::combine::run(&config),
        Command::Fetch {
            url,
            dest,
            combined_schema_file,
            apply_patch_workarounds,
            logo,
        } => {
            let logo = apply_patch_workarounds.then_some(logo);
            commands::fetch::run(&url, &dest, combined_schema_file.as_deref(), logo).await
        }
    }
}
