//! reqblock CLI - Inspect request fingerprints and cache snapshots.
//!
//! Commands:
//! - `reqblock fingerprint` - Compute the fingerprint of a request
//! - `reqblock inspect` - List the entries of a serialized cache snapshot
//! - `reqblock fetch` - Fetch urls through request blocks and emit the snapshot
//! - `reqblock config` - Manage configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConfigArgs, FetchArgs, FingerprintArgs, InspectArgs};

/// reqblock CLI - Deduplicated, hydration-safe request blocks
#[derive(Parser)]
#[command(name = "reqblock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the fingerprint of a request
    Fingerprint(FingerprintArgs),

    /// List the entries of a serialized cache snapshot
    Inspect(InspectArgs),

    /// Fetch urls through request blocks and emit the cache snapshot
    Fetch(FetchArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    // Execute command
    let result = match cli.command {
        Commands::Fingerprint(args) => commands::fingerprint::run(args, &ctx).await,
        Commands::Inspect(args) => commands::inspect::run(args, &ctx).await,
        Commands::Fetch(args) => commands::fetch::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
