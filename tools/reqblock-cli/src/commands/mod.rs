//! CLI command implementations.

pub mod config;
pub mod fetch;
pub mod fingerprint;
pub mod inspect;

use clap::{Args, Subcommand};

/// Arguments for the fingerprint command.
#[derive(Args)]
pub struct FingerprintArgs {
    /// Request location.
    pub url: String,

    /// Request options as JSON.
    #[arg(short, long)]
    pub options: Option<String>,

    /// Context options as JSON (defaults to the configured provider options).
    #[arg(long)]
    pub context_options: Option<String>,

    /// Ignore context options.
    #[arg(long)]
    pub ignore_context: bool,
}

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Serialized cache snapshot file.
    pub file: String,
}

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// Request locations.
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Request options as JSON, applied to every url.
    #[arg(short, long)]
    pub options: Option<String>,

    /// Origin for locations without a scheme (overrides config).
    #[arg(long)]
    pub origin: Option<String>,

    /// Write the snapshot to a file instead of stdout.
    #[arg(long)]
    pub out: Option<String>,

    /// Escape the snapshot for embedding in HTML.
    #[arg(long)]
    pub html: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Write a default reqblock.toml
    Init {
        /// Overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Parse a JSON command-line argument.
pub fn parse_json_arg(name: &str, value: Option<&str>) -> anyhow::Result<Option<serde_json::Value>> {
    use anyhow::Context as _;

    value
        .map(|text| serde_json::from_str(text).with_context(|| format!("Invalid JSON for --{}", name)))
        .transpose()
}
