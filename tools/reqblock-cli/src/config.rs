//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use reqblock_fetch::ProviderConfig;
use serde::{Deserialize, Serialize};

/// Config file names searched from the working directory upward.
pub const CONFIG_NAMES: [&str; 3] = ["reqblock.toml", ".reqblock.toml", "reqblock.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Request block provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content, is_json(path))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse config text.
    pub fn parse(content: &str, json: bool) -> Result<Self> {
        if json {
            serde_json::from_str(content).context("Invalid JSON config")
        } else {
            toml::from_str(content).context("Invalid TOML config")
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Generate a default reqblock.toml config file.
pub fn generate_default_config() -> String {
    r#"# Request block provider configuration

[provider]
# Prefix for urls without a scheme.
# origin = "https://api.example.com"

# Build a server-mode cache (no in-flight placeholders).
ssr_mode = true

# Render pass budget for the server fixed-point loop.
max_render_passes = 10

# Default request options merged under every block's own.
# [provider.options.headers]
# accept = "application/json"
"#
    .to_string()
}
