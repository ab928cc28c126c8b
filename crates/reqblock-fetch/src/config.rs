//! Provider configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ConfigError;

/// Default upper bound on server render passes.
pub const DEFAULT_MAX_RENDER_PASSES: usize = 10;

/// Settings a [`RequestBlockProvider`](crate::RequestBlockProvider) can be
/// built from.
///
/// ```toml
/// origin = "https://api.example.com"
/// ssr_mode = true
///
/// [options.headers]
/// accept = "application/json"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Prefix for locations without a scheme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Build a server-mode cache (no in-flight placeholders).
    pub ssr_mode: bool,
    /// Render pass budget for the server fixed-point loop.
    pub max_render_passes: usize,
    /// Default options merged under every block's own options.
    ///
    /// Kept last: TOML tables must follow plain values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<JsonValue>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            origin: None,
            options: None,
            ssr_mode: false,
            max_render_passes: DEFAULT_MAX_RENDER_PASSES,
        }
    }
}

impl ProviderConfig {
    /// Parse from TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse from JSON.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the default options.
    pub fn with_options(mut self, options: JsonValue) -> Self {
        self.options = Some(options);
        self
    }

    /// Enable server mode.
    pub fn server(mut self) -> Self {
        self.ssr_mode = true;
        self
    }
}
