//! Error types for request blocks, provider configuration and server rendering.

use reqblock_data::FetchError;
use thiserror::Error;

/// Errors a request block reports through `on_error` and its state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// The block was created without a request block context.
    #[error("No request block context available")]
    MissingContext,

    /// The block has an empty url.
    #[error("Request block url is not set")]
    MissingUrl,

    /// The request itself failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Errors loading a provider configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid TOML.
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Failed to render TOML.
    #[error("Failed to write TOML config: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// Invalid JSON.
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the server-render loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SsrError {
    /// New observables were still being registered after the last pass.
    #[error("Render did not settle within {0} passes")]
    PassLimit(usize),
}
