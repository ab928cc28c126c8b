//! Network capability for request blocks.
//!
//! This crate provides:
//! - `Fetcher` - The `perform_request(url, options)` capability
//! - `Response` - A completed response that decodes into a value graph
//! - `FetchError` - Request and decode failures
//! - `StaticFetcher` - In-memory fetcher for tests and fixtures
//! - `ReqwestFetcher` - HTTP fetcher (feature `reqwest`)
//! - `resolve_url` - Origin prefixing for relative locations
//!
//! # Example
//!
//! ```rust,ignore
//! use reqblock_data::{Fetcher, StaticFetcher};
//! use serde_json::json;
//!
//! let fetcher = StaticFetcher::new()
//!     .with_json("https://api.example.com/products/123", json!({"id": "123"}));
//!
//! let response = fetcher
//!     .perform_request("https://api.example.com/products/123", None)
//!     .await?;
//! let graph = response.graph()?;
//! ```

mod error;
mod fetcher;
#[cfg(feature = "reqwest")]
mod http;
mod response;
mod url;

pub use error::FetchError;
pub use fetcher::{Fetcher, StaticFetcher};
#[cfg(feature = "reqwest")]
pub use http::ReqwestFetcher;
pub use response::Response;
pub use url::{has_origin, resolve_url};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{FetchError, Fetcher, Response, StaticFetcher};
}
