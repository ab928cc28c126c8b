//! Deduplicated, hydration-safe request blocks.
//!
//! This crate provides:
//! - `RequestBlock` - One consumer's fetch lifecycle with cache adoption and dedup
//! - `RequestBlockProvider` - Builds the `RequestBlockContext` blocks share
//! - `ProviderConfig` - Provider settings loadable from TOML or JSON
//! - `SsrRegistry` / `RenderPromises` - Server-render registration protocol
//! - `render_to_fixed_point` - Renders until every registered request settled
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reqblock_fetch::prelude::*;
//!
//! let context = RequestBlockProvider::new(Arc::new(fetcher))
//!     .with_origin("https://api.example.com")
//!     .build();
//!
//! let mut block: RequestBlock = RequestBlock::new(
//!     BlockParams::new("/products/123"),
//!     BlockHooks::default(),
//!     Some(context),
//! );
//! block.activate().await;
//! let product = block.state().data.clone();
//! ```

mod block;
mod config;
mod context;
mod error;
mod ssr;

pub use block::{BlockHooks, BlockParams, Callback, ConsumerState, Parser, Phase, RequestBlock};
pub use config::{ProviderConfig, DEFAULT_MAX_RENDER_PASSES};
pub use context::{RequestBlockContext, RequestBlockProvider};
pub use error::{BlockError, ConfigError, SsrError};
pub use ssr::{render_to_fixed_point, InstanceId, InstanceInfo, RenderPromises, RenderSlot, SsrRegistry};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BlockError, BlockHooks, BlockParams, ConsumerState, Phase, ProviderConfig, RenderSlot,
        RequestBlock, RequestBlockContext, RequestBlockProvider,
    };
    pub use reqblock_cache::CacheStore;
    pub use reqblock_data::{Fetcher, StaticFetcher};
}
