//! Shared cache for request blocks.
//!
//! This crate provides:
//! - `CacheStore` - Fingerprint-keyed store shared by every block in a context
//! - `CacheEntry` - A settled value or an in-flight `Placeholder`
//! - `Placeholder` - A request future any number of consumers can await
//! - `Snapshot` - Sources a store can be restored from
//!
//! # Example
//!
//! ```rust,ignore
//! use reqblock_cache::CacheStore;
//!
//! let server = CacheStore::server();
//! // ... render, which fills the store ...
//! let payload = server.serialize_for_html()?;
//!
//! let client = CacheStore::from_snapshot(payload, false);
//! ```

mod entry;
mod snapshot;
mod store;

pub use entry::{CacheEntry, Placeholder, SharedResult};
pub use snapshot::Snapshot;
pub use store::CacheStore;
