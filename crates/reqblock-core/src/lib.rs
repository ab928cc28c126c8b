//! Core abstractions for request blocks.
//!
//! This crate provides the leaf types every other crate builds on:
//! - `Graph` - Structured values with shared and circular references
//! - `codec` - Reference-tracking transport format for graphs
//! - `Fingerprint` - Deterministic request keys
//! - `deep_merge` - Option merging for ambient and per-request options
//!
//! # Example
//!
//! ```ignore
//! use reqblock_core::{codec, fingerprint, Ambient, Graph, Value};
//!
//! let mut graph = Graph::new();
//! let node = graph.add_object();
//! graph.insert(node, "self", Value::Ref(node))?;
//! graph.set_root(Value::Ref(node))?;
//!
//! let text = codec::encode(&graph)?;
//! assert_eq!(codec::decode(&text)?, graph);
//!
//! let key = fingerprint("/products", None, Ambient::Present(None), false);
//! ```

pub mod codec;
mod error;
mod fingerprint;
mod graph;
mod merge;

pub use error::*;
pub use fingerprint::*;
pub use graph::*;
pub use merge::*;
