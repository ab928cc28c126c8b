//! Sources a cache store can be restored from.

use std::sync::Arc;

use reqblock_core::Graph;

use crate::CacheEntry;

/// Input accepted by [`CacheStore::restore`](crate::CacheStore::restore).
#[derive(Debug, Clone, Default)]
pub enum Snapshot {
    /// A string produced by [`CacheStore::serialize`](crate::CacheStore::serialize).
    Text(String),
    /// Already-decoded `[key, value]` pairs, adopted without reparsing.
    Pairs(Vec<(String, CacheEntry)>),
    /// Nothing to restore; the store is reset to empty.
    #[default]
    Empty,
}

impl From<String> for Snapshot {
    fn from(text: String) -> Self {
        Snapshot::Text(text)
    }
}

impl From<&str> for Snapshot {
    fn from(text: &str) -> Self {
        Snapshot::Text(text.to_string())
    }
}

impl From<Vec<(String, CacheEntry)>> for Snapshot {
    fn from(pairs: Vec<(String, CacheEntry)>) -> Self {
        Snapshot::Pairs(pairs)
    }
}

impl From<Vec<(String, Graph)>> for Snapshot {
    fn from(pairs: Vec<(String, Graph)>) -> Self {
        Snapshot::Pairs(
            pairs
                .into_iter()
                .map(|(key, graph)| (key, CacheEntry::Settled(Arc::new(graph))))
                .collect(),
        )
    }
}

impl<T: Into<Snapshot>> From<Option<T>> for Snapshot {
    fn from(source: Option<T>) -> Self {
        source.map(Into::into).unwrap_or_default()
    }
}
