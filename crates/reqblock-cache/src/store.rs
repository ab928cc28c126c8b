//! The fingerprint-keyed cache store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqblock_core::codec::{self, escape_for_html};
use reqblock_core::{CodecError, Graph, Node, Value};

use crate::{CacheEntry, Snapshot};

#[derive(Debug, Default)]
struct Entries {
    items: Vec<(String, CacheEntry)>,
    index: HashMap<String, usize>,
}

impl Entries {
    fn from_pairs(pairs: Vec<(String, CacheEntry)>) -> Self {
        let mut entries = Entries::default();
        for (key, entry) in pairs {
            entries.set(key, entry);
        }
        entries
    }

    fn set(&mut self, key: String, entry: CacheEntry) {
        match self.index.get(&key) {
            Some(&position) => self.items[position].1 = entry,
            None => {
                self.index.insert(key.clone(), self.items.len());
                self.items.push((key, entry));
            }
        }
    }
}

/// Mapping from request fingerprint to cached value.
///
/// One store is shared (behind an `Arc`) by every request block under the
/// same context. Keys keep their first-insertion order, which is the order
/// [`extract`](Self::extract) and [`serialize`](Self::serialize) report.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<Entries>,
    server_mode: bool,
}

impl CacheStore {
    /// Create an empty client-side store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty server-side store.
    ///
    /// Request blocks never write in-flight placeholders into a server store,
    /// so everything it holds can be serialized for hydration.
    pub fn server() -> Self {
        Self::with_server_mode(true)
    }

    /// Create an empty store with an explicit mode.
    pub fn with_server_mode(server_mode: bool) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            server_mode,
        }
    }

    /// Create a store pre-populated from a snapshot.
    pub fn from_snapshot(source: impl Into<Snapshot>, server_mode: bool) -> Self {
        let store = Self::with_server_mode(server_mode);
        store.restore(source);
        store
    }

    /// Whether this store lives on the rendering server.
    pub fn server_mode(&self) -> bool {
        self.server_mode
    }

    /// Check if an entry exists for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.read_lock().index.contains_key(key)
    }

    /// Read the entry for `key`.
    pub fn read(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.read_lock();
        let position = *entries.index.get(key)?;
        Some(entries.items[position].1.clone())
    }

    /// Store `entry` under `key`, replacing any previous entry in place.
    pub fn write(&self, key: impl Into<String>, entry: impl Into<CacheEntry>) -> &Self {
        let key = key.into();
        let entry = entry.into();
        tracing::trace!(key = %key, pending = entry.is_pending(), "cache write");
        self.write_lock().set(key, entry);
        self
    }

    /// Remove every entry.
    pub fn clear(&self) -> &Self {
        *self.write_lock() = Entries::default();
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read_lock().items.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.read_lock()
            .items
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// All `[key, entry]` pairs in insertion order.
    pub fn extract(&self) -> Vec<(String, CacheEntry)> {
        self.read_lock().items.clone()
    }

    /// Replace the contents of the store.
    ///
    /// Text is decoded with the transport codec; pairs are adopted as they
    /// are. Malformed text, like [`Snapshot::Empty`], leaves the store empty.
    pub fn restore(&self, source: impl Into<Snapshot>) -> &Self {
        let entries = match source.into() {
            Snapshot::Pairs(pairs) => Entries::from_pairs(pairs),
            Snapshot::Text(text) => match decode_pairs(&text) {
                Ok(pairs) => Entries::from_pairs(pairs),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed cache snapshot");
                    Entries::default()
                }
            },
            Snapshot::Empty => Entries::default(),
        };
        *self.write_lock() = entries;
        self
    }

    /// Serialize every settled entry to the transport string.
    ///
    /// In-flight placeholders have no transport form and are left out.
    pub fn serialize(&self) -> Result<String, CodecError> {
        let mut combined = Graph::new();
        let root = combined.add_array();

        for (key, entry) in self.extract() {
            let CacheEntry::Settled(graph) = entry else {
                tracing::debug!(key = %key, "skipping in-flight entry during serialize");
                continue;
            };
            let pair = combined.add_array();
            combined.push(pair, Value::String(key))?;
            let value = combined.import(&graph);
            combined.push(pair, value)?;
            combined.push(root, Value::Ref(pair))?;
        }

        combined.set_root(Value::Ref(root))?;
        codec::encode(&combined)
    }

    /// Serialize and escape for embedding in a server-rendered document.
    pub fn serialize_for_html(&self) -> Result<String, CodecError> {
        self.serialize().map(|encoded| escape_for_html(&encoded))
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode_pairs(text: &str) -> Result<Vec<(String, CacheEntry)>, CodecError> {
    let combined = codec::decode(text)?;
    let malformed = |what: &str| CodecError::Malformed(format!("cache snapshot: {}", what));

    let Some(Node::Array(pairs)) = combined.root().as_node().and_then(|id| combined.node(id))
    else {
        return Err(malformed("root is not an array"));
    };

    let mut out = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Some(Node::Array(items)) = pair.as_node().and_then(|id| combined.node(id)) else {
            return Err(malformed("entry is not a pair"));
        };
        let [Value::String(key), value] = items.as_slice() else {
            return Err(malformed("entry is not a [key, value] pair"));
        };
        let graph = combined.subgraph(value)?;
        out.push((key.clone(), CacheEntry::from(graph)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Placeholder;
    use serde_json::json;

    fn cyclic_graph() -> Graph {
        let mut graph = Graph::new();
        let parent = graph.add_object();
        let child = graph.add_object();
        graph.insert(parent, "name", "root".into()).unwrap();
        graph.insert(parent, "child", Value::Ref(child)).unwrap();
        graph.insert(child, "parent", Value::Ref(parent)).unwrap();
        graph.set_root(Value::Ref(parent)).unwrap();
        graph
    }

    fn settled(entry: Option<CacheEntry>) -> Graph {
        match entry {
            Some(CacheEntry::Settled(graph)) => (*graph).clone(),
            other => panic!("expected settled entry, got {:?}", other),
        }
    }

    #[test]
    fn test_has_tracks_writes_and_clear() {
        let store = CacheStore::new();
        assert!(!store.has("k"));

        store.write("k", Graph::from_json(&json!(1)));
        assert!(store.has("k"));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(!store.has("k"));
        assert!(store.is_empty());
        assert!(store.read("k").is_none());
    }

    #[test]
    fn test_write_chains_and_keeps_order() {
        let store = CacheStore::new();
        store
            .write("b", Graph::from_json(&json!("b")))
            .write("a", Graph::from_json(&json!("a")))
            .write("b", Graph::from_json(&json!("b2")));

        assert_eq!(store.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(settled(store.read("b")).to_json().unwrap(), json!("b2"));
    }

    #[test]
    fn test_serialize_restore_round_trip_with_cycles() {
        let store = CacheStore::server();
        store.write("tree", cyclic_graph());
        store.write("plain", Graph::from_json(&json!({"items": [1, 2, 3]})));

        let text = store.serialize().unwrap();
        let restored = CacheStore::from_snapshot(text, false);

        assert_eq!(restored.keys(), store.keys());
        assert_eq!(settled(restored.read("tree")), cyclic_graph());
        assert_eq!(
            settled(restored.read("plain")).to_json().unwrap(),
            json!({"items": [1, 2, 3]})
        );
        assert!(!restored.server_mode());
    }

    #[test]
    fn test_serialize_skips_placeholders() {
        let store = CacheStore::new();
        store.write("done", Graph::from_json(&json!(true)));
        store.write("inflight", Placeholder::new(futures::future::pending()));

        let restored = CacheStore::from_snapshot(store.serialize().unwrap(), false);
        assert!(restored.has("done"));
        assert!(!restored.has("inflight"));
    }

    #[test]
    fn test_restore_adopts_pairs_without_parsing() {
        let store = CacheStore::new();
        store.write("old", Graph::new());

        let pairs = vec![("k".to_string(), Graph::from_json(&json!([1])))];
        store.restore(pairs);

        assert_eq!(store.keys(), vec!["k".to_string()]);
    }

    #[test]
    fn test_restore_from_extract() {
        let store = CacheStore::new();
        store.write("x", cyclic_graph());
        let copy = CacheStore::from_snapshot(store.extract(), false);
        assert_eq!(settled(copy.read("x")), cyclic_graph());
    }

    #[test]
    fn test_restore_malformed_falls_back_to_empty() {
        let store = CacheStore::new();
        store.write("k", Graph::new());

        store.restore("definitely not a snapshot");
        assert!(store.is_empty());

        store.write("k", Graph::new());
        store.restore(r#"[{"not":"pairs"}]"#);
        assert!(store.is_empty());
    }

    #[test]
    fn test_restore_none_resets() {
        let store = CacheStore::new();
        store.write("k", Graph::new());
        store.restore(None::<String>);
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_store_round_trip() {
        let store = CacheStore::new();
        let text = store.serialize().unwrap();
        assert_eq!(text, "[[]]");
        assert!(CacheStore::from_snapshot(text, false).is_empty());
    }

    #[test]
    fn test_deep_snapshot_restores_and_inspects() {
        let mut graph = Graph::new();
        let top = graph.add_array();
        let mut parent = top;
        for _ in 0..200_000 {
            let child = graph.add_array();
            graph.push(parent, Value::Ref(child)).unwrap();
            parent = child;
        }
        graph.set_root(Value::Ref(top)).unwrap();

        let store = CacheStore::server();
        store.write("deep", graph);
        let restored = CacheStore::from_snapshot(store.serialize().unwrap(), false);

        let deep = settled(restored.read("deep"));
        assert_eq!(deep.len(), 200_001);
        assert!(!deep.is_cyclic());
        assert!(deep.to_json().is_err());
    }

    #[test]
    fn test_serialize_for_html_escapes() {
        let store = CacheStore::server();
        store.write("page", Graph::from_json(&json!({"html": "</script>"})));
        let escaped = store.serialize_for_html().unwrap();
        assert!(!escaped.contains("</script>"));

        let restored = CacheStore::from_snapshot(escaped, false);
        assert_eq!(
            settled(restored.read("page")).to_json().unwrap(),
            json!({"html": "</script>"})
        );
    }
}
