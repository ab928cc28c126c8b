//! Structured values that may reference themselves.
//!
//! A [`Graph`] is an arena of container nodes plus a root value. Containers
//! refer to each other through [`Value::Ref`], so a node may be shared by
//! several parents or point back at one of its own ancestors.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde_json::{Map, Number, Value as JsonValue};

use crate::error::GraphError;

/// Index of a container node inside a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A slot in a graph: a scalar, or a reference to a container node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Ref(NodeId),
}

impl Value {
    /// Check if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the number as `i64`, if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Get the number as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Get the referenced node, if this is a reference.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Ref(id)
    }
}

/// A container node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Array(Vec<Value>),
    /// Fields in insertion order.
    Object(Vec<(String, Value)>),
}

impl Node {
    /// Human-readable kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Array(_) => "an array",
            Node::Object(_) => "an object",
        }
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        match self {
            Node::Array(items) => items.len(),
            Node::Object(fields) => fields.len(),
        }
    }

    /// Check if the node has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over direct child values.
    pub fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Node::Array(items) => Box::new(items.iter()),
            Node::Object(fields) => Box::new(fields.iter().map(|(_, v)| v)),
        }
    }

    fn value_at(&self, index: usize) -> Option<&Value> {
        match self {
            Node::Array(items) => items.get(index),
            Node::Object(fields) => fields.get(index).map(|(_, v)| v),
        }
    }

    /// Look up an object field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Node::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Node::Array(_) => None,
        }
    }
}

/// Deepest nesting [`Graph::to_json`] will produce.
pub const MAX_JSON_DEPTH: usize = 2048;

/// A container being converted by [`Graph::to_json`].
struct Frame<'a> {
    id: NodeId,
    node: &'a Node,
    out: Vec<JsonValue>,
}

impl<'a> Frame<'a> {
    fn next_child(&self) -> Option<&'a Value> {
        self.node.value_at(self.out.len())
    }

    fn finish(self) -> JsonValue {
        match self.node {
            Node::Array(_) => JsonValue::Array(self.out),
            Node::Object(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(k, _)| k.clone())
                    .zip(self.out)
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

/// Structured data with shared and circular references.
///
/// Equality is observational: two graphs are equal when their reachable
/// structure is isomorphic, including which nodes are shared. Node numbering
/// and unreachable nodes do not matter.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    root: Value,
}

impl Graph {
    /// Create an empty graph with a `Null` root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the root value.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Replace the root value.
    pub fn set_root(&mut self, value: Value) -> Result<(), GraphError> {
        self.check(&value)?;
        self.root = value;
        Ok(())
    }

    /// Allocate an empty array node.
    pub fn add_array(&mut self) -> NodeId {
        self.nodes.push(Node::Array(Vec::new()));
        NodeId(self.nodes.len() - 1)
    }

    /// Allocate an empty object node.
    pub fn add_object(&mut self) -> NodeId {
        self.nodes.push(Node::Object(Vec::new()));
        NodeId(self.nodes.len() - 1)
    }

    /// Append a value to an array node.
    pub fn push(&mut self, array: NodeId, value: Value) -> Result<(), GraphError> {
        self.check(&value)?;
        match self.nodes.get_mut(array.0) {
            Some(Node::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(_) => Err(GraphError::WrongKind(array, "an array")),
            None => Err(GraphError::DanglingRef(array)),
        }
    }

    /// Set a field on an object node, replacing any existing value in place.
    pub fn insert(
        &mut self,
        object: NodeId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), GraphError> {
        self.check(&value)?;
        let key = key.into();
        match self.nodes.get_mut(object.0) {
            Some(Node::Object(fields)) => {
                match fields.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, slot)) => *slot = value,
                    None => fields.push((key, value)),
                }
                Ok(())
            }
            Some(_) => Err(GraphError::WrongKind(object, "an object")),
            None => Err(GraphError::DanglingRef(object)),
        }
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Number of allocated nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no nodes are allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Follow `value` to an object and read `key`.
    pub fn get(&self, value: &Value, key: &str) -> Option<&Value> {
        self.node(value.as_node()?)?.get(key)
    }

    /// Follow `value` to an array and read position `index`.
    pub fn index(&self, value: &Value, index: usize) -> Option<&Value> {
        match self.node(value.as_node()?)? {
            Node::Array(items) => items.get(index),
            Node::Object(_) => None,
        }
    }

    /// Build a graph from a JSON tree. The result is always acyclic.
    pub fn from_json(json: &JsonValue) -> Self {
        let mut graph = Self::new();
        graph.root = graph.ingest(json);
        graph
    }

    fn ingest(&mut self, json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => Value::Number(n.clone()),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => {
                let id = self.add_array();
                let values = items.iter().map(|item| self.ingest(item)).collect();
                self.nodes[id.0] = Node::Array(values);
                Value::Ref(id)
            }
            JsonValue::Object(map) => {
                let id = self.add_object();
                let fields = map
                    .iter()
                    .map(|(k, v)| (k.clone(), self.ingest(v)))
                    .collect();
                self.nodes[id.0] = Node::Object(fields);
                Value::Ref(id)
            }
        }
    }

    /// Convert to a JSON tree.
    ///
    /// Shared nodes are duplicated. A cycle fails with [`GraphError::Cyclic`]
    /// and nesting beyond [`MAX_JSON_DEPTH`] with [`GraphError::TooDeep`].
    pub fn to_json(&self) -> Result<JsonValue, GraphError> {
        let mut on_path = vec![false; self.nodes.len()];
        let mut stack = Vec::new();
        if let Some(json) = self.enter(&self.root, &mut on_path, &mut stack)? {
            return Ok(json);
        }

        let mut result = JsonValue::Null;
        while let Some(frame) = stack.last() {
            match frame.next_child() {
                Some(child) => {
                    if let Some(json) = self.enter(child, &mut on_path, &mut stack)? {
                        if let Some(parent) = stack.last_mut() {
                            parent.out.push(json);
                        }
                    }
                }
                None => {
                    let Some(frame) = stack.pop() else { break };
                    on_path[frame.id.0] = false;
                    let json = frame.finish();
                    match stack.last_mut() {
                        Some(parent) => parent.out.push(json),
                        None => result = json,
                    }
                }
            }
        }
        Ok(result)
    }

    /// Emit a scalar directly, or open a frame for a container.
    fn enter<'a>(
        &'a self,
        value: &Value,
        on_path: &mut [bool],
        stack: &mut Vec<Frame<'a>>,
    ) -> Result<Option<JsonValue>, GraphError> {
        let id = match value {
            Value::Null => return Ok(Some(JsonValue::Null)),
            Value::Bool(b) => return Ok(Some(JsonValue::Bool(*b))),
            Value::Number(n) => return Ok(Some(JsonValue::Number(n.clone()))),
            Value::String(s) => return Ok(Some(JsonValue::String(s.clone()))),
            Value::Ref(id) => *id,
        };

        let node = self.node(id).ok_or(GraphError::DanglingRef(id))?;
        if on_path[id.0] {
            return Err(GraphError::Cyclic(id));
        }
        if stack.len() >= MAX_JSON_DEPTH {
            return Err(GraphError::TooDeep(MAX_JSON_DEPTH));
        }
        on_path[id.0] = true;
        stack.push(Frame {
            id,
            node,
            out: Vec::with_capacity(node.len()),
        });
        Ok(None)
    }

    /// Check whether any cycle is reachable from the root.
    pub fn is_cyclic(&self) -> bool {
        const UNVISITED: u8 = 0;
        const ON_PATH: u8 = 1;
        const DONE: u8 = 2;

        let mut marks = vec![UNVISITED; self.nodes.len()];
        let Value::Ref(root) = self.root else {
            return false;
        };
        if root.0 >= marks.len() {
            return false;
        }
        marks[root.0] = ON_PATH;

        // (node, position of the next child to visit)
        let mut stack = vec![(root, 0usize)];
        while let Some((id, next)) = stack.last_mut() {
            let child = self.node(*id).and_then(|node| node.value_at(*next));
            match child {
                Some(value) => {
                    *next += 1;
                    if let Value::Ref(child) = value {
                        match marks.get(child.0) {
                            Some(&ON_PATH) => return true,
                            Some(&UNVISITED) => {
                                marks[child.0] = ON_PATH;
                                stack.push((*child, 0));
                            }
                            _ => {}
                        }
                    }
                }
                None => {
                    marks[id.0] = DONE;
                    stack.pop();
                }
            }
        }
        false
    }

    /// Copy every node of `other` into this graph.
    ///
    /// Returns `other`'s root rewritten to point into this arena.
    pub fn import(&mut self, other: &Graph) -> Value {
        let offset = self.nodes.len();
        let shift = move |value: &Value| match value {
            Value::Ref(id) => Value::Ref(NodeId(id.0 + offset)),
            scalar => scalar.clone(),
        };

        for node in &other.nodes {
            let copied = match node {
                Node::Array(items) => Node::Array(items.iter().map(shift).collect()),
                Node::Object(fields) => Node::Object(
                    fields.iter().map(|(k, v)| (k.clone(), shift(v))).collect(),
                ),
            };
            self.nodes.push(copied);
        }

        shift(&other.root)
    }

    /// Extract the part of this graph reachable from `root` as a new graph.
    pub fn subgraph(&self, root: &Value) -> Result<Graph, GraphError> {
        self.check(root)?;

        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();

        if let Value::Ref(id) = root {
            remap.insert(*id, NodeId(0));
            order.push(*id);
            queue.push_back(*id);
        }

        while let Some(id) = queue.pop_front() {
            let node = self.node(id).ok_or(GraphError::DanglingRef(id))?;
            for child in node.values() {
                if let Value::Ref(child) = child {
                    if !remap.contains_key(child) {
                        remap.insert(*child, NodeId(order.len()));
                        order.push(*child);
                        queue.push_back(*child);
                    }
                }
            }
        }

        let translate = |value: &Value| -> Result<Value, GraphError> {
            match value {
                Value::Ref(id) => remap
                    .get(id)
                    .copied()
                    .map(Value::Ref)
                    .ok_or(GraphError::DanglingRef(*id)),
                scalar => Ok(scalar.clone()),
            }
        };

        let mut nodes = Vec::with_capacity(order.len());
        for id in &order {
            let node = self.node(*id).ok_or(GraphError::DanglingRef(*id))?;
            nodes.push(match node {
                Node::Array(items) => {
                    Node::Array(items.iter().map(translate).collect::<Result<_, _>>()?)
                }
                Node::Object(fields) => Node::Object(
                    fields
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), translate(v)?)))
                        .collect::<Result<_, GraphError>>()?,
                ),
            });
        }

        Ok(Graph {
            nodes,
            root: translate(root)?,
        })
    }

    /// Build a graph directly from an arena, validating every reference.
    pub(crate) fn from_parts(nodes: Vec<Node>, root: Value) -> Result<Self, GraphError> {
        let graph = Graph { nodes, root };
        for node in &graph.nodes {
            for child in node.values() {
                graph.check(child)?;
            }
        }
        graph.check(&graph.root)?;
        Ok(graph)
    }

    fn check(&self, value: &Value) -> Result<(), GraphError> {
        match value {
            Value::Ref(id) if id.0 >= self.nodes.len() => Err(GraphError::DanglingRef(*id)),
            _ => Ok(()),
        }
    }
}

impl From<&JsonValue> for Graph {
    fn from(json: &JsonValue) -> Self {
        Graph::from_json(json)
    }
}

impl From<JsonValue> for Graph {
    fn from(json: JsonValue) -> Self {
        Graph::from_json(&json)
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        let mut forward: HashMap<NodeId, NodeId> = HashMap::new();
        let mut backward: HashMap<NodeId, NodeId> = HashMap::new();
        let mut pending: Vec<(&Value, &Value)> = vec![(&self.root, &other.root)];

        while let Some((a, b)) = pending.pop() {
            let (x, y) = match (a, b) {
                (Value::Ref(x), Value::Ref(y)) => (*x, *y),
                (Value::Ref(_), _) | (_, Value::Ref(_)) => return false,
                (a, b) => {
                    if a != b {
                        return false;
                    }
                    continue;
                }
            };

            match (forward.get(&x), backward.get(&y)) {
                (Some(mapped_x), Some(mapped_y)) => {
                    if *mapped_x != y || *mapped_y != x {
                        return false;
                    }
                    continue;
                }
                (None, None) => {}
                _ => return false,
            }
            forward.insert(x, y);
            backward.insert(y, x);

            let (Some(nx), Some(ny)) = (self.node(x), other.node(y)) else {
                return false;
            };
            match (nx, ny) {
                (Node::Array(xs), Node::Array(ys)) => {
                    if xs.len() != ys.len() {
                        return false;
                    }
                    pending.extend(xs.iter().zip(ys));
                }
                (Node::Object(xs), Node::Object(ys)) => {
                    if xs.len() != ys.len() {
                        return false;
                    }
                    for ((kx, vx), (ky, vy)) in xs.iter().zip(ys) {
                        if kx != ky {
                            return false;
                        }
                        pending.push((vx, vy));
                    }
                }
                _ => return false,
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn self_referencing() -> Graph {
        let mut graph = Graph::new();
        let obj = graph.add_object();
        graph.insert(obj, "name", "loop".into()).unwrap();
        graph.insert(obj, "me", Value::Ref(obj)).unwrap();
        graph.set_root(Value::Ref(obj)).unwrap();
        graph
    }

    #[test]
    fn test_from_json_round_trip() {
        let json = json!({"b": 1, "a": [true, null, "x"], "c": {"d": 2.5}});
        let graph = Graph::from_json(&json);
        assert_eq!(graph.to_json().unwrap(), json);
        assert!(!graph.is_cyclic());
    }

    #[test]
    fn test_from_json_keeps_key_order() {
        let json: JsonValue = serde_json::from_str(r#"{"z": 1, "a": 2}"#).unwrap();
        let graph = Graph::from_json(&json);
        let Some(Node::Object(fields)) = graph.node(graph.root().as_node().unwrap()) else {
            panic!("expected object root");
        };
        assert_eq!(fields[0].0, "z");
        assert_eq!(fields[1].0, "a");
    }

    #[test]
    fn test_to_json_rejects_cycle() {
        let graph = self_referencing();
        assert!(graph.is_cyclic());
        assert!(matches!(graph.to_json(), Err(GraphError::Cyclic(_))));
    }

    #[test]
    fn test_to_json_duplicates_shared_nodes() {
        let mut graph = Graph::new();
        let shared = graph.add_array();
        graph.push(shared, 1i64.into()).unwrap();
        let root = graph.add_object();
        graph.insert(root, "left", Value::Ref(shared)).unwrap();
        graph.insert(root, "right", Value::Ref(shared)).unwrap();
        graph.set_root(Value::Ref(root)).unwrap();

        assert!(!graph.is_cyclic());
        assert_eq!(graph.to_json().unwrap(), json!({"left": [1], "right": [1]}));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut graph = Graph::new();
        let arr = graph.add_array();
        let err = graph.push(arr, Value::Ref(NodeId(7))).unwrap_err();
        assert_eq!(err, GraphError::DanglingRef(NodeId(7)));
        assert!(graph.set_root(Value::Ref(NodeId(3))).is_err());
    }

    #[test]
    fn test_insert_on_array_is_wrong_kind() {
        let mut graph = Graph::new();
        let arr = graph.add_array();
        assert!(matches!(
            graph.insert(arr, "k", Value::Null),
            Err(GraphError::WrongKind(_, _))
        ));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut graph = Graph::new();
        let obj = graph.add_object();
        graph.insert(obj, "a", 1i64.into()).unwrap();
        graph.insert(obj, "b", 2i64.into()).unwrap();
        graph.insert(obj, "a", 3i64.into()).unwrap();
        graph.set_root(Value::Ref(obj)).unwrap();
        assert_eq!(graph.to_json().unwrap(), json!({"a": 3, "b": 2}));
    }

    #[test]
    fn test_equality_ignores_numbering() {
        let a = self_referencing();

        let mut b = Graph::new();
        b.add_array(); // unreachable padding
        let obj = b.add_object();
        b.insert(obj, "name", "loop".into()).unwrap();
        b.insert(obj, "me", Value::Ref(obj)).unwrap();
        b.set_root(Value::Ref(obj)).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_detects_sharing_difference() {
        let mut shared = Graph::new();
        let leaf = shared.add_array();
        let root = shared.add_array();
        shared.push(root, Value::Ref(leaf)).unwrap();
        shared.push(root, Value::Ref(leaf)).unwrap();
        shared.set_root(Value::Ref(root)).unwrap();

        let copied = Graph::from_json(&json!([[], []]));

        assert_eq!(shared.to_json().unwrap(), copied.to_json().unwrap());
        assert_ne!(shared, copied);
    }

    #[test]
    fn test_get_and_index() {
        let graph = Graph::from_json(&json!({"items": [10, 20]}));
        let items = graph.get(graph.root(), "items").unwrap();
        assert_eq!(graph.index(items, 1).and_then(Value::as_i64), Some(20));
        assert!(graph.get(graph.root(), "missing").is_none());
    }

    #[test]
    fn test_import_and_subgraph() {
        let inner = self_referencing();
        let mut outer = Graph::new();
        let list = outer.add_array();
        let imported = outer.import(&inner);
        outer.push(list, imported.clone()).unwrap();
        outer.set_root(Value::Ref(list)).unwrap();

        let extracted = outer.subgraph(&imported).unwrap();
        assert_eq!(extracted, inner);
        assert_eq!(extracted.len(), 1);
    }

    fn chain(depth: usize) -> (Graph, NodeId) {
        let mut graph = Graph::new();
        let top = graph.add_array();
        let mut parent = top;
        for _ in 0..depth {
            let child = graph.add_array();
            graph.push(parent, Value::Ref(child)).unwrap();
            parent = child;
        }
        graph.push(parent, "leaf".into()).unwrap();
        graph.set_root(Value::Ref(top)).unwrap();
        (graph, parent)
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let (mut graph, bottom) = chain(200_000);
        assert!(!graph.is_cyclic());
        assert_eq!(graph.to_json(), Err(GraphError::TooDeep(MAX_JSON_DEPTH)));

        let top = graph.root().as_node().unwrap();
        graph.push(bottom, Value::Ref(top)).unwrap();
        assert!(graph.is_cyclic());
    }

    #[test]
    fn test_to_json_within_depth_limit() {
        let (graph, _) = chain(MAX_JSON_DEPTH - 1);
        let mut json = graph.to_json().unwrap();
        let mut depth = 0;
        while let JsonValue::Array(mut items) = json {
            depth += 1;
            json = items.remove(0);
        }
        assert_eq!(depth, MAX_JSON_DEPTH);
        assert_eq!(json, json!("leaf"));
    }

    #[test]
    fn test_from_f64_non_finite_is_null() {
        assert_eq!(Value::from(f64::NAN), Value::Null);
        assert_eq!(Value::from(1.5).as_f64(), Some(1.5));
    }
}
