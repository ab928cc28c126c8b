//! Reference-tracking transport codec.
//!
//! The encoded form is a JSON array, the *table*. Index 0 holds the root.
//! Containers and strings are stored once in the table and referenced from
//! inside other containers by their index written as a decimal string.
//! Numbers, booleans and null are written inline. A container gets its index
//! on first visit, so later references to the same node (including
//! references back to an ancestor) reuse it.
//!
//! ```text
//! graph:  obj = { "name": "loop", "me": obj }
//! table:  [{"name":"1","me":"0"},"loop"]
//! ```

use std::collections::{HashMap, VecDeque};

use serde_json::{Map, Value as JsonValue};

use crate::error::{CodecError, GraphError};
use crate::graph::{Graph, Node, NodeId, Value};

/// Encode a graph to its transport string.
pub fn encode(graph: &Graph) -> Result<String, CodecError> {
    let table = encode_table(graph)?;
    Ok(serde_json::to_string(&table)?)
}

/// Encode a graph to the reference table without rendering it to text.
pub fn encode_table(graph: &Graph) -> Result<JsonValue, CodecError> {
    Encoder::new(graph).run().map(JsonValue::Array)
}

/// Decode a transport string produced by [`encode`].
pub fn decode(text: &str) -> Result<Graph, CodecError> {
    let table: JsonValue = serde_json::from_str(text)?;
    decode_table(&table)
}

/// Decode an already-parsed reference table.
pub fn decode_table(table: &JsonValue) -> Result<Graph, CodecError> {
    let JsonValue::Array(table) = table else {
        return Err(CodecError::Malformed("expected a JSON array".into()));
    };
    let Some(first) = table.first() else {
        return Err(CodecError::Malformed("empty table".into()));
    };

    // Allocate every container before resolving any reference.
    let mut node_of = Vec::with_capacity(table.len());
    let mut count = 0;
    for entry in table {
        if is_container(entry) {
            node_of.push(Some(NodeId::new(count)));
            count += 1;
        } else {
            node_of.push(None);
        }
    }

    let resolve = |slot: &JsonValue| -> Result<Value, CodecError> {
        match slot {
            JsonValue::String(index) => {
                let position: usize = index.parse().map_err(|_| {
                    CodecError::Malformed(format!("invalid reference {:?}", index))
                })?;
                match table.get(position) {
                    None => Err(CodecError::Malformed(format!(
                        "reference {} out of range",
                        position
                    ))),
                    Some(JsonValue::String(s)) => Ok(Value::String(s.clone())),
                    Some(entry) if is_container(entry) => node_of[position]
                        .map(Value::Ref)
                        .ok_or_else(|| CodecError::Malformed("unallocated container".into())),
                    Some(scalar) => Ok(scalar_value(scalar)),
                }
            }
            container if is_container(container) => Err(CodecError::Malformed(
                "containers must be referenced by index".into(),
            )),
            scalar => Ok(scalar_value(scalar)),
        }
    };

    let mut nodes = Vec::with_capacity(count);
    for entry in table {
        match entry {
            JsonValue::Array(items) => {
                nodes.push(Node::Array(
                    items.iter().map(resolve).collect::<Result<_, _>>()?,
                ));
            }
            JsonValue::Object(fields) => {
                nodes.push(Node::Object(
                    fields
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), resolve(v)?)))
                        .collect::<Result<_, CodecError>>()?,
                ));
            }
            _ => {}
        }
    }

    let root = match first {
        JsonValue::String(s) => Value::String(s.clone()),
        entry if is_container(entry) => node_of[0]
            .map(Value::Ref)
            .ok_or_else(|| CodecError::Malformed("unallocated root".into()))?,
        scalar => scalar_value(scalar),
    };

    Ok(Graph::from_parts(nodes, root)?)
}

/// Escape a transport string so it can sit inside an HTML `<script>` element.
///
/// Only characters inside JSON string literals are affected, so the result
/// still decodes to the same graph.
pub fn escape_for_html(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len());
    for c in encoded.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

fn is_container(json: &JsonValue) -> bool {
    matches!(json, JsonValue::Array(_) | JsonValue::Object(_))
}

fn scalar_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => Value::Number(n.clone()),
        JsonValue::String(s) => Value::String(s.clone()),
        _ => Value::Null,
    }
}

struct Encoder<'g> {
    graph: &'g Graph,
    table: Vec<JsonValue>,
    nodes: HashMap<NodeId, usize>,
    strings: HashMap<&'g str, usize>,
    queue: VecDeque<(NodeId, usize)>,
}

impl<'g> Encoder<'g> {
    fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            table: Vec::new(),
            nodes: HashMap::new(),
            strings: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    fn run(mut self) -> Result<Vec<JsonValue>, CodecError> {
        let graph = self.graph;

        match graph.root() {
            Value::String(s) => {
                self.intern(s);
            }
            Value::Ref(id) => {
                self.reserve(*id)?;
            }
            scalar => return Ok(vec![inline(scalar)]),
        }

        while let Some((id, position)) = self.queue.pop_front() {
            let node = graph.node(id).ok_or(GraphError::DanglingRef(id))?;
            let encoded = match node {
                Node::Array(items) => JsonValue::Array(
                    items
                        .iter()
                        .map(|item| self.slot(item))
                        .collect::<Result<_, _>>()?,
                ),
                Node::Object(fields) => {
                    let mut map = Map::new();
                    for (k, v) in fields {
                        map.insert(k.clone(), self.slot(v)?);
                    }
                    JsonValue::Object(map)
                }
            };
            self.table[position] = encoded;
        }

        Ok(self.table)
    }

    fn slot(&mut self, value: &'g Value) -> Result<JsonValue, CodecError> {
        Ok(match value {
            Value::String(s) => JsonValue::String(self.intern(s).to_string()),
            Value::Ref(id) => JsonValue::String(self.reserve(*id)?.to_string()),
            scalar => inline(scalar),
        })
    }

    fn intern(&mut self, s: &'g str) -> usize {
        if let Some(&position) = self.strings.get(s) {
            return position;
        }
        let position = self.table.len();
        self.table.push(JsonValue::String(s.to_string()));
        self.strings.insert(s, position);
        position
    }

    fn reserve(&mut self, id: NodeId) -> Result<usize, CodecError> {
        if let Some(&position) = self.nodes.get(&id) {
            return Ok(position);
        }
        if self.graph.node(id).is_none() {
            return Err(GraphError::DanglingRef(id).into());
        }
        let position = self.table.len();
        self.table.push(JsonValue::Null);
        self.nodes.insert(id, position);
        self.queue.push_back((id, position));
        Ok(position)
    }
}

fn inline(value: &Value) -> JsonValue {
    match value {
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => JsonValue::Number(n.clone()),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Null | Value::Ref(_) => JsonValue::Null,
    }
}
