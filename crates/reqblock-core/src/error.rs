//! Error types for value graphs and the transport codec.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised while building or converting a [`Graph`](crate::Graph).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A reference points past the end of the node arena.
    #[error("dangling reference to node {0}")]
    DanglingRef(NodeId),

    /// The target node is not the expected container kind.
    #[error("node {0} is not {1}")]
    WrongKind(NodeId, &'static str),

    /// The graph contains a cycle and cannot be expressed as a tree.
    #[error("cyclic reference through node {0}")]
    Cyclic(NodeId),

    /// The graph nests deeper than a JSON tree is allowed to.
    #[error("graph nests deeper than {0} levels")]
    TooDeep(usize),
}

/// Errors raised while encoding or decoding the transport format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(String),

    /// The input is JSON but not a well-formed reference table.
    #[error("malformed reference table: {0}")]
    Malformed(String),

    /// The decoded graph is structurally invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Json(e.to_string())
    }
}
