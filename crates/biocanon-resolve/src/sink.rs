//! Graph emission boundary.
//!
//! The resolver hands every accepted node and edge to a [`GraphSink`]. The
//! physical store (and its upsert-by-key semantics) lives behind this trait;
//! [`MemorySink`] is the in-process implementation used by tests and small
//! tools.

use parking_lot::Mutex;

use crate::model::{CanonicalEdge, CanonicalNode};

/// Boundary I/O failure. Unlike record errors, these abort the run.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode graph element: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sink rejected element: {0}")]
    Rejected(String),
}

pub trait GraphSink: Send + Sync {
    fn put_node(&self, node: CanonicalNode) -> Result<(), SinkError>;
    fn put_edge(&self, edge: CanonicalEdge) -> Result<(), SinkError>;

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    nodes: Mutex<Vec<CanonicalNode>>,
    edges: Mutex<Vec<CanonicalEdge>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> Vec<CanonicalNode> {
        self.nodes.lock().clone()
    }

    pub fn edges(&self) -> Vec<CanonicalEdge> {
        self.edges.lock().clone()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.lock().len()
    }

    pub fn into_parts(self) -> (Vec<CanonicalNode>, Vec<CanonicalEdge>) {
        (self.nodes.into_inner(), self.edges.into_inner())
    }
}

impl GraphSink for MemorySink {
    fn put_node(&self, node: CanonicalNode) -> Result<(), SinkError> {
        self.nodes.lock().push(node);
        Ok(())
    }

    fn put_edge(&self, edge: CanonicalEdge) -> Result<(), SinkError> {
        self.edges.lock().push(edge);
        Ok(())
    }
}
