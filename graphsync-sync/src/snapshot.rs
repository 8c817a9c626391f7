//! Point-in-time view of a replica's local graph.

use graphsync_types::{EdgeRecord, GraphRecord, NodeRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Nodes and edges of one replica, each sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphSnapshot {
    pub fn new(
        nodes: impl IntoIterator<Item = NodeRecord>,
        edges: impl IntoIterator<Item = EdgeRecord>,
    ) -> Self {
        let mut nodes: Vec<_> = nodes.into_iter().collect();
        let mut edges: Vec<_> = edges.into_iter().collect();
        nodes.sort_by_key(GraphRecord::key);
        edges.sort_by_key(GraphRecord::key);
        Self { nodes, edges }
    }

    /// Edges with an endpoint that is not among the nodes.
    ///
    /// Cross-kind integrity is not enforced during sync; this only reports it.
    #[must_use]
    pub fn dangling_edges(&self) -> Vec<&EdgeRecord> {
        let node_keys: HashSet<String> = self.nodes.iter().map(GraphRecord::key).collect();
        self.edges
            .iter()
            .filter(|e| !node_keys.contains(&e.from.key()) || !node_keys.contains(&e.to.key()))
            .collect()
    }

    /// The graph with every origin tag stripped, for comparing replicas whose
    /// local copies differ only in who last wrote what.
    #[must_use]
    pub fn without_origins(&self) -> Self {
        Self {
            nodes: self.nodes.iter().map(|n| n.with_origin(None)).collect(),
            edges: self.edges.iter().map(|e| e.with_origin(None)).collect(),
        }
    }
}
