//! Graph view over `GraphData` using petgraph with string node ids

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use petgraph::visit::Dfs;

use crate::model::{GraphData, RelationshipType};

/// A directed multigraph over node ids.
///
/// Edges whose endpoints are not nodes of the data are ignored.
pub struct SymbolGraph {
    inner: DiGraph<String, RelationshipType>,
    index: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for SymbolGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl SymbolGraph {
    pub fn new() -> Self {
        SymbolGraph {
            inner: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build the view, keeping node order from `data.nodes`.
    pub fn from_graph_data(data: &GraphData) -> Self {
        let mut graph = SymbolGraph::new();
        for node in &data.nodes {
            graph.add_node(&node.id);
        }
        for edge in &data.edges {
            graph.add_edge(&edge.source, &edge.target, edge.relationship.kind);
        }
        graph
    }

    /// Add a node, returning the existing index if the id is already present.
    pub fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(id) {
            return *idx;
        }
        let idx = self.inner.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    /// Add an edge between two known nodes. Returns false if either is unknown.
    pub fn add_edge(&mut self, source: &str, target: &str, kind: RelationshipType) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&s), Some(&t)) => {
                self.inner.add_edge(s, t, kind);
                true
            }
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.inner.node_indices().map(move |idx| self.inner[idx].as_str())
    }

    /// Targets of outgoing edges, one entry per edge.
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.directed_neighbors(id, Direction::Outgoing)
    }

    /// Sources of incoming edges, one entry per edge.
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        self.directed_neighbors(id, Direction::Incoming)
    }

    fn directed_neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .inner
            .neighbors_directed(idx, direction)
            .map(|n| self.inner[n].as_str())
            .collect();
        // petgraph yields neighbours newest-edge first
        out.reverse();
        out
    }

    /// Distinct neighbours in either direction, excluding the node itself.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for n in self.inner.neighbors_undirected(idx) {
            if n != idx && seen.insert(n) {
                out.push(self.inner[n].as_str());
            }
        }
        out
    }

    /// Number of incoming edges per node (self-loops included).
    pub fn in_degrees(&self) -> HashMap<&str, usize> {
        self.inner
            .node_indices()
            .map(|idx| {
                let degree = self.inner.neighbors_directed(idx, Direction::Incoming).count();
                (self.inner[idx].as_str(), degree)
            })
            .collect()
    }

    /// Undirected connected components, each listed in discovery order.
    ///
    /// Components are ordered by their first node's position in the graph.
    pub fn connected_components(&self) -> Vec<Vec<String>> {
        let mut undirected: UnGraph<(), ()> = UnGraph::with_capacity(self.inner.node_count(), self.inner.edge_count());
        for _ in self.inner.node_indices() {
            undirected.add_node(());
        }
        for edge in self.inner.raw_edges() {
            undirected.add_edge(edge.source(), edge.target(), ());
        }

        let mut visited = HashSet::new();
        let mut components = Vec::new();
        for start in undirected.node_indices() {
            if visited.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut dfs = Dfs::new(&undirected, start);
            while let Some(idx) = dfs.next(&undirected) {
                if visited.insert(idx) {
                    component.push(self.inner[idx].clone());
                }
            }
            components.push(component);
        }
        components
    }
}

impl Default for SymbolGraph {
    fn default() -> Self {
        Self::new()
    }
}
