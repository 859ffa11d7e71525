//! Layered layout by topological level
//!
//! Sources sit on the top row; each later row holds the nodes whose
//! predecessors were all placed above. Nodes on a cycle never reach
//! in-degree zero and share one final row.

use std::collections::HashMap;

use grove_core::{GraphData, GraphResult};

use crate::engine::LayoutStrategy;
use crate::options::{LayoutOptions, LayoutOutcome};

/// Level of every node, by position in `graph.nodes`. Self loops are ignored.
pub fn levels(graph: &GraphData) -> Vec<usize> {
    let index: HashMap<&str, usize> = graph.nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    let mut in_degree = vec![0usize; graph.nodes.len()];
    for edge in &graph.edges {
        let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) else {
            continue;
        };
        if s == t {
            continue;
        }
        outgoing[s].push(t);
        in_degree[t] += 1;
    }

    let mut level: Vec<Option<usize>> = vec![None; graph.nodes.len()];
    let mut current: Vec<usize> = (0..graph.nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut depth = 0;
    while !current.is_empty() {
        let mut next = Vec::new();
        for &node in &current {
            level[node] = Some(depth);
            for &target in &outgoing[node] {
                in_degree[target] -= 1;
                if in_degree[target] == 0 {
                    next.push(target);
                }
            }
        }
        current = next;
        depth += 1;
    }

    level.into_iter().map(|l| l.unwrap_or(depth)).collect()
}

pub struct Hierarchical;

impl LayoutStrategy for Hierarchical {
    fn layout(&self, graph: &mut GraphData, options: &LayoutOptions) -> GraphResult<LayoutOutcome> {
        let levels = levels(graph);
        let level_count = levels.iter().max().map_or(0, |max| max + 1);
        let mut rows: Vec<Vec<usize>> = vec![Vec::new(); level_count];
        for (node, &level) in levels.iter().enumerate() {
            rows[level].push(node);
        }

        let spacing = options.node_spacing * 2.0;
        let row_height = options.height / (level_count + 1) as f64;
        let (cx, _) = options.center();
        for (level, row) in rows.iter().enumerate() {
            let y = row_height * (level + 1) as f64;
            let offset = (row.len() as f64 - 1.0) / 2.0;
            for (slot, &node) in row.iter().enumerate() {
                let x = cx + (slot as f64 - offset) * spacing;
                graph.nodes[node].set_position(x, y);
            }
        }
        Ok(LayoutOutcome::placed())
    }
}
