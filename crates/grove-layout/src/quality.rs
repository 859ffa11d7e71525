//! Heuristic layout quality score

use std::collections::HashMap;

use grove_core::{GraphEdge, GraphNode};
use serde::{Deserialize, Serialize};

use crate::options::LayoutResult;
use crate::viewport::node_bounds;

const OVERLAP_PENALTY: f64 = 2.0;
const CROSSING_PENALTY: f64 = 1.0;
const SPARSE_PENALTY: f64 = 10.0;
const NOT_CONVERGED_PENALTY: f64 = 10.0;
/// Bounding area beyond this multiple of the expected footprint is sparse.
const SPARSE_FACTOR: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutQuality {
    /// 0 to 100, higher is better.
    pub score: f64,
    pub overlaps: usize,
    pub crossings: usize,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

pub fn analyze_layout_quality(result: &LayoutResult) -> LayoutQuality {
    let spacing = result.options.node_spacing;
    let mut score = 100.0;
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();

    let overlaps = count_overlaps(&result.nodes, spacing / 2.0);
    if overlaps > 0 {
        score -= overlaps as f64 * OVERLAP_PENALTY;
        issues.push(format!("{overlaps} pairs of nodes overlap"));
        suggestions.push("Increase node spacing or charge strength".to_string());
    }

    let crossings = count_crossings(&result.nodes, &result.edges);
    let tolerated = result.edges.len() / 2;
    if crossings > tolerated {
        score -= (crossings - tolerated) as f64 * CROSSING_PENALTY;
        issues.push(format!("{crossings} edge crossings"));
        suggestions.push("Try the hierarchical or clustered layout".to_string());
    }

    if let Some(bounds) = node_bounds(&result.nodes) {
        let expected = result.nodes.len() as f64 * spacing * spacing;
        if expected > 0.0 && bounds.area() > expected * SPARSE_FACTOR {
            score -= SPARSE_PENALTY;
            issues.push("Layout is spread far wider than its node count needs".to_string());
            suggestions.push("Increase gravity or shorten link distance".to_string());
        }
    }

    if !result.converged {
        score -= NOT_CONVERGED_PENALTY;
        issues.push(format!("Simulation did not converge in {} iterations", result.iterations));
        suggestions.push("Run optimizeLayout or raise the iteration budget".to_string());
    }

    LayoutQuality {
        score: f64::max(score, 0.0),
        overlaps,
        crossings,
        issues,
        suggestions,
    }
}

/// Node pairs closer than `threshold`.
pub fn count_overlaps(nodes: &[GraphNode], threshold: f64) -> usize {
    let mut overlaps = 0;
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            let distance = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
            if distance < threshold {
                overlaps += 1;
            }
        }
    }
    overlaps
}

/// Proper intersections between edges that share no endpoint.
pub fn count_crossings(nodes: &[GraphNode], edges: &[GraphEdge]) -> usize {
    let position: HashMap<&str, (f64, f64)> = nodes.iter().map(|n| (n.id.as_str(), (n.x, n.y))).collect();
    let segments: Vec<(&GraphEdge, (f64, f64), (f64, f64))> = edges
        .iter()
        .filter_map(|e| Some((e, *position.get(e.source.as_str())?, *position.get(e.target.as_str())?)))
        .collect();

    let mut crossings = 0;
    for (i, (a, a1, a2)) in segments.iter().enumerate() {
        for (b, b1, b2) in &segments[i + 1..] {
            let adjacent = a.source == b.source || a.source == b.target || a.target == b.source || a.target == b.target;
            if !adjacent && segments_intersect(*a1, *a2, *b1, *b2) {
                crossings += 1;
            }
        }
    }
    crossings
}

fn orientation(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn segments_intersect(p1: (f64, f64), p2: (f64, f64), q1: (f64, f64), q2: (f64, f64)) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}
