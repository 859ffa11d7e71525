//! Force-directed simulation
//!
//! Each step computes every node's net force from the positions of the
//! previous step, then integrates all nodes at once. Cost per step is
//! quadratic in the node count.

use std::collections::HashMap;

use grove_core::{GraphData, GraphEdge, GraphNode, GraphResult};
use rand::Rng;
use rand::rngs::StdRng;

use crate::engine::LayoutStrategy;
use crate::options::{LayoutOptions, LayoutOutcome};

/// Per-step speed cap.
pub const MAX_SPEED: f64 = 10.0;
/// The simulation stops once no node moves faster than this.
pub const CONVERGENCE_SPEED: f64 = 0.1;
/// Repulsion is ignored beyond this many node spacings.
const REPULSION_CUTOFF_SPACINGS: f64 = 5.0;
const MIN_DISTANCE: f64 = 0.01;
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Give every unplaced node a random position inside the canvas.
///
/// Pinned nodes snap to their pin. Velocities are reset.
pub fn place_unset(nodes: &mut [GraphNode], options: &LayoutOptions, rng: &mut StdRng) {
    for node in nodes.iter_mut() {
        if let (Some(fx), Some(fy)) = (node.fx, node.fy) {
            node.set_position(fx, fy);
        } else if !node.has_position() {
            let x = rng.random_range(0.0..=options.width);
            let y = rng.random_range(0.0..=options.height);
            node.set_position(x, y);
        } else {
            node.positioned = true;
        }
        node.vx = 0.0;
        node.vy = 0.0;
    }
}

/// Undirected neighbour lists by node position. Edges to unknown nodes and
/// self loops are ignored.
pub fn adjacency(nodes: &[GraphNode], edges: &[GraphEdge]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
    let mut adjacent = vec![Vec::new(); nodes.len()];
    for edge in edges {
        let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) else {
            continue;
        };
        if s == t {
            continue;
        }
        if !adjacent[s].contains(&t) {
            adjacent[s].push(t);
        }
        if !adjacent[t].contains(&s) {
            adjacent[t].push(s);
        }
    }
    adjacent
}

/// Run up to `iterations` steps over `nodes` in place.
///
/// Positions already set are kept as the starting point. Pinned nodes never
/// move.
pub fn simulate(
    nodes: &mut [GraphNode],
    edges: &[GraphEdge],
    options: &LayoutOptions,
    iterations: usize,
    rng: &mut StdRng,
) -> LayoutOutcome {
    place_unset(nodes, options, rng);
    let adjacent = adjacency(nodes, edges);
    let (cx, cy) = options.center();
    let cutoff = options.node_spacing * REPULSION_CUTOFF_SPACINGS;

    if nodes.iter().all(|n| n.is_pinned()) {
        return LayoutOutcome {
            iterations: 0,
            converged: true,
        };
    }

    let mut forces = vec![(0.0, 0.0); nodes.len()];
    for step in 0..iterations {
        for (i, node) in nodes.iter().enumerate() {
            if node.is_pinned() {
                forces[i] = (0.0, 0.0);
                continue;
            }
            let (mut fx, mut fy) = (0.0, 0.0);

            for (j, other) in nodes.iter().enumerate() {
                if i == j {
                    continue;
                }
                let dx = node.x - other.x;
                let dy = node.y - other.y;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance > cutoff {
                    continue;
                }
                // Coincident nodes are pushed apart along a per-pair direction
                let (ux, uy, distance) = if distance < MIN_DISTANCE {
                    let angle = (i.min(j) * nodes.len() + i.max(j)) as f64 * GOLDEN_ANGLE;
                    let sign = if i < j { 1.0 } else { -1.0 };
                    (sign * angle.cos(), sign * angle.sin(), MIN_DISTANCE)
                } else {
                    (dx / distance, dy / distance, distance)
                };
                let magnitude = -options.charge / (distance * distance);
                fx += ux * magnitude;
                fy += uy * magnitude;
            }

            for &j in &adjacent[i] {
                let other = &nodes[j];
                let dx = other.x - node.x;
                let dy = other.y - node.y;
                let distance = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                let pull = (distance - options.link_distance) * options.link_strength;
                fx += dx / distance * pull;
                fy += dy / distance * pull;
            }

            fx += (cx - node.x) * options.gravity;
            fy += (cy - node.y) * options.gravity;
            forces[i] = (fx, fy);
        }

        let mut max_speed: f64 = 0.0;
        for (node, &(fx, fy)) in nodes.iter_mut().zip(&forces) {
            if node.is_pinned() {
                continue;
            }
            node.vx = node.vx * options.velocity_damping + fx;
            node.vy = node.vy * options.velocity_damping + fy;
            let speed = node.speed();
            if speed > MAX_SPEED {
                node.vx *= MAX_SPEED / speed;
                node.vy *= MAX_SPEED / speed;
            }
            max_speed = max_speed.max(node.speed());

            node.x = (node.x + node.vx).clamp(0.0, options.width);
            node.y = (node.y + node.vy).clamp(0.0, options.height);
            node.vx *= options.velocity_decay;
            node.vy *= options.velocity_decay;
        }

        if max_speed < CONVERGENCE_SPEED {
            return LayoutOutcome {
                iterations: step + 1,
                converged: true,
            };
        }
    }

    LayoutOutcome {
        iterations,
        converged: false,
    }
}

pub struct ForceDirected;

impl LayoutStrategy for ForceDirected {
    fn layout(&self, graph: &mut GraphData, options: &LayoutOptions) -> GraphResult<LayoutOutcome> {
        let mut rng = options.rng();
        Ok(simulate(&mut graph.nodes, &graph.edges, options, options.iterations, &mut rng))
    }
}
