//! Layout engine: strategy table, normalization and relayout
//!
//! Strategies are looked up by tag. The built-in tags are registered at
//! construction; `register` adds or replaces one without touching dispatch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use grove_core::{EventBus, GraphData, GraphError, GraphEvent, GraphNode, GraphResult, SymbolGraph};

use crate::clustered::Clustered;
use crate::force::{self, ForceDirected};
use crate::hierarchical::Hierarchical;
use crate::options::{LayoutAlgorithm, LayoutOptions, LayoutOptionsUpdate, LayoutOutcome, LayoutResult};
use crate::quality::{LayoutQuality, analyze_layout_quality};
use crate::simple::{Circular, Grid, Random};

/// Above this many nodes a full simulation monopolizes the caller.
pub const LARGE_GRAPH_NODES: usize = 500;
const LARGE_GRAPH_MAX_ITERATIONS: usize = 100;
/// Normalization never magnifies more than this.
const MAX_NORMALIZE_SCALE: f64 = 2.0;
/// Incremental passes run this fraction of the iteration budget.
const INCREMENTAL_DIVISOR: usize = 4;

/// One placement algorithm.
///
/// Implementations must give every node a finite position and mark it
/// positioned. The engine normalizes afterwards.
pub trait LayoutStrategy: Send + Sync {
    fn layout(&self, graph: &mut GraphData, options: &LayoutOptions) -> GraphResult<LayoutOutcome>;
}

pub struct LayoutEngine {
    strategies: HashMap<String, Arc<dyn LayoutStrategy>>,
    defaults: LayoutOptions,
    events: EventBus,
}

impl LayoutEngine {
    pub fn new(defaults: LayoutOptions, events: EventBus) -> Self {
        let mut engine = LayoutEngine {
            strategies: HashMap::new(),
            defaults,
            events,
        };
        let builtins: [(LayoutAlgorithm, Arc<dyn LayoutStrategy>); 6] = [
            (LayoutAlgorithm::ForceDirected, Arc::new(ForceDirected)),
            (LayoutAlgorithm::Hierarchical, Arc::new(Hierarchical)),
            (LayoutAlgorithm::Clustered, Arc::new(Clustered)),
            (LayoutAlgorithm::Circular, Arc::new(Circular)),
            (LayoutAlgorithm::Grid, Arc::new(Grid)),
            (LayoutAlgorithm::Random, Arc::new(Random)),
        ];
        for (algorithm, strategy) in builtins {
            engine.register(algorithm.as_str(), strategy);
        }
        engine
    }

    pub fn register(&mut self, tag: impl Into<String>, strategy: Arc<dyn LayoutStrategy>) {
        let tag = tag.into();
        tracing::debug!("Registered layout strategy {}", tag);
        self.strategies.insert(tag, strategy);
    }

    /// Registered tags, sorted.
    pub fn algorithms(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.strategies.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn defaults(&self) -> &LayoutOptions {
        &self.defaults
    }

    /// Lay out `data` with the strategy registered under `algorithm`.
    ///
    /// Built-in tags also resolve through their aliases, e.g. `forceDirected`.
    pub fn compute_layout(
        &self,
        data: &GraphData,
        algorithm: &str,
        update: &LayoutOptionsUpdate,
    ) -> GraphResult<LayoutResult> {
        let started = Instant::now();
        let (tag, strategy) = self.resolve(algorithm)?;
        let options = scale_for_size(update.apply(&self.defaults), data.nodes.len());
        ensure_usable(&tag, &options)?;

        let mut graph = data.clone();
        let outcome = strategy
            .layout(&mut graph, &options)
            .map_err(|e| computation_failed(&tag, e))?;
        ensure_finite(&tag, &graph.nodes)?;
        normalize(&mut graph.nodes, &options);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            "Computed {} layout for {} nodes in {:.1}ms ({} iterations, converged: {})",
            tag,
            graph.nodes.len(),
            elapsed_ms,
            outcome.iterations,
            outcome.converged
        );
        self.emit(&tag, graph.nodes.len(), elapsed_ms);

        Ok(LayoutResult {
            nodes: graph.nodes,
            edges: graph.edges,
            algorithm: tag,
            options,
            iterations: outcome.iterations,
            converged: outcome.converged,
            elapsed_ms,
        })
    }

    /// Relax only the changed nodes and their neighbours.
    ///
    /// Every other node keeps its position from `previous`. Nodes that have
    /// no previous position are treated as changed.
    pub fn compute_incremental_layout(
        &self,
        data: &GraphData,
        previous: &LayoutResult,
        changed: &[String],
    ) -> GraphResult<LayoutResult> {
        let started = Instant::now();
        let options = previous.options.clone();
        ensure_usable(&previous.algorithm, &options)?;

        let mut graph = data.clone();
        let prior: HashMap<&str, &GraphNode> = previous.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut affected: HashSet<String> = HashSet::new();
        for node in &mut graph.nodes {
            match prior.get(node.id.as_str()) {
                Some(old) => node.set_position(old.x, old.y),
                None => {
                    affected.insert(node.id.clone());
                }
            }
        }

        let view = SymbolGraph::from_graph_data(&graph);
        for id in changed {
            if !view.contains(id) {
                continue;
            }
            affected.insert(id.clone());
            affected.extend(view.neighbors(id).into_iter().map(str::to_string));
        }

        let mut sub = graph.induced(&affected);
        let iterations = (options.iterations / INCREMENTAL_DIVISOR).max(1);
        let outcome = force::simulate(&mut sub.nodes, &sub.edges, &options, iterations, &mut options.rng());
        ensure_finite("incremental", &sub.nodes)?;

        let index = graph.index_by_id();
        for node in sub.nodes {
            if let Some(&i) = index.get(&node.id) {
                graph.nodes[i].set_position(node.x, node.y);
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            "Incremental layout moved {} of {} nodes in {:.1}ms",
            affected.len(),
            graph.nodes.len(),
            elapsed_ms
        );
        self.emit("incremental", graph.nodes.len(), elapsed_ms);

        Ok(LayoutResult {
            nodes: graph.nodes,
            edges: graph.edges,
            algorithm: previous.algorithm.clone(),
            options,
            iterations: outcome.iterations,
            converged: outcome.converged,
            elapsed_ms,
        })
    }

    /// Continue a force-directed simulation from the current positions.
    ///
    /// `extra_iterations` defaults to the result's own iteration budget.
    pub fn optimize_layout(&self, result: &LayoutResult, extra_iterations: Option<usize>) -> GraphResult<LayoutResult> {
        let started = Instant::now();
        let options = result.options.clone();
        let tag = LayoutAlgorithm::ForceDirected.as_str();
        ensure_usable(tag, &options)?;
        let iterations = extra_iterations.unwrap_or(options.iterations);

        let mut nodes = result.nodes.clone();
        for node in &mut nodes {
            node.positioned = true;
        }
        let outcome = force::simulate(&mut nodes, &result.edges, &options, iterations, &mut options.rng());
        ensure_finite(tag, &nodes)?;
        normalize(&mut nodes, &options);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.emit(tag, nodes.len(), elapsed_ms);
        Ok(LayoutResult {
            nodes,
            edges: result.edges.clone(),
            algorithm: tag.to_string(),
            options,
            iterations: result.iterations + outcome.iterations,
            converged: outcome.converged,
            elapsed_ms,
        })
    }

    pub fn analyze_layout_quality(&self, result: &LayoutResult) -> LayoutQuality {
        analyze_layout_quality(result)
    }

    fn resolve(&self, algorithm: &str) -> GraphResult<(String, Arc<dyn LayoutStrategy>)> {
        if let Some(strategy) = self.strategies.get(algorithm) {
            return Ok((algorithm.to_string(), strategy.clone()));
        }
        let builtin = algorithm.parse::<LayoutAlgorithm>()?;
        self.strategies
            .get(builtin.as_str())
            .map(|s| (builtin.as_str().to_string(), s.clone()))
            .ok_or_else(|| GraphError::UnknownAlgorithm(algorithm.to_string()))
    }

    fn emit(&self, algorithm: &str, node_count: usize, elapsed_ms: f64) {
        self.events.emit(GraphEvent::LayoutComputed {
            algorithm: algorithm.to_string(),
            node_count,
            elapsed_ms,
        });
    }
}

/// Cut the budget and charge for graphs past the size bound.
fn scale_for_size(mut options: LayoutOptions, node_count: usize) -> LayoutOptions {
    if node_count > LARGE_GRAPH_NODES {
        tracing::warn!(
            "Laying out {} nodes exceeds the {}-node bound; capping iterations at {} and halving charge",
            node_count,
            LARGE_GRAPH_NODES,
            LARGE_GRAPH_MAX_ITERATIONS
        );
        options.iterations = options.iterations.min(LARGE_GRAPH_MAX_ITERATIONS);
        options.charge /= 2.0;
    }
    options
}

fn computation_failed(algorithm: &str, error: GraphError) -> GraphError {
    match error {
        GraphError::LayoutComputationFailed { .. } => error,
        other => GraphError::LayoutComputationFailed {
            algorithm: algorithm.to_string(),
            cause: other.to_string(),
        },
    }
}

fn ensure_usable(algorithm: &str, options: &LayoutOptions) -> GraphResult<()> {
    options.validate().map_err(|cause| GraphError::LayoutComputationFailed {
        algorithm: algorithm.to_string(),
        cause,
    })
}

fn ensure_finite(algorithm: &str, nodes: &[GraphNode]) -> GraphResult<()> {
    match nodes.iter().find(|n| !n.x.is_finite() || !n.y.is_finite()) {
        Some(node) => Err(GraphError::LayoutComputationFailed {
            algorithm: algorithm.to_string(),
            cause: format!("non-finite position for {}", node.id),
        }),
        None => Ok(()),
    }
}

/// Scale and translate node centers to fill the canvas inside the padding.
///
/// Magnification is capped; a single point is centered.
pub fn normalize(nodes: &mut [GraphNode], options: &LayoutOptions) {
    let Some(first) = nodes.first() else {
        return;
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for node in nodes.iter() {
        min_x = min_x.min(node.x);
        min_y = min_y.min(node.y);
        max_x = max_x.max(node.x);
        max_y = max_y.max(node.y);
    }

    let available_width = (options.width - 2.0 * options.padding).max(0.0);
    let available_height = (options.height - 2.0 * options.padding).max(0.0);
    let axis_scale = |content: f64, available: f64| {
        if content > 0.0 { available / content } else { f64::INFINITY }
    };
    let mut scale = axis_scale(max_x - min_x, available_width)
        .min(axis_scale(max_y - min_y, available_height))
        .min(MAX_NORMALIZE_SCALE);
    if !scale.is_finite() {
        scale = 1.0;
    }

    let (content_x, content_y) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
    let (cx, cy) = options.center();
    for node in nodes.iter_mut() {
        let x = (node.x - content_x) * scale + cx;
        let y = (node.y - content_y) * scale + cy;
        node.set_position(x, y);
    }
}
