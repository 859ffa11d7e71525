//! One force-directed sub-layout per connected component, tiled on a grid

use std::collections::HashSet;

use grove_core::{GraphData, GraphResult, SymbolGraph};

use crate::engine::LayoutStrategy;
use crate::force;
use crate::options::{LayoutOptions, LayoutOutcome};

pub struct Clustered;

impl LayoutStrategy for Clustered {
    fn layout(&self, graph: &mut GraphData, options: &LayoutOptions) -> GraphResult<LayoutOutcome> {
        let components = SymbolGraph::from_graph_data(graph).connected_components();
        if components.is_empty() {
            return Ok(LayoutOutcome::placed());
        }

        let columns = (components.len() as f64).sqrt().ceil() as usize;
        let rows = components.len().div_ceil(columns);
        let cell_width = options.width / columns as f64;
        let cell_height = options.height / rows as f64;
        let cell_options = options.with_canvas(cell_width, cell_height);
        let index = graph.index_by_id();
        let mut rng = options.rng();

        let mut outcome = LayoutOutcome {
            iterations: 0,
            converged: true,
        };
        for (cell, component) in components.iter().enumerate() {
            let ids: HashSet<String> = component.iter().cloned().collect();
            let mut sub = graph.induced(&ids);
            let run = force::simulate(&mut sub.nodes, &sub.edges, &cell_options, options.iterations, &mut rng);
            outcome.iterations = outcome.iterations.max(run.iterations);
            outcome.converged &= run.converged;

            let origin_x = (cell % columns) as f64 * cell_width;
            let origin_y = (cell / columns) as f64 * cell_height;
            for node in sub.nodes {
                if let Some(&i) = index.get(&node.id) {
                    graph.nodes[i].set_position(origin_x + node.x, origin_y + node.y);
                }
            }
        }
        tracing::debug!("Clustered layout placed {} components", components.len());
        Ok(outcome)
    }
}
