//! Direct placements: circle, grid and random scatter

use std::f64::consts::{FRAC_PI_2, TAU};

use grove_core::{GraphData, GraphResult};
use rand::Rng;

use crate::engine::LayoutStrategy;
use crate::options::{LayoutOptions, LayoutOutcome};

pub struct Circular;

impl LayoutStrategy for Circular {
    fn layout(&self, graph: &mut GraphData, options: &LayoutOptions) -> GraphResult<LayoutOutcome> {
        let (cx, cy) = options.center();
        let radius = (options.width.min(options.height) / 2.0 - options.padding).max(options.node_spacing);
        let count = graph.nodes.len();
        for (i, node) in graph.nodes.iter_mut().enumerate() {
            if count == 1 {
                node.set_position(cx, cy);
                continue;
            }
            // Start at twelve o'clock
            let angle = TAU * i as f64 / count as f64 - FRAC_PI_2;
            node.set_position(cx + radius * angle.cos(), cy + radius * angle.sin());
        }
        Ok(LayoutOutcome::placed())
    }
}

pub struct Grid;

impl LayoutStrategy for Grid {
    fn layout(&self, graph: &mut GraphData, options: &LayoutOptions) -> GraphResult<LayoutOutcome> {
        let count = graph.nodes.len();
        if count == 0 {
            return Ok(LayoutOutcome::placed());
        }
        let columns = (count as f64).sqrt().ceil() as usize;
        let rows = count.div_ceil(columns);
        let cell = options.node_spacing * 2.0;
        let (cx, cy) = options.center();
        let left = cx - (columns as f64 - 1.0) * cell / 2.0;
        let top = cy - (rows as f64 - 1.0) * cell / 2.0;
        for (i, node) in graph.nodes.iter_mut().enumerate() {
            let (row, column) = (i / columns, i % columns);
            node.set_position(left + column as f64 * cell, top + row as f64 * cell);
        }
        Ok(LayoutOutcome::placed())
    }
}

pub struct Random;

impl LayoutStrategy for Random {
    fn layout(&self, graph: &mut GraphData, options: &LayoutOptions) -> GraphResult<LayoutOutcome> {
        let mut rng = options.rng();
        let (x_range, y_range) = (
            margin_range(options.width, options.padding),
            margin_range(options.height, options.padding),
        );
        for node in &mut graph.nodes {
            let x = rng.random_range(x_range.0..=x_range.1);
            let y = rng.random_range(y_range.0..=y_range.1);
            node.set_position(x, y);
        }
        Ok(LayoutOutcome::placed())
    }
}

/// `[margin, extent - margin]`, or the whole extent when the margin does not fit.
fn margin_range(extent: f64, margin: f64) -> (f64, f64) {
    if extent > 2.0 * margin {
        (margin, extent - margin)
    } else {
        (0.0, extent.max(0.0))
    }
}
