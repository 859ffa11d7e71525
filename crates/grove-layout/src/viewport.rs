//! Bounds and viewport transforms over laid-out nodes

use grove_core::GraphNode;
use serde::{Deserialize, Serialize};

/// Largest magnification `fit_to_viewport` will apply.
pub const MAX_FIT_SCALE: f64 = 2.0;
/// Largest magnification `zoom_to_node` will apply.
pub const MAX_ZOOM_SCALE: f64 = 3.0;
const MIN_ZOOM_SCALE: f64 = 0.1;

/// Axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }
}

/// Screen transform: `screen = world * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Viewport {
    pub fn identity() -> Self {
        Viewport {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }
}

/// Box around every node, each node extending `size` from its center.
pub fn node_bounds(nodes: &[GraphNode]) -> Option<Bounds> {
    let first = nodes.first()?;
    let mut bounds = Bounds {
        min_x: first.x - first.size,
        min_y: first.y - first.size,
        max_x: first.x + first.size,
        max_y: first.y + first.size,
    };
    for node in &nodes[1..] {
        bounds.min_x = bounds.min_x.min(node.x - node.size);
        bounds.min_y = bounds.min_y.min(node.y - node.size);
        bounds.max_x = bounds.max_x.max(node.x + node.size);
        bounds.max_y = bounds.max_y.max(node.y + node.size);
    }
    Some(bounds)
}

/// Scale and center all nodes inside a `width` x `height` view.
pub fn fit_to_viewport(nodes: &[GraphNode], width: f64, height: f64, padding: f64) -> Viewport {
    let Some(bounds) = node_bounds(nodes) else {
        return Viewport::identity();
    };
    let available_width = (width - 2.0 * padding).max(1.0);
    let available_height = (height - 2.0 * padding).max(1.0);
    let scale = fit_scale(bounds.width(), available_width)
        .min(fit_scale(bounds.height(), available_height))
        .min(MAX_FIT_SCALE);
    centered(bounds.center(), scale, width, height)
}

/// Center the view on one node at `zoom`, clamped to the zoom range.
pub fn zoom_to_node(nodes: &[GraphNode], id: &str, width: f64, height: f64, zoom: f64) -> Option<Viewport> {
    let node = nodes.iter().find(|n| n.id == id)?;
    let scale = zoom.clamp(MIN_ZOOM_SCALE, MAX_ZOOM_SCALE);
    Some(centered((node.x, node.y), scale, width, height))
}

fn fit_scale(content: f64, available: f64) -> f64 {
    if content > 0.0 { available / content } else { f64::INFINITY }
}

fn centered((x, y): (f64, f64), scale: f64, width: f64, height: f64) -> Viewport {
    Viewport {
        scale,
        offset_x: width / 2.0 - x * scale,
        offset_y: height / 2.0 - y * scale,
    }
}
