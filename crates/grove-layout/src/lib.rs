//! Graph layout for symbol graphs
//!
//! Strategies place nodes on a fixed canvas; the engine merges options,
//! dispatches by algorithm tag, normalizes positions to fit the canvas and
//! emits `layout-computed`.

pub mod clustered;
pub mod engine;
pub mod force;
pub mod hierarchical;
pub mod options;
pub mod quality;
pub mod simple;
pub mod viewport;

pub use engine::{LayoutEngine, LayoutStrategy};
pub use options::{LayoutAlgorithm, LayoutOptions, LayoutOptionsUpdate, LayoutOutcome, LayoutResult};
pub use quality::{LayoutQuality, analyze_layout_quality};
pub use viewport::{Bounds, Viewport, fit_to_viewport, node_bounds, zoom_to_node};
