//! Layout options, algorithm tags and results

use std::fmt;
use std::str::FromStr;

use grove_core::config::is_valid_extent;
use grove_core::{GraphEdge, GraphError, GraphNode, LayoutSettings};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Built-in layout algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutAlgorithm {
    ForceDirected,
    Hierarchical,
    Clustered,
    Circular,
    Grid,
    Random,
}

impl LayoutAlgorithm {
    pub const ALL: [LayoutAlgorithm; 6] = [
        LayoutAlgorithm::ForceDirected,
        LayoutAlgorithm::Hierarchical,
        LayoutAlgorithm::Clustered,
        LayoutAlgorithm::Circular,
        LayoutAlgorithm::Grid,
        LayoutAlgorithm::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutAlgorithm::ForceDirected => "force-directed",
            LayoutAlgorithm::Hierarchical => "hierarchical",
            LayoutAlgorithm::Clustered => "clustered",
            LayoutAlgorithm::Circular => "circular",
            LayoutAlgorithm::Grid => "grid",
            LayoutAlgorithm::Random => "random",
        }
    }
}

impl fmt::Display for LayoutAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutAlgorithm {
    type Err = GraphError;

    /// Accepts kebab, snake and camel case, plus `force` as a short form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "forcedirected" | "force" => Ok(LayoutAlgorithm::ForceDirected),
            "hierarchical" | "tree" => Ok(LayoutAlgorithm::Hierarchical),
            "clustered" => Ok(LayoutAlgorithm::Clustered),
            "circular" => Ok(LayoutAlgorithm::Circular),
            "grid" => Ok(LayoutAlgorithm::Grid),
            "random" => Ok(LayoutAlgorithm::Random),
            _ => Err(GraphError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Canvas and simulation parameters shared by every algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOptions {
    pub width: f64,
    pub height: f64,
    pub node_spacing: f64,
    /// Margin kept free on every side after normalization.
    pub padding: f64,
    pub iterations: usize,
    pub gravity: f64,
    /// Negative values repel.
    pub charge: f64,
    pub link_distance: f64,
    pub link_strength: f64,
    pub velocity_damping: f64,
    pub velocity_decay: f64,
    /// Fixes random placement; `None` draws from the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl From<&LayoutSettings> for LayoutOptions {
    fn from(settings: &LayoutSettings) -> Self {
        LayoutOptions {
            width: settings.width,
            height: settings.height,
            node_spacing: settings.node_spacing,
            padding: 50.0,
            iterations: settings.iterations,
            gravity: settings.gravity,
            charge: settings.charge,
            link_distance: settings.link_distance,
            link_strength: settings.link_strength,
            velocity_damping: settings.velocity_damping,
            velocity_decay: settings.velocity_decay,
            seed: None,
        }
    }
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions::from(&LayoutSettings::default())
    }
}

impl LayoutOptions {
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Reject options no strategy can place nodes with.
    ///
    /// The canvas must be finite and positive, the padding finite and
    /// non-negative, and every force parameter finite.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_extent(self.width) || !is_valid_extent(self.height) {
            return Err(format!("canvas must have a positive size, got {}x{}", self.width, self.height));
        }
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(format!("padding must be non-negative, got {}", self.padding));
        }
        let forces = [
            ("nodeSpacing", self.node_spacing),
            ("gravity", self.gravity),
            ("charge", self.charge),
            ("linkDistance", self.link_distance),
            ("linkStrength", self.link_strength),
            ("velocityDamping", self.velocity_damping),
            ("velocityDecay", self.velocity_decay),
        ];
        match forces.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(format!("{name} must be finite, got {value}")),
            None => Ok(()),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Same options on a different canvas.
    pub fn with_canvas(&self, width: f64, height: f64) -> Self {
        LayoutOptions {
            width,
            height,
            ..self.clone()
        }
    }
}

/// Partial options merged over the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOptionsUpdate {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub node_spacing: Option<f64>,
    pub padding: Option<f64>,
    pub iterations: Option<usize>,
    pub gravity: Option<f64>,
    pub charge: Option<f64>,
    pub link_distance: Option<f64>,
    pub link_strength: Option<f64>,
    pub velocity_damping: Option<f64>,
    pub velocity_decay: Option<f64>,
    pub seed: Option<u64>,
}

impl LayoutOptionsUpdate {
    pub fn apply(&self, base: &LayoutOptions) -> LayoutOptions {
        LayoutOptions {
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            node_spacing: self.node_spacing.unwrap_or(base.node_spacing),
            padding: self.padding.unwrap_or(base.padding),
            iterations: self.iterations.unwrap_or(base.iterations),
            gravity: self.gravity.unwrap_or(base.gravity),
            charge: self.charge.unwrap_or(base.charge),
            link_distance: self.link_distance.unwrap_or(base.link_distance),
            link_strength: self.link_strength.unwrap_or(base.link_strength),
            velocity_damping: self.velocity_damping.unwrap_or(base.velocity_damping),
            velocity_decay: self.velocity_decay.unwrap_or(base.velocity_decay),
            seed: self.seed.or(base.seed),
        }
    }
}

/// What a strategy reports back about its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutOutcome {
    pub iterations: usize,
    pub converged: bool,
}

impl LayoutOutcome {
    /// Outcome of a direct placement with no simulation.
    pub fn placed() -> Self {
        LayoutOutcome {
            iterations: 0,
            converged: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub algorithm: String,
    pub options: LayoutOptions,
    pub iterations: usize,
    pub converged: bool,
    pub elapsed_ms: f64,
}
