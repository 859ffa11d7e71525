//! Workspace configuration loaded from `.grove.toml`
//!
//! Every section has defaults, so a missing file or a partial file is fine:
//!
//! ```toml
//! [cache]
//! ttl_secs = 600
//!
//! [layout]
//! algorithm = "hierarchical"
//!
//! [logging]
//! default = "info"
//!
//! [logging.modules]
//! grove_index = "debug"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// Config file name, looked up in the workspace root.
pub const CONFIG_FILE: &str = ".grove.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GroveConfig {
    pub index: IndexSettings,
    pub query: QuerySettings,
    pub cache: CacheSettings,
    pub layout: LayoutSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub include_tests: bool,
    /// Files larger than this are skipped by the reference analysis provider.
    pub max_file_bytes: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings {
            include_tests: false,
            max_file_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Capacity of the executor's own result cache.
    pub result_cache_capacity: usize,
    pub max_limit: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            result_cache_capacity: 100,
            max_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_size_bytes: usize,
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            max_size_bytes: 50 * 1024 * 1024,
            max_entries: 6000,
            ttl_secs: 30 * 60,
            cleanup_interval_secs: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub algorithm: String,
    pub width: f64,
    pub height: f64,
    pub node_spacing: f64,
    pub iterations: usize,
    pub gravity: f64,
    pub charge: f64,
    pub link_distance: f64,
    pub link_strength: f64,
    pub velocity_damping: f64,
    pub velocity_decay: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            algorithm: "force-directed".to_string(),
            width: 1200.0,
            height: 800.0,
            node_spacing: 60.0,
            iterations: 300,
            gravity: 0.01,
            charge: -300.0,
            link_distance: 100.0,
            link_strength: 0.05,
            velocity_damping: 0.6,
            velocity_decay: 0.9,
        }
    }
}

/// A canvas dimension is usable when it is finite and positive.
pub fn is_valid_extent(extent: f64) -> bool {
    extent.is_finite() && extent > 0.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub metrics_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 7890,
            metrics_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level for every target.
    pub default: String,
    /// Per-target overrides, e.g. `grove_cache = "debug"`.
    pub modules: HashMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            default: "info".to_string(),
            modules: HashMap::new(),
        }
    }
}

impl LoggingSettings {
    /// `EnvFilter` directive string built from the default and overrides.
    pub fn filter_directive(&self) -> String {
        let mut directive = self.default.clone();
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        for (module, level) in modules {
            directive.push_str(&format!(",{module}={level}"));
        }
        directive
    }
}

impl GroveConfig {
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Load `<root>/.grove.toml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> GraphResult<Self> {
        let path = Self::config_path(root);
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> GraphResult<Self> {
        let config: GroveConfig = toml::from_str(text).map_err(|e| GraphError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> GraphResult<()> {
        if self.cache.max_entries == 0 {
            return Err(GraphError::InvalidConfig("cache.max_entries must be positive".into()));
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err(GraphError::InvalidConfig("cache.cleanup_interval_secs must be positive".into()));
        }
        if !is_valid_extent(self.layout.width) || !is_valid_extent(self.layout.height) {
            return Err(GraphError::InvalidConfig("layout canvas must have a positive size".into()));
        }
        if self.query.result_cache_capacity == 0 {
            return Err(GraphError::InvalidConfig("query.result_cache_capacity must be positive".into()));
        }
        Ok(())
    }
}
