//! Inspector configuration.
//!
//! Every field has a default, so an empty YAML or JSON file is a valid
//! configuration. Files are selected by extension: `.yaml`/`.yml` or `.json`.

use crate::fetch::HttpConfig;
use crate::output::OutputFormat;
use crate::plugin::PluginRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How `run_all` orders its output sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationOrder {
    /// Built-ins in their fixed order, then plugins sorted by identity
    #[default]
    BuiltinsThenPlugins,
    /// Identities listed in `fixed_order` first, then everything else in
    /// the default order
    Fixed,
}

/// Configuration consumed by [`crate::Inspector`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Extra plugin search locations, searched before the defaults
    pub plugin_paths: Vec<PathBuf>,
    pub use_default_plugin_paths: bool,
    /// Discover plugins at construction instead of on first check request
    pub eager_plugins: bool,
    pub include_plugins_in_run_all: bool,
    pub order: AggregationOrder,
    pub fixed_order: Vec<String>,
    /// Evaluate checks on the rayon thread pool
    pub parallel: bool,
    /// Identities left out of `run_all` and `run_report`
    pub skip: Vec<String>,
    pub output: OutputFormat,
    pub pretty: bool,
    pub fetch: HttpConfig,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        InspectorConfig {
            plugin_paths: Vec::new(),
            use_default_plugin_paths: true,
            eager_plugins: false,
            include_plugins_in_run_all: true,
            order: AggregationOrder::default(),
            fixed_order: Vec::new(),
            parallel: false,
            skip: Vec::new(),
            output: OutputFormat::default(),
            pretty: false,
            fetch: HttpConfig::default(),
        }
    }
}

/// Error loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported config format '{0}' (expected yaml, yml or json)")]
    UnsupportedFormat(String),
}

impl InspectorConfig {
    /// Load a configuration file, choosing the parser by extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if !matches!(ext.as_str(), "yaml" | "yml" | "json") {
            return Err(ConfigError::UnsupportedFormat(display));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: display.clone(),
            source: e,
        })?;

        let parse_err = |message: String| ConfigError::Parse {
            path: display.clone(),
            message,
        };

        if ext == "json" {
            serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))
        } else if content.trim().is_empty() {
            Ok(Self::default())
        } else {
            serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string()))
        }
    }

    /// Plugin locations in search order: configured paths, then the
    /// conventional locations when enabled
    pub fn plugin_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.plugin_paths.clone();
        if self.use_default_plugin_paths {
            for path in PluginRegistry::default_search_paths() {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    /// Whether `identity` is excluded by `skip`
    pub fn is_skipped(&self, identity: &str) -> bool {
        let identity = crate::normalize_name(identity);
        self.skip.iter().any(|s| crate::normalize_name(s) == identity)
    }
}
