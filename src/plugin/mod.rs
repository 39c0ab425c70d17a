//! Plugin system for externally supplied checks.
//!
//! A plugin is a [`Check`] with an identity, discovered at runtime rather than
//! compiled into the built-in table. Two kinds of loadable units exist:
//! - Compiled-in factories registered on the [`PluginRegistry`]
//! - YAML/JSON manifests found in plugin search locations
//!
//! Load failures are isolated per candidate: a bad manifest or a panicking
//! factory is recorded and skipped, the rest of discovery carries on.

pub mod manifest;
pub mod registry;

use crate::checks::Check;
use std::path::PathBuf;
use thiserror::Error;

pub use manifest::{ManifestPlugin, PluginManifest, RuleDefinition};
pub use registry::{DiscoveryReport, PluginCollision, PluginFailure, PluginRegistry};

/// A dynamically discovered check.
pub trait Plugin: Check {
    /// Plugin version
    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Human-readable description
    fn description(&self) -> &str {
        ""
    }
}

/// Where a registered plugin came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOrigin {
    /// Compiled-in factory
    Factory,
    /// Manifest file on disk
    Manifest(PathBuf),
    /// Registered directly by the caller
    Programmatic,
}

/// Error during plugin loading
#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Unsupported manifest format: {0}")]
    UnsupportedFormat(String),

    #[error("Plugin '{candidate}' does not satisfy the check contract: {reason}")]
    Contract { candidate: String, reason: String },

    #[error("Plugin '{candidate}' panicked while loading: {message}")]
    Panicked { candidate: String, message: String },

    #[error("No plugin named '{0}' in the factory table or search locations")]
    NotFound(String),

    #[error("None of the plugin search locations is reachable: {}", display_paths(.0))]
    NoReachableLocations(Vec<PathBuf>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
