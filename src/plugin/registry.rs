//! Plugin registry - discovery, loading and lookup of plugins.
//!
//! The registry is owned by one inspector; there is no process-wide table.
//! Identities are lower-cased and kept in a sorted map, so iteration order
//! is stable across runs regardless of directory listing order.

use super::manifest::ManifestPlugin;
use super::{Plugin, PluginLoadError, PluginOrigin};
use crate::normalize_name;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Constructor for a compiled-in plugin
pub type PluginFactory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];
const DIRECTORY_MANIFESTS: [&str; 3] = ["plugin.yaml", "plugin.yml", "plugin.json"];

/// A candidate that failed to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    /// Factory name or manifest path
    pub candidate: String,
    pub message: String,
}

/// A loaded identity was replaced by a different candidate; the later one
/// was kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCollision {
    pub identity: String,
    pub replaced: String,
    pub kept: String,
}

/// Outcome of one discovery pass
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Identities registered by this pass, in load order
    pub loaded: Vec<String>,
    pub failures: Vec<PluginFailure>,
    pub collisions: Vec<PluginCollision>,
    /// Search locations that do not exist or cannot be listed
    pub unreachable: Vec<PathBuf>,
}

/// Registry of loaded plugins
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
    origins: BTreeMap<String, PluginOrigin>,
    factories: BTreeMap<String, PluginFactory>,
    search_paths: Vec<PathBuf>,
    failures: Vec<PluginFailure>,
    collisions: Vec<PluginCollision>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// Create a registry with no search locations
    pub fn new() -> Self {
        PluginRegistry {
            plugins: BTreeMap::new(),
            origins: BTreeMap::new(),
            factories: BTreeMap::new(),
            search_paths: Vec::new(),
            failures: Vec::new(),
            collisions: Vec::new(),
        }
    }

    /// Create a registry searching the given locations
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        PluginRegistry {
            search_paths,
            ..Self::new()
        }
    }

    /// Conventional plugin locations: project-local, then per-user
    pub fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".page-doc/plugins"), PathBuf::from("plugins")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("page-doc").join("plugins"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".page-doc").join("plugins"));
        }

        paths
    }

    /// Add a search location for manifests
    pub fn add_search_path(&mut self, path: PathBuf) {
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Register a compiled-in plugin constructor under `name`.
    ///
    /// The factory is not invoked until discovery or `load_one`.
    pub fn register_factory<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(normalize_name(name), Box::new(factory));
    }

    /// Register an already constructed plugin.
    ///
    /// Replacing a loaded identity is recorded as a collision. Registered
    /// plugins survive rediscovery until a candidate of the same identity
    /// replaces them.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<String, PluginLoadError> {
        let identity = validate_identity(plugin.as_ref(), None)?;
        let candidate = describe_origin(&PluginOrigin::Programmatic);
        self.insert(identity.clone(), Arc::from(plugin), PluginOrigin::Programmatic, candidate);
        Ok(identity)
    }

    /// Discover plugins from the factory table and the registry's own search
    /// locations.
    pub fn discover_default(&mut self) -> Result<DiscoveryReport, PluginLoadError> {
        let locations = self.search_paths.clone();
        self.discover(&locations)
    }

    /// Discover plugins: instantiate every factory, then load every manifest
    /// found in `locations`.
    ///
    /// A failing candidate is recorded and skipped. Every pass rebuilds the
    /// factory and manifest entries from scratch, so a manifest that was
    /// removed or no longer loads drops out; programmatically registered
    /// plugins are kept. Returns `NoReachableLocations` when locations were
    /// given and none could be listed; plugins loaded from factories stay
    /// registered in that case.
    pub fn discover(&mut self, locations: &[PathBuf]) -> Result<DiscoveryReport, PluginLoadError> {
        let mut report = DiscoveryReport::default();
        self.failures.clear();
        self.collisions.clear();

        let stale: Vec<String> = self
            .origins
            .iter()
            .filter(|(_, origin)| !matches!(origin, PluginOrigin::Programmatic))
            .map(|(identity, _)| identity.clone())
            .collect();
        for identity in stale {
            self.origins.remove(&identity);
            self.plugins.remove(&identity);
        }

        let factory_names: Vec<String> = self.factories.keys().cloned().collect();
        for name in factory_names {
            let outcome = self.instantiate_factory(&name);
            self.record(outcome, name, PluginOrigin::Factory, &mut report);
        }

        let mut reachable = 0;
        for location in locations {
            let candidates = match manifest_candidates(location) {
                Some(candidates) => candidates,
                None => {
                    log::debug!("plugin location {} is not reachable", location.display());
                    report.unreachable.push(location.clone());
                    continue;
                }
            };
            reachable += 1;

            for path in candidates {
                let outcome = ManifestPlugin::load(&path).map(|p| Box::new(p) as Box<dyn Plugin>);
                let candidate = path.display().to_string();
                self.record(outcome, candidate, PluginOrigin::Manifest(path), &mut report);
            }
        }

        log::info!(
            "plugin discovery: {} loaded, {} failed, {} unreachable locations",
            report.loaded.len(),
            report.failures.len(),
            report.unreachable.len()
        );

        if !locations.is_empty() && reachable == 0 {
            return Err(PluginLoadError::NoReachableLocations(locations.to_vec()));
        }

        Ok(report)
    }

    /// Load one plugin by identity, on demand.
    ///
    /// Resolution order: factory table, then `<location>/<identity>.{yaml,yml,json}`,
    /// then `<location>/<identity>/plugin.{yaml,yml,json}` for each search
    /// location. The loaded plugin is registered and returned.
    pub fn load_one(&mut self, identity: &str) -> Result<Arc<dyn Plugin>, PluginLoadError> {
        let key = normalize_name(identity);
        if key.is_empty() {
            return Err(PluginLoadError::NotFound(identity.to_string()));
        }

        if self.factories.contains_key(&key) {
            let plugin = self.instantiate_factory(&key)?;
            let plugin: Arc<dyn Plugin> = Arc::from(plugin);
            self.insert(key.clone(), Arc::clone(&plugin), PluginOrigin::Factory, key);
            return Ok(plugin);
        }

        let path = self
            .search_paths
            .iter()
            .find_map(|location| locate_manifest(location, &key))
            .ok_or_else(|| PluginLoadError::NotFound(key.clone()))?;

        let plugin = ManifestPlugin::load(&path)?;
        validate_identity(&plugin, Some(key.as_str()))?;

        let plugin: Arc<dyn Plugin> = Arc::new(plugin);
        let candidate = path.display().to_string();
        self.insert(key, Arc::clone(&plugin), PluginOrigin::Manifest(path), candidate);
        Ok(plugin)
    }

    /// Look up a loaded plugin (case-insensitive)
    pub fn get(&self, identity: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(&normalize_name(identity)).cloned()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.plugins.contains_key(&normalize_name(identity))
    }

    /// All loaded plugins keyed by identity, in sorted order
    pub fn all(&self) -> BTreeMap<String, Arc<dyn Plugin>> {
        self.plugins.clone()
    }

    /// Loaded identities in sorted order
    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn origin(&self, identity: &str) -> Option<&PluginOrigin> {
        self.origins.get(&normalize_name(identity))
    }

    /// Failures recorded by the most recent discovery pass
    pub fn failures(&self) -> &[PluginFailure] {
        &self.failures
    }

    /// Replacements recorded since the most recent discovery pass started,
    /// including those made by `register` and `load_one`
    pub fn collisions(&self) -> &[PluginCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn instantiate_factory(&self, name: &str) -> Result<Box<dyn Plugin>, PluginLoadError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginLoadError::NotFound(name.to_string()))?;

        let plugin = panic::catch_unwind(AssertUnwindSafe(|| factory())).map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            PluginLoadError::Panicked {
                candidate: name.to_string(),
                message,
            }
        })?;

        validate_identity(plugin.as_ref(), Some(name))?;
        Ok(plugin)
    }

    fn record(
        &mut self,
        outcome: Result<Box<dyn Plugin>, PluginLoadError>,
        candidate: String,
        origin: PluginOrigin,
        report: &mut DiscoveryReport,
    ) {
        let plugin = match outcome.and_then(|p| validate_identity(p.as_ref(), None).map(|id| (id, p))) {
            Ok(plugin) => plugin,
            Err(e) => {
                log::warn!("skipping plugin candidate {}: {}", candidate, e);
                let failure = PluginFailure {
                    candidate,
                    message: e.to_string(),
                };
                self.failures.push(failure.clone());
                report.failures.push(failure);
                return;
            }
        };

        let (identity, plugin) = plugin;
        if let Some(collision) = self.insert(identity.clone(), Arc::from(plugin), origin, candidate) {
            report.collisions.push(collision);
        }
        report.loaded.push(identity);
    }

    /// Store `plugin` under `identity`. Replacing an entry from a different
    /// origin, or any programmatic replacement, is logged and recorded.
    fn insert(
        &mut self,
        identity: String,
        plugin: Arc<dyn Plugin>,
        origin: PluginOrigin,
        candidate: String,
    ) -> Option<PluginCollision> {
        let collision = match self.origins.get(&identity) {
            Some(existing) if *existing != origin || origin == PluginOrigin::Programmatic => {
                let replaced = describe_origin(existing);
                log::warn!(
                    "plugin identity '{}' declared twice; {} replaces {}",
                    identity,
                    candidate,
                    replaced
                );
                Some(PluginCollision {
                    identity: identity.clone(),
                    replaced,
                    kept: candidate,
                })
            }
            _ => None,
        };

        self.origins.insert(identity.clone(), origin);
        self.plugins.insert(identity, plugin);

        if let Some(collision) = &collision {
            self.collisions.push(collision.clone());
        }
        collision
    }
}

/// Check that a loaded unit exposes a usable identity, optionally matching
/// the identity it was requested under
fn validate_identity(plugin: &dyn Plugin, expected: Option<&str>) -> Result<String, PluginLoadError> {
    let identity = normalize_name(plugin.name());
    if identity.is_empty() {
        return Err(PluginLoadError::Contract {
            candidate: expected.unwrap_or("<unnamed>").to_string(),
            reason: "plugin reports an empty name".to_string(),
        });
    }

    if let Some(expected) = expected {
        if identity != expected {
            return Err(PluginLoadError::Contract {
                candidate: expected.to_string(),
                reason: format!("plugin reports name '{}'", identity),
            });
        }
    }

    Ok(identity)
}

fn describe_origin(origin: &PluginOrigin) -> String {
    match origin {
        PluginOrigin::Factory => "factory".to_string(),
        PluginOrigin::Manifest(path) => path.display().to_string(),
        PluginOrigin::Programmatic => "programmatic registration".to_string(),
    }
}

/// Manifest files directly in `location`, plus `plugin.*` manifests in its
/// immediate subdirectories, sorted by path. `None` if the location cannot
/// be listed.
fn manifest_candidates(location: &Path) -> Option<Vec<PathBuf>> {
    let entries = std::fs::read_dir(location).ok()?;

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            if let Some(manifest) = DIRECTORY_MANIFESTS
                .iter()
                .map(|name| path.join(name))
                .find(|p| p.is_file())
            {
                candidates.push(manifest);
            }
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if MANIFEST_EXTENSIONS.contains(&ext) {
            candidates.push(path);
        }
    }

    candidates.sort();
    Some(candidates)
}

fn locate_manifest(location: &Path, identity: &str) -> Option<PathBuf> {
    MANIFEST_EXTENSIONS
        .iter()
        .map(|ext| location.join(format!("{}.{}", identity, ext)))
        .chain(DIRECTORY_MANIFESTS.iter().map(|name| location.join(identity).join(name)))
        .find(|p| p.is_file())
}
