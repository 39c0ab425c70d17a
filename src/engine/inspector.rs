//! Inspector - the single entry point of the engine.
//!
//! Ties document acquisition, the built-in dispatch table and the plugin
//! registry together, resolves requested identities (built-ins first, then
//! plugins) and evaluates them against one shared document.
//!
//! # Concurrency
//!
//! `Inspector` is `Send + Sync`. The document slot is a mutex and the fetch
//! runs while it is held, so concurrent first callers share one fetch. The
//! registry sits behind an `RwLock`: discovery takes the write lock,
//! evaluation clones `Arc` handles under the read lock and releases it before
//! any check runs. With `parallel` enabled, checks are fanned out on the
//! rayon pool; output order is the same as in sequential mode.

use crate::checks::{evaluate_guarded, BuiltinCheck, BuiltinTable};
use crate::config::{AggregationOrder, InspectorConfig};
use crate::document::Document;
use crate::engine::report::{Report, ReportAggregator};
use crate::fetch::{Fetch, FetchError, HttpClient};
use crate::plugin::{DiscoveryReport, Plugin, PluginLoadError, PluginRegistry};
use crate::{normalize_name, CheckResult, PageDocError};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// Lifecycle of an inspector, furthest stage reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectorState {
    Created,
    PluginsLoaded,
    DocumentAcquired,
    ResultsAvailable,
}

/// Outcome of [`Inspector::run_url`].
///
/// Serializes as the keyed report, or as `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UrlOutcome {
    Report(BTreeMap<String, CheckResult>),
    Error { error: String },
}

impl UrlOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, UrlOutcome::Error { .. })
    }

    pub fn report(&self) -> Option<&BTreeMap<String, CheckResult>> {
        match self {
            UrlOutcome::Report(report) => Some(report),
            UrlOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            UrlOutcome::Report(_) => None,
            UrlOutcome::Error { error } => Some(error),
        }
    }
}

#[derive(Default)]
struct DocumentSlot {
    source: Option<String>,
    document: Option<Document>,
}

struct RegistrySlot {
    registry: PluginRegistry,
    loaded: bool,
}

/// Results of every non-skipped check for one document
struct Evaluation {
    /// In built-in order
    builtins: Vec<CheckResult>,
    /// Sorted by identity
    plugins: Vec<CheckResult>,
}

/// A requested identity resolved to something runnable
enum Resolved<'a> {
    Builtin(&'a BuiltinCheck),
    Plugin(Arc<dyn Plugin>),
    Unknown,
}

impl Resolved<'_> {
    fn evaluate(&self, identity: &str, document: &Document) -> CheckResult {
        match self {
            Resolved::Builtin(check) => evaluate_guarded(*check, identity, document),
            Resolved::Plugin(plugin) => evaluate_guarded(plugin.as_ref(), identity, document),
            Resolved::Unknown => CheckResult::unknown(identity),
        }
    }
}

/// Check registry and execution engine for one page at a time
pub struct Inspector {
    config: InspectorConfig,
    builtins: BuiltinTable,
    registry: RwLock<RegistrySlot>,
    slot: Mutex<DocumentSlot>,
    fetcher: Box<dyn Fetch>,
    generation: AtomicU64,
    cache: Mutex<Option<(u64, Arc<Evaluation>)>>,
}

impl Inspector {
    /// Create an inspector with no document and no source
    pub fn new(config: InspectorConfig) -> Self {
        let registry = PluginRegistry::with_search_paths(config.plugin_search_paths());
        let fetcher = HttpClient::with_config(config.fetch.clone());
        let eager = config.eager_plugins;

        let inspector = Inspector {
            config,
            builtins: BuiltinTable::new(),
            registry: RwLock::new(RegistrySlot {
                registry,
                loaded: false,
            }),
            slot: Mutex::new(DocumentSlot::default()),
            fetcher: Box::new(fetcher),
            generation: AtomicU64::new(0),
            cache: Mutex::new(None),
        };

        if eager {
            inspector.ensure_plugins();
        }
        inspector
    }

    /// Create an inspector from a YAML or JSON configuration file
    pub fn from_config_file(path: &Path) -> Result<Self, PageDocError> {
        let config = InspectorConfig::load(path)?;
        Ok(Self::new(config))
    }

    /// Create an inspector holding an already acquired document
    pub fn with_document(config: InspectorConfig, document: Document) -> Self {
        let inspector = Self::new(config);
        inspector.set_document(document);
        inspector
    }

    /// Create an inspector that fetches `locator` on first use
    pub fn with_source(config: InspectorConfig, locator: impl Into<String>) -> Self {
        let inspector = Self::new(config);
        inspector.set_source(locator);
        inspector
    }

    /// Replace the fetch collaborator
    pub fn with_fetcher<F: Fetch + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Hold `document` from now on, dropping any cached results
    pub fn set_document(&self, document: Document) {
        let mut slot = lock(&self.slot);
        slot.source = document.locator().map(str::to_string);
        slot.document = Some(document);
        self.invalidate();
    }

    /// Fetch from `locator` on next use, dropping the held document and any
    /// cached results
    pub fn set_source(&self, locator: impl Into<String>) {
        let mut slot = lock(&self.slot);
        slot.source = Some(locator.into());
        slot.document = None;
        self.invalidate();
    }

    /// Document currently held, without fetching
    pub fn document(&self) -> Option<Document> {
        lock(&self.slot).document.clone()
    }

    pub fn source(&self) -> Option<String> {
        lock(&self.slot).source.clone()
    }

    pub fn state(&self) -> InspectorState {
        if self.cached_evaluation().is_some() {
            return InspectorState::ResultsAvailable;
        }
        if lock(&self.slot).document.is_some() {
            return InspectorState::DocumentAcquired;
        }
        if read(&self.registry).loaded {
            return InspectorState::PluginsLoaded;
        }
        InspectorState::Created
    }

    /// Re-run plugin discovery over the configured locations.
    ///
    /// Factory and manifest plugins are rebuilt; programmatically registered
    /// ones are kept.
    pub fn discover_plugins(&self) -> Result<DiscoveryReport, PluginLoadError> {
        let mut slot = write(&self.registry);
        let outcome = slot.registry.discover_default();
        slot.loaded = true;
        self.invalidate();
        outcome
    }

    /// Register an already constructed plugin.
    ///
    /// A plugin sharing a built-in's identity is accepted but never shadows
    /// the built-in.
    pub fn register_plugin(&self, plugin: Box<dyn Plugin>) -> Result<String, PluginLoadError> {
        let mut slot = write(&self.registry);
        let identity = slot.registry.register(plugin)?;
        if self.builtins.contains(&identity) {
            log::warn!("plugin '{}' is shadowed by the built-in check of the same name", identity);
        }
        self.invalidate();
        Ok(identity)
    }

    /// Register a compiled-in plugin constructor. It is instantiated by the
    /// next discovery, which happens lazily on the next check request.
    pub fn register_plugin_factory<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let mut slot = write(&self.registry);
        slot.registry.register_factory(name, factory);
        slot.loaded = false;
        self.invalidate();
    }

    /// Load one plugin by identity from the factory table or search locations
    pub fn load_plugin(&self, identity: &str) -> Result<Arc<dyn Plugin>, PluginLoadError> {
        self.ensure_plugins();
        let mut slot = write(&self.registry);
        let plugin = slot.registry.load_one(identity)?;
        self.invalidate();
        Ok(plugin)
    }

    /// Identities of loaded plugins, sorted
    pub fn plugin_names(&self) -> Vec<String> {
        self.ensure_plugins();
        read(&self.registry).registry.names()
    }

    /// Every runnable identity: built-ins in order, then plugins that are not
    /// shadowed by a built-in
    pub fn check_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builtins.names().into_iter().map(str::to_string).collect();
        names.extend(
            self.plugin_names()
                .into_iter()
                .filter(|name| !self.builtins.contains(name)),
        );
        names
    }

    /// Run one check by identity.
    ///
    /// Built-ins are consulted first, then plugins. An identity found in
    /// neither gives an `unknown` result without acquiring a document.
    pub fn run_one(&self, identity: &str, document: Option<&Document>) -> Result<CheckResult, PageDocError> {
        let key = normalize_name(identity);
        let resolved = self.resolve(&key);
        if matches!(resolved, Resolved::Unknown) {
            log::debug!("no check named '{}'", key);
            return Ok(CheckResult::unknown(key));
        }

        let document = self.acquire(document)?;
        Ok(resolved.evaluate(&key, &document))
    }

    /// Run a caller-chosen list of identities, in the given order
    pub fn run_many<S: AsRef<str>>(
        &self,
        identities: &[S],
        document: Option<&Document>,
    ) -> Result<Vec<CheckResult>, PageDocError> {
        let jobs: Vec<(String, Resolved<'_>)> = identities
            .iter()
            .map(|identity| {
                let key = normalize_name(identity.as_ref());
                let resolved = self.resolve(&key);
                (key, resolved)
            })
            .collect();

        if jobs.iter().all(|(_, resolved)| matches!(resolved, Resolved::Unknown)) {
            return Ok(jobs.iter().map(|(key, _)| CheckResult::unknown(key.as_str())).collect());
        }

        let document = self.acquire(document)?;
        Ok(self.evaluate_jobs(&jobs, &document))
    }

    /// Run every built-in check, then every plugin when
    /// `include_plugins_in_run_all` is set, in the configured order
    pub fn run_all(&self, document: Option<&Document>) -> Result<Vec<CheckResult>, PageDocError> {
        let start = Instant::now();
        let evaluation = self.evaluation(document)?;

        let plugins: &[CheckResult] = if self.config.include_plugins_in_run_all {
            &evaluation.plugins
        } else {
            &[]
        };
        let report = ReportAggregator::merge(evaluation.builtins.iter().cloned(), plugins.iter().cloned());

        let results = match self.config.order {
            AggregationOrder::BuiltinsThenPlugins => report.into_results(),
            AggregationOrder::Fixed => self.apply_fixed_order(report),
        };

        log::debug!("run_all: {} results in {}ms", results.len(), start.elapsed().as_millis());
        Ok(results)
    }

    /// Run only the plugin set, independent of built-ins
    pub fn run_plugins(&self, document: Option<&Document>) -> Result<BTreeMap<String, CheckResult>, PageDocError> {
        let evaluation = self.evaluation(document)?;
        Ok(evaluation
            .plugins
            .iter()
            .map(|result| (result.name.clone(), result.clone()))
            .collect())
    }

    /// Run built-ins and plugins and merge them into one keyed report, with
    /// built-ins winning on identity collision
    pub fn run_report(&self, document: Option<&Document>) -> Result<Report, PageDocError> {
        let evaluation = self.evaluation(document)?;
        Ok(ReportAggregator::merge(
            evaluation.builtins.iter().cloned(),
            evaluation.plugins.iter().cloned(),
        ))
    }

    /// Fetch `url` and return the merged report. On success the fetched page
    /// replaces the held document; on failure the held document and source
    /// are left as they were and the failure comes back as an error outcome.
    pub fn run_url(&self, url: &str) -> UrlOutcome {
        let (document, generation) = {
            let mut slot = lock(&self.slot);
            match self.fetch_document(url) {
                Ok(document) => {
                    slot.source = Some(url.to_string());
                    slot.document = Some(document.clone());
                    self.invalidate();
                    (document, self.generation.load(Ordering::SeqCst))
                }
                Err(e) => {
                    log::warn!("skipping {}: {}", url, e);
                    return UrlOutcome::Error { error: e.to_string() };
                }
            }
        };

        let evaluation = self.evaluate_and_cache(&document, generation);
        let report = ReportAggregator::merge(
            evaluation.builtins.iter().cloned(),
            evaluation.plugins.iter().cloned(),
        );
        UrlOutcome::Report(report.to_map())
    }

    /// `run_report` for each document in turn
    pub fn run_batch(&self, documents: &[Document]) -> Vec<Report> {
        documents
            .iter()
            .filter_map(|document| self.run_report(Some(document)).ok())
            .collect()
    }

    fn resolve(&self, key: &str) -> Resolved<'_> {
        if let Some(check) = self.builtins.get(key) {
            return Resolved::Builtin(check);
        }
        self.ensure_plugins();
        match read(&self.registry).registry.get(key) {
            Some(plugin) => Resolved::Plugin(plugin),
            None => Resolved::Unknown,
        }
    }

    /// Explicit document, or the held one, fetching it from the source on
    /// first use
    fn acquire(&self, document: Option<&Document>) -> Result<Document, PageDocError> {
        if let Some(document) = document {
            return Ok(document.clone());
        }

        // The fetch runs under the slot lock so concurrent callers share it.
        let mut slot = lock(&self.slot);
        if let Some(document) = &slot.document {
            return Ok(document.clone());
        }

        let source = slot.source.clone().ok_or(PageDocError::NoSource)?;
        let document = self.fetch_document(&source)?;
        slot.document = Some(document.clone());
        Ok(document)
    }

    /// Run the fetch collaborator. A panicking fetcher becomes a fetch error.
    fn fetch_document(&self, locator: &str) -> Result<Document, PageDocError> {
        log::info!("fetching {}", locator);
        let start = Instant::now();

        let content = panic::catch_unwind(AssertUnwindSafe(|| self.fetcher.fetch(locator))).map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            FetchError::Panicked {
                locator: locator.to_string(),
                message,
            }
        })??;

        log::debug!("fetched {} ({} bytes) in {}ms", locator, content.len(), start.elapsed().as_millis());
        Ok(Document::with_locator(content, locator))
    }

    /// Evaluate every non-skipped check. Results for the held document are
    /// cached until the document, source or plugin set changes.
    fn evaluation(&self, document: Option<&Document>) -> Result<Arc<Evaluation>, PageDocError> {
        if let Some(document) = document {
            return Ok(Arc::new(self.evaluate_everything(document)));
        }

        if let Some(cached) = self.cached_evaluation() {
            return Ok(cached);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let document = self.acquire(None)?;
        Ok(self.evaluate_and_cache(&document, generation))
    }

    /// Evaluate `document` and cache the result unless the held document or
    /// plugin set changed since `generation` was read
    fn evaluate_and_cache(&self, document: &Document, generation: u64) -> Arc<Evaluation> {
        let evaluation = Arc::new(self.evaluate_everything(document));

        let mut cache = lock(&self.cache);
        if self.generation.load(Ordering::SeqCst) == generation {
            *cache = Some((generation, Arc::clone(&evaluation)));
        }
        evaluation
    }

    fn cached_evaluation(&self) -> Option<Arc<Evaluation>> {
        let cache = lock(&self.cache);
        match cache.as_ref() {
            Some((generation, evaluation)) if *generation == self.generation.load(Ordering::SeqCst) => {
                Some(Arc::clone(evaluation))
            }
            _ => None,
        }
    }

    fn evaluate_everything(&self, document: &Document) -> Evaluation {
        let builtin_jobs: Vec<(String, Resolved<'_>)> = self
            .builtins
            .iter()
            .filter(|check| !self.config.is_skipped(check.name))
            .map(|check| (check.name.to_string(), Resolved::Builtin(check)))
            .collect();

        let plugin_jobs: Vec<(String, Resolved<'_>)> = self
            .plugin_snapshot()
            .into_iter()
            .filter(|(identity, _)| !self.config.is_skipped(identity))
            .map(|(identity, plugin)| (identity, Resolved::Plugin(plugin)))
            .collect();

        Evaluation {
            builtins: self.evaluate_jobs(&builtin_jobs, document),
            plugins: self.evaluate_jobs(&plugin_jobs, document),
        }
    }

    fn evaluate_jobs(&self, jobs: &[(String, Resolved<'_>)], document: &Document) -> Vec<CheckResult> {
        if self.config.parallel {
            jobs.par_iter()
                .map(|(identity, resolved)| resolved.evaluate(identity, document))
                .collect()
        } else {
            jobs.iter()
                .map(|(identity, resolved)| resolved.evaluate(identity, document))
                .collect()
        }
    }

    /// `fixed_order` identities first, then the rest in default order.
    /// Listed identities that resolve to nothing become `unknown` results.
    fn apply_fixed_order(&self, report: Report) -> Vec<CheckResult> {
        let mut remaining = report.into_results();
        let mut ordered = Vec::with_capacity(remaining.len());

        for identity in &self.config.fixed_order {
            let key = normalize_name(identity);
            if ordered.iter().any(|r: &CheckResult| r.name == key) {
                continue;
            }
            match remaining.iter().position(|r| r.name == key) {
                Some(idx) => ordered.push(remaining.remove(idx)),
                None if !self.config.is_skipped(&key) => ordered.push(CheckResult::unknown(key)),
                None => {}
            }
        }

        ordered.extend(remaining);
        ordered
    }

    /// Loaded plugins, discovering them first if needed. The registry lock is
    /// released before the handles are used.
    fn plugin_snapshot(&self) -> Vec<(String, Arc<dyn Plugin>)> {
        self.ensure_plugins();
        read(&self.registry).registry.all().into_iter().collect()
    }

    fn ensure_plugins(&self) {
        if read(&self.registry).loaded {
            return;
        }

        let mut slot = write(&self.registry);
        if slot.loaded {
            return;
        }

        match slot.registry.discover_default() {
            Ok(report) => {
                for failure in &report.failures {
                    log::debug!("plugin {} not loaded: {}", failure.candidate, failure.message);
                }
            }
            Err(e) if self.config.plugin_paths.is_empty() => log::debug!("{}", e),
            Err(e) => log::warn!("{}", e),
        }
        slot.loaded = true;
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *lock(&self.cache) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
