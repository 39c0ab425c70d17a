//! Report aggregation.
//!
//! Collects check results into one report keyed by identity and merges
//! built-in and plugin results with built-in precedence.

use crate::{CheckResult, Status};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, HashSet};

/// Result summary statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReportSummary {
    pub ok: u32,
    pub warn: u32,
    pub error: u32,
    pub unknown: u32,
    pub total: u32,
}

/// Results for one document, at most one per identity.
///
/// Iteration follows insertion order (the sequence-shaped report);
/// [`Report::to_map`] and serialization give the keyed form sorted by
/// identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    results: Vec<CheckResult>,
}

impl Report {
    pub fn new() -> Self {
        Report { results: Vec::new() }
    }

    /// Add a result, replacing any existing entry for the same identity in
    /// place
    pub fn insert(&mut self, result: CheckResult) {
        match self.results.iter_mut().find(|r| r.name == result.name) {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn get(&self, identity: &str) -> Option<&CheckResult> {
        let key = crate::normalize_name(identity);
        self.results.iter().find(|r| r.name == key)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.get(identity).is_some()
    }

    /// Identities in insertion order
    pub fn names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter()
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<CheckResult> {
        self.results
    }

    /// Keyed form, sorted by identity
    pub fn to_map(&self) -> BTreeMap<String, CheckResult> {
        self.results.iter().map(|r| (r.name.clone(), r.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| r.status == Status::Error)
    }

    /// Calculate summary statistics
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();

        for result in &self.results {
            summary.total += 1;
            match result.status {
                Status::Ok => summary.ok += 1,
                Status::Warn => summary.warn += 1,
                Status::Error => summary.error += 1,
                Status::Unknown => summary.unknown += 1,
            }
        }

        summary
    }
}

impl FromIterator<CheckResult> for Report {
    fn from_iter<I: IntoIterator<Item = CheckResult>>(iter: I) -> Self {
        let mut report = Report::new();
        for result in iter {
            report.insert(result);
        }
        report
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a CheckResult;
    type IntoIter = std::slice::Iter<'a, CheckResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Serializes as the keyed form: `{identity: {name, status, notes}}`
impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map = self.to_map();
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (identity, result) in &map {
            out.serialize_entry(identity, result)?;
        }
        out.end()
    }
}

/// Merges built-in and plugin results into one report.
///
/// A built-in result always wins over a plugin result of the same identity;
/// the plugin result is dropped and kept as a diagnostic. Among plugin
/// results the last one added wins.
pub struct ReportAggregator {
    report: Report,
    builtins: HashSet<String>,
    dropped: Vec<CheckResult>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        ReportAggregator {
            report: Report::new(),
            builtins: HashSet::new(),
            dropped: Vec::new(),
        }
    }

    /// Convenience: aggregate both sets in one call
    pub fn merge<B, P>(builtins: B, plugins: P) -> Report
    where
        B: IntoIterator<Item = CheckResult>,
        P: IntoIterator<Item = CheckResult>,
    {
        let mut aggregator = ReportAggregator::new();
        aggregator.add_builtins(builtins);
        aggregator.add_plugins(plugins);
        aggregator.into_report()
    }

    pub fn add_builtin(&mut self, result: CheckResult) {
        if let Some(shadowed) = self.report.get(&result.name) {
            if !self.builtins.contains(&result.name) {
                log::warn!(
                    "plugin result '{}' dropped: a built-in check has the same name",
                    result.name
                );
                self.dropped.push(shadowed.clone());
            }
        }
        self.builtins.insert(result.name.clone());
        self.report.insert(result);
    }

    pub fn add_builtins<I: IntoIterator<Item = CheckResult>>(&mut self, results: I) {
        for result in results {
            self.add_builtin(result);
        }
    }

    pub fn add_plugin(&mut self, result: CheckResult) {
        if self.builtins.contains(&result.name) {
            log::warn!(
                "plugin result '{}' dropped: a built-in check has the same name",
                result.name
            );
            self.dropped.push(result);
            return;
        }
        self.report.insert(result);
    }

    pub fn add_plugins<I: IntoIterator<Item = CheckResult>>(&mut self, results: I) {
        for result in results {
            self.add_plugin(result);
        }
    }

    /// Plugin results discarded because a built-in shares their identity
    pub fn dropped(&self) -> &[CheckResult] {
        &self.dropped
    }

    pub fn summary(&self) -> ReportSummary {
        self.report.summary()
    }

    pub fn into_report(self) -> Report {
        self.report
    }
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self::new()
    }
}
