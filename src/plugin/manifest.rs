//! Manifest plugins - checks declared in YAML/JSON files.
//!
//! Lets users add checks without rebuilding the engine. A manifest declares
//! the plugin identity and exactly one evaluation rule:
//!
//! ```yaml
//! plugin:
//!   name: og_title
//!   version: "1.0.0"
//!   description: "Open Graph title is declared"
//!
//! rule:
//!   kind: selector
//!   selector: 'meta[property="og:title"]'
//!   attribute: content
//!   expect: present
//!   fail_status: warn
//! ```
//!
//! A `pattern` rule matches a regular expression against the raw page text
//! instead. Manifests are validated when loaded, so a broken manifest is a
//! load error and never a failure at evaluation time.

use super::{Plugin, PluginLoadError};
use crate::checks::html;
use crate::checks::Check;
use crate::document::Document;
use crate::{normalize_name, CheckResult, Status};
use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest file structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginManifest {
    /// Plugin metadata
    pub plugin: PluginMetadata,

    /// The evaluation rule; a manifest without one is rejected
    #[serde(default)]
    pub rule: Option<RuleDefinition>,
}

/// Plugin metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginMetadata {
    /// Plugin identity
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Whether the rule expects its target to be present or absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    #[default]
    Present,
    Absent,
}

/// Rule definition in a manifest
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleDefinition {
    /// Regular expression over the raw page text
    Pattern {
        pattern: String,
        #[serde(default)]
        case_insensitive: bool,
        #[serde(default)]
        expect: Expectation,
        #[serde(default = "default_fail_status")]
        fail_status: Status,
    },
    /// CSS selector over the parsed page
    Selector {
        selector: String,
        #[serde(default)]
        attribute: Option<String>,
        #[serde(default)]
        expect: Expectation,
        #[serde(default = "default_min")]
        min: usize,
        #[serde(default)]
        max: Option<usize>,
        #[serde(default = "default_fail_status")]
        fail_status: Status,
    },
}

fn default_fail_status() -> Status {
    Status::Warn
}

fn default_min() -> usize {
    1
}

/// A validated, ready-to-evaluate rule
enum CompiledRule {
    Pattern {
        regex: Regex,
        expect: Expectation,
        fail_status: Status,
    },
    Selector {
        css: String,
        selector: Selector,
        attribute: Option<String>,
        expect: Expectation,
        min: usize,
        max: Option<usize>,
        fail_status: Status,
    },
}

/// Check loaded from a manifest
pub struct ManifestPlugin {
    name: String,
    version: String,
    description: String,
    source: PathBuf,
    rule: CompiledRule,
}

impl ManifestPlugin {
    /// Load and validate a manifest file (`.yaml`, `.yml` or `.json`)
    pub fn load(path: &Path) -> Result<Self, PluginLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| PluginLoadError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let manifest: PluginManifest = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| PluginLoadError::Parse {
                file: path.display().to_string(),
                message: e.to_string(),
            })?,
            "json" => serde_json::from_str(&content).map_err(|e| PluginLoadError::Parse {
                file: path.display().to_string(),
                message: e.to_string(),
            })?,
            _ => return Err(PluginLoadError::UnsupportedFormat(path.display().to_string())),
        };

        Self::from_manifest(manifest, path)
    }

    /// Validate a parsed manifest and compile its rule
    pub fn from_manifest(manifest: PluginManifest, source: &Path) -> Result<Self, PluginLoadError> {
        let name = normalize_name(&manifest.plugin.name);
        let candidate = if name.is_empty() {
            source.display().to_string()
        } else {
            name.clone()
        };
        let contract = |reason: String| PluginLoadError::Contract {
            candidate: candidate.clone(),
            reason,
        };

        if name.is_empty() {
            return Err(contract("manifest declares no plugin name".to_string()));
        }

        let definition = manifest
            .rule
            .ok_or_else(|| contract("manifest declares no rule to evaluate".to_string()))?;

        let rule = compile_rule(definition).map_err(contract)?;

        Ok(ManifestPlugin {
            name,
            version: manifest.plugin.version,
            description: manifest.plugin.description,
            source: source.to_path_buf(),
            rule,
        })
    }

    /// Manifest file this plugin was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }
}

fn compile_rule(definition: RuleDefinition) -> Result<CompiledRule, String> {
    match definition {
        RuleDefinition::Pattern {
            pattern,
            case_insensitive,
            expect,
            fail_status,
        } => {
            check_fail_status(fail_status)?;
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| format!("invalid pattern: {}", e))?;
            Ok(CompiledRule::Pattern {
                regex,
                expect,
                fail_status,
            })
        }
        RuleDefinition::Selector {
            selector,
            attribute,
            expect,
            min,
            max,
            fail_status,
        } => {
            check_fail_status(fail_status)?;
            if let Some(max) = max {
                if max < min {
                    return Err(format!("max ({}) is below min ({})", max, min));
                }
            }
            let compiled = html::selector(&selector).map_err(|e| e.to_string())?;
            Ok(CompiledRule::Selector {
                css: selector,
                selector: compiled,
                attribute,
                expect,
                min,
                max,
                fail_status,
            })
        }
    }
}

fn check_fail_status(status: Status) -> Result<(), String> {
    match status {
        Status::Warn | Status::Error => Ok(()),
        other => Err(format!("fail_status must be warn or error, got {}", other)),
    }
}

impl Check for ManifestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, document: &Document) -> CheckResult {
        match &self.rule {
            CompiledRule::Pattern {
                regex,
                expect,
                fail_status,
            } => evaluate_pattern(&self.name, regex, *expect, *fail_status, document),
            CompiledRule::Selector {
                css,
                selector,
                attribute,
                expect,
                min,
                max,
                fail_status,
            } => {
                let page = html::parse(document.content());
                let matched: Vec<_> = page.select(selector).collect();
                let count = matched.len();

                if *expect == Expectation::Absent {
                    return if count == 0 {
                        CheckResult::ok(&self.name, format!("no elements match {}", css))
                    } else {
                        CheckResult::new(&self.name, *fail_status, format!("{} elements match {}", count, css))
                    };
                }

                if count < *min {
                    return CheckResult::new(
                        &self.name,
                        *fail_status,
                        format!("found {} elements matching {}, expected at least {}", count, css, min),
                    );
                }
                if let Some(max) = max {
                    if count > *max {
                        return CheckResult::new(
                            &self.name,
                            *fail_status,
                            format!("found {} elements matching {}, expected at most {}", count, css, max),
                        );
                    }
                }

                let detail = matched.first().and_then(|el| match attribute {
                    Some(attr) => el.value().attr(attr).map(html::collapse_whitespace),
                    None => Some(html::element_text(el)),
                });
                match detail {
                    Some(text) if !text.is_empty() => CheckResult::ok(&self.name, text),
                    _ => CheckResult::ok(&self.name, format!("{} elements", count)),
                }
            }
        }
    }
}

fn evaluate_pattern(
    name: &str,
    regex: &Regex,
    expect: Expectation,
    fail_status: Status,
    document: &Document,
) -> CheckResult {
    let content = document.content();
    let count = regex.find_iter(content).count();

    match (expect, count) {
        (Expectation::Present, 0) => CheckResult::new(name, fail_status, "pattern not found"),
        (Expectation::Present, n) => {
            let captured = regex
                .captures(content)
                .and_then(|caps| caps.get(1))
                .map(|m| html::collapse_whitespace(m.as_str()));
            match captured {
                Some(text) if !text.is_empty() => CheckResult::ok(name, text),
                _ => CheckResult::ok(name, format!("{} matches", n)),
            }
        }
        (Expectation::Absent, 0) => CheckResult::ok(name, "pattern not found"),
        (Expectation::Absent, n) => CheckResult::new(name, fail_status, format!("{} matches", n)),
    }
}

impl Plugin for ManifestPlugin {
    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }
}
