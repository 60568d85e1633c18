//! Conversion configuration.
//!
//! Which identifiers count as class names, which files are skipped outright,
//! and which files get the conservative example treatment. Loadable from a
//! TOML file; every field has a sensible default.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Injected class-name predicate. The default implementation encodes the
/// casing convention the legacy corpus follows; callers can substitute a
/// symbol-table-backed classifier without touching the rewrite passes.
pub trait ClassNamePolicy: Sync {
    fn is_class_name(&self, name: &str) -> bool;
}

/// First-character-uppercase heuristic with a deny-list override for
/// well-known uppercase identifiers that are not classes (`JSON`, `Math`,
/// ...). A syntactic convention, not a semantic guarantee.
#[derive(Debug, Clone, Default)]
pub struct CasedNamePolicy {
    deny: HashSet<String>,
}

impl CasedNamePolicy {
    pub fn new(deny: impl IntoIterator<Item = String>) -> Self {
        Self {
            deny: deny.into_iter().collect(),
        }
    }
}

impl ClassNamePolicy for CasedNamePolicy {
    fn is_class_name(&self, name: &str) -> bool {
        !self.deny.contains(name)
            && name
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false)
    }
}

fn default_deny_identifiers() -> Vec<String> {
    [
        "Array", "Boolean", "Date", "Error", "Function", "Infinity", "JSON", "Map", "Math",
        "NaN", "Number", "Object", "Promise", "Proxy", "Reflect", "RegExp", "Set", "String",
        "Symbol", "URL", "WeakMap", "WeakSet",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_skip_files() -> Vec<String> {
    ["math/Vector3.js", "math/Quaternion.js", "math/Box3.js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_example_patterns() -> Vec<String> {
    vec!["examples/**".to_string()]
}

/// Settings for one conversion run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Uppercase identifiers that are never treated as classes.
    pub deny_identifiers: Vec<String>,
    /// Relative paths excluded from conversion entirely.
    pub skip_files: Vec<String>,
    /// Relative-path globs for files that get the conservative
    /// member-extraction policy.
    pub example_patterns: Vec<String>,
    /// Optional glob restricting which files are converted.
    pub include: Option<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            deny_identifiers: default_deny_identifiers(),
            skip_files: default_skip_files(),
            example_patterns: default_example_patterns(),
            include: None,
        }
    }
}

impl ConvertConfig {
    /// Load a config file, falling back to defaults for absent fields.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// The name policy this configuration describes.
    pub fn name_policy(&self) -> CasedNamePolicy {
        CasedNamePolicy::new(self.deny_identifiers.iter().cloned())
    }
}
