// ! Path filter deciding which filesystem entries take part in watching

use crate::extension::config::IgnoreRules;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path};
use tracing::trace;

/// Suffixes of caches, logs, databases and editor droppings
pub const FORBIDDEN_SUFFIXES: &[&str] = &[
    ".pyc",
    ".log",
    ".ini",
    ".DS_Store",
    ".db",
    ".mypy_cache",
    ".tmp",
    ".swp",
    ".swo",
    ".bak",
    "~",
];

/// Directory names that never hold extensions
pub const FORBIDDEN_NAMES: &[&str] = &["__pycache__", ".git", ".cache"];

/// Eight or more contiguous hex digits mark a generated, hash-named file.
static HASHED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-f0-9]{8,}").expect("hashed-name pattern is valid"));

/// Pure predicate over paths
///
/// Every component of the path is checked, so a file inside an ignored
/// directory is ignored as well. Pass paths relative to their watch root:
/// the root's own location is not something the filter should judge.
#[derive(Debug, Clone)]
pub struct PathFilter {
    suffixes: Vec<String>,
    names: Vec<String>,
    hashed_names: bool,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self {
            suffixes: FORBIDDEN_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            names: FORBIDDEN_NAMES.iter().map(|s| s.to_string()).collect(),
            hashed_names: true,
        }
    }
}

impl PathFilter {
    /// Create a filter with the built-in rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in rules extended by user configuration
    pub fn from_rules(rules: &IgnoreRules) -> Self {
        let mut filter = Self::default();
        filter.suffixes.extend(rules.suffixes.iter().cloned());
        filter.names.extend(rules.names.iter().cloned());
        filter.hashed_names = rules.hashed_names;
        filter
    }

    /// Ignore entries ending with `suffix`
    pub fn with_forbidden_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    /// Ignore entries named exactly `name`
    pub fn with_forbidden_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Turn the hashed-name heuristic off
    pub fn without_hash_check(mut self) -> Self {
        self.hashed_names = false;
        self
    }

    /// Whether `path` should be watched or considered as an extension
    pub fn accept(&self, path: &Path) -> bool {
        path.components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy()),
                _ => None,
            })
            .all(|name| self.accept_name(&name))
    }

    /// Check a single entry name
    pub fn accept_name(&self, name: &str) -> bool {
        if self.names.iter().any(|n| n == name) {
            return false;
        }
        if self.suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }
        if self.hashed_names && HASHED_NAME.is_match(name) {
            trace!("skipping {}, has a hash", name);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_extensions() {
        let filter = PathFilter::new();
        assert!(filter.accept(Path::new("greet.ext")));
        assert!(filter.accept(Path::new("pkg/helper.ext")));
        assert!(filter.accept(Path::new("pkg/nested/deeper/util.ext")));
    }

    #[test]
    fn test_rejects_forbidden_suffixes() {
        let filter = PathFilter::new();
        assert!(!filter.accept(Path::new("greet.pyc")));
        assert!(!filter.accept(Path::new("bot.log")));
        assert!(!filter.accept(Path::new("state.db")));
        assert!(!filter.accept(Path::new(".greet.ext.swp")));
        assert!(!filter.accept(Path::new("greet.ext~")));
    }

    #[test]
    fn test_rejects_forbidden_directories() {
        let filter = PathFilter::new();
        assert!(!filter.accept(Path::new("__pycache__")));
        assert!(!filter.accept(Path::new("pkg/__pycache__/helper.ext")));
        assert!(!filter.accept(Path::new(".mypy_cache/3.11/x.json")));
    }

    #[test]
    fn test_rejects_hashed_names() {
        let filter = PathFilter::new();
        assert!(!filter.accept(Path::new("bundle.3f9a0c1d2e.ext")));
        assert!(!filter.accept(Path::new("build-deadbeefcafe/out.ext")));
        // seven hex digits are not enough
        assert!(filter.accept(Path::new("abc1234.ext")));
        // uppercase is not treated as a hash
        assert!(filter.accept(Path::new("DEADBEEFCAFE.ext")));
    }

    #[test]
    fn test_hash_check_can_be_disabled() {
        let filter = PathFilter::new().without_hash_check();
        assert!(filter.accept(Path::new("bundle.3f9a0c1d2e.ext")));
    }

    #[test]
    fn test_user_rules() {
        let rules = IgnoreRules {
            suffixes: vec![".orig".to_string()],
            names: vec!["node_modules".to_string()],
            hashed_names: true,
        };
        let filter = PathFilter::from_rules(&rules);
        assert!(!filter.accept(Path::new("greet.ext.orig")));
        assert!(!filter.accept(Path::new("pkg/node_modules/x.ext")));
        assert!(filter.accept(Path::new("pkg/x.ext")));
    }
}
