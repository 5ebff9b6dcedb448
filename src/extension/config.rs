// ! Extension reload configuration
// !
// ! Module handles the YAML configuration that tells the manager where
// ! extensions live and how hot reload should behave.

use crate::core::error::{ExtensionError, ExtensionResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hot reload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Watch roots; every direct child of a root is an extension boundary
    #[serde(
        default = "default_extension_paths",
        alias = "extensions_path",
        deserialize_with = "one_or_many"
    )]
    pub extension_paths: Vec<PathBuf>,

    /// Delay between two polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Watch the extension roots and reload on change
    #[serde(default)]
    pub hot_reload: bool,

    /// Hardcoded load list. When set, discovery and hot reload are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_list: Option<Vec<String>>,

    /// Built-in extensions loaded by `load_all` in addition to the load list
    #[serde(default)]
    pub included_extensions: Vec<String>,

    /// Source suffixes stripped when turning a file name into an extension id
    #[serde(default = "default_source_suffixes")]
    pub source_suffixes: Vec<String>,

    /// File stem of the entry file inside a directory extension
    #[serde(default = "default_entry_stem")]
    pub entry_stem: String,

    /// Extra ignore rules on top of the built-in path filter
    #[serde(default)]
    pub ignore: IgnoreRules,

    /// Wake the poller early on native filesystem events
    #[serde(default)]
    pub native_watch: bool,
}

/// User supplied additions to the path filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoreRules {
    /// Suffixes to ignore (e.g. `.orig`)
    #[serde(default)]
    pub suffixes: Vec<String>,

    /// Exact entry names to ignore (e.g. `node_modules`)
    #[serde(default)]
    pub names: Vec<String>,

    /// Keep the hashed-name heuristic on (default) or turn it off
    #[serde(default = "default_hashed_names")]
    pub hashed_names: bool,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            suffixes: Vec::new(),
            names: Vec::new(),
            hashed_names: true,
        }
    }
}

fn default_extension_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("./exts")]
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_source_suffixes() -> Vec<String> {
    vec!["ext".to_string()]
}

fn default_entry_stem() -> String {
    "__boot".to_string()
}

fn default_hashed_names() -> bool {
    true
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PathBuf),
        Many(Vec<PathBuf>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            extension_paths: default_extension_paths(),
            poll_interval_ms: default_poll_interval_ms(),
            hot_reload: false,
            load_list: None,
            included_extensions: Vec::new(),
            source_suffixes: default_source_suffixes(),
            entry_stem: default_entry_stem(),
            ignore: IgnoreRules::default(),
            native_watch: false,
        }
    }
}

impl ReloadConfig {
    /// Configuration watching a single root
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            extension_paths: vec![path.into()],
            ..Default::default()
        }
    }

    /// Add another watch root
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extension_paths.push(path.into());
        self
    }

    /// Set the poll interval, rounded down to whole milliseconds but never below one
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    /// Enable hot reload
    pub fn with_hot_reload(mut self) -> Self {
        self.hot_reload = true;
        self
    }

    /// Hardcode the load list
    pub fn with_load_list<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_list = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Whether the load list comes from configuration rather than discovery
    pub fn is_hardcoding_load_list(&self) -> bool {
        self.load_list.as_ref().is_some_and(|list| !list.is_empty())
    }

    /// Check the configuration for values the watcher cannot work with
    pub fn validate(&self) -> ExtensionResult<()> {
        if self.extension_paths.is_empty() {
            return Err(ExtensionError::config(
                "at least one extension path is required",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ExtensionError::config("poll_interval_ms must be positive"));
        }
        if self.entry_stem.is_empty() {
            return Err(ExtensionError::config("entry_stem must not be empty"));
        }
        if let Some(suffix) = self
            .source_suffixes
            .iter()
            .find(|s| s.is_empty() || s.starts_with('.'))
        {
            return Err(ExtensionError::config(format!(
                "source suffix {suffix:?} must be non-empty and given without a leading dot"
            )));
        }
        Ok(())
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> ExtensionResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub async fn from_file(path: impl AsRef<Path>) -> ExtensionResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to a YAML file
    pub async fn to_file(&self, path: impl AsRef<Path>) -> ExtensionResult<()> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
