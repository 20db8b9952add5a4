// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::LogLevel;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// root = "."
/// paths = ["content", "templates"]
/// recursive = true
/// exclude = ["dist/**", "**/*.swp"]
///
/// [log]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Filesystem watcher settings from `[watch]`.
    #[serde(default)]
    pub watch: WatchSection,

    /// Logging settings from `[log]`.
    #[serde(default)]
    pub log: LogSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Base directory. Relative `paths` and all `exclude` patterns are
    /// interpreted relative to it.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Paths to observe.
    #[serde(default = "default_paths")]
    pub paths: Vec<PathBuf>,

    /// Watch subdirectories too.
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Glob patterns for paths whose changes are never dispatched.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_recursive() -> bool {
    true
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            paths: default_paths(),
            recursive: default_recursive(),
            exclude: Vec::new(),
        }
    }
}

impl WatchSection {
    /// Watched paths with relative entries joined onto `root`.
    pub fn resolved_paths(&self) -> Vec<PathBuf> {
        self.paths
            .iter()
            .map(|p| resolve_against(&self.root, p))
            .collect()
    }
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogSection {
    /// If unset, `ARISA_LOG` or the built-in default decides.
    #[serde(default)]
    pub level: Option<LogLevel>,
}

/// A validated configuration.
///
/// Only obtainable through [`TryFrom<RawConfigFile>`] (or `Default`), so code
/// receiving a `ConfigFile` can rely on the checks in `config::validate`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub log: LogSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection, log: LogSection) -> Self {
        Self { watch, log }
    }
}
