#![allow(dead_code)]

use std::path::PathBuf;

use arisa::config::{ConfigFile, LogSection, RawConfigFile, WatchSection};
use arisa::types::LogLevel;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    /// Starts with no watched paths; add some with [`with_path`](Self::with_path).
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                watch: WatchSection {
                    paths: Vec::new(),
                    ..WatchSection::default()
                },
                log: LogSection::default(),
            },
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.watch.root = root.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.watch.paths.push(path.into());
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn recursive(mut self, val: bool) -> Self {
        self.config.watch.recursive = val;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.log.level = Some(level);
        self
    }

    /// The unvalidated config, for testing validation itself.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
