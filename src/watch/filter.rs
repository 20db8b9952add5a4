// src/watch/filter.rs

//! Path exclusion for watcher events.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::trace;

use crate::config::WatchSection;
use crate::errors::Result;
use crate::watch::FsEvent;

/// Compile glob patterns into one set.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    // Helps where the same directory is reachable under different absolute
    // prefixes (e.g. macOS /private/var).
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

/// Drops event paths matching the configured `exclude` globs.
///
/// Patterns are matched against paths relative to `root`; paths outside
/// `root` are never excluded.
#[derive(Debug, Clone)]
pub struct EventFilter {
    root: PathBuf,
    exclude: Option<GlobSet>,
}

impl EventFilter {
    pub fn new(root: impl Into<PathBuf>, exclude: &[String]) -> Result<Self> {
        let root = root.into();
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };
        Ok(Self { root, exclude })
    }

    /// A filter that lets every event through.
    pub fn allow_all() -> Self {
        Self {
            root: PathBuf::from("."),
            exclude: None,
        }
    }

    /// Build from `[watch]`, anchoring patterns at the canonical root.
    pub fn from_config(cfg: &WatchSection) -> Result<Self> {
        let root = cfg.root.canonicalize().unwrap_or_else(|_| cfg.root.clone());
        Self::new(root, &cfg.exclude)
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let Some(exclude) = &self.exclude else {
            return false;
        };
        match relative_str(&self.root, path) {
            Some(rel) => exclude.is_match(rel.as_str()),
            None => false,
        }
    }

    /// Remove excluded paths; `None` if nothing is left.
    pub fn apply(&self, mut event: FsEvent) -> Option<FsEvent> {
        if self.exclude.is_none() {
            return Some(event);
        }

        event.paths.retain(|p| {
            let excluded = self.is_excluded(p);
            if excluded {
                trace!(path = ?p, "path excluded from dispatch");
            }
            !excluded
        });

        if event.paths.is_empty() {
            None
        } else {
            Some(event)
        }
    }
}
