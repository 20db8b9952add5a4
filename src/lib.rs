// src/lib.rs

//! Incremental build primitives: an async reader/writer lock, memoized tasks
//! with dependency-driven invalidation, a virtual namespace for artifacts, and
//! a filesystem watcher that feeds invalidations into the task graph.

pub mod artifact;
pub mod config;
pub mod errors;
pub mod logging;
pub mod sync;
pub mod task;
pub mod types;
pub mod vtree;
pub mod watch;

use std::path::Path;

use tracing::info;

pub use crate::artifact::VFile;
pub use crate::config::ConfigFile;
pub use crate::errors::{ArisaError, Result, TaskError};
pub use crate::sync::ReadWriteLock;
pub use crate::task::{Memo, SourceFile, TaskGraph, TaskId, Version, Work, WorkCx};
pub use crate::vtree::{ArtifactTree, Dirent, Entry, VDir};
pub use crate::watch::{FsEvent, FsEventKind, ListenerId, Watcher};

use crate::config::load_and_validate;

/// Load the config at `config_path` and start a watcher for its `[watch]`
/// section.
///
/// A relative `root` in the file is taken relative to the file's directory.
/// Logging is left to the caller (see [`logging::init_logging`] with
/// `cfg.log.level`). Must be called from within a tokio runtime.
pub fn start_watcher(config_path: &Path) -> Result<(ConfigFile, Watcher)> {
    let cfg = load_and_validate(config_path)?;
    let watcher = Watcher::spawn(&cfg.watch)?;
    info!(config = ?config_path, root = ?cfg.watch.root, "watching project");
    Ok((cfg, watcher))
}
