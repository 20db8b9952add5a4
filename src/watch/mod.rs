// src/watch/mod.rs

//! Filesystem watching.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`) and turning its
//!   events into [`FsEvent`]s.
//! - Dropping paths that match the configured `exclude` globs.
//! - Keeping the set of listeners and delivering each event to all of them.
//!
//! It does not know about artifacts; tasks are connected to it through
//! [`Watcher::invalidate_on_change`].

pub mod event;
pub mod filter;
pub mod listeners;
pub mod watcher;

pub use event::{FsEvent, FsEventKind};
pub use filter::{EventFilter, build_globset};
pub use listeners::{ListenerId, ListenerSet};
pub use watcher::Watcher;
