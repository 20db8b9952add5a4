// src/task/mod.rs

//! Memoized tasks with dependency-driven invalidation.
//!
//! - [`graph`] holds the state shared by every task of one graph: the
//!   reader/writer lock, the version clock and the live dependency edges.
//! - [`memo`] contains [`Memo`], the cached computation node, and the
//!   [`Work`] trait concrete tasks implement.
//! - [`state`] is the per-task `Uncomputed -> Pending -> Ready` state machine.
//! - [`source`] provides a ready-made task that loads a file from disk.
//!
//! Reads (`get_result`, `get`) share the graph's lock; invalidations
//! (`update`) take it exclusively, so a cached value is never cleared while a
//! computation that depends on it is in flight.

use std::fmt;

pub mod graph;
pub mod memo;
pub mod source;
pub mod state;

pub use graph::TaskGraph;
pub use memo::{Memo, Work, WorkCx};
pub use source::SourceFile;
pub use state::TaskPhase;

/// Identity of a task within its [`TaskGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Logical timestamp of an invalidation.
///
/// Issued by [`TaskGraph::next_version`]; strictly increasing within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(pub(crate) u64);

impl Version {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
