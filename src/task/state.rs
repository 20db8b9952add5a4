// src/task/state.rs

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::errors::TaskError;

/// Result of one run of a task's work, shared by everyone awaiting it.
pub(crate) type Outcome<V> = Result<V, TaskError>;

/// Per-task computation state (internal).
pub(crate) enum TaskState<V> {
    /// Nothing cached; the next read runs the work.
    Uncomputed,
    /// A run is in flight. Later readers await the same cell instead of
    /// starting another run.
    Pending(Arc<OnceCell<Outcome<V>>>),
    /// The last run succeeded.
    Ready(V),
}

impl<V> TaskState<V> {
    pub(crate) fn phase(&self) -> TaskPhase {
        match self {
            TaskState::Uncomputed => TaskPhase::Uncomputed,
            TaskState::Pending(_) => TaskPhase::Pending,
            TaskState::Ready(_) => TaskPhase::Ready,
        }
    }
}

/// Public, read-only view of a task's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Uncomputed,
    Pending,
    Ready,
}
