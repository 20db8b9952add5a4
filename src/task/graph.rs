// src/task/graph.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use tracing::{trace, warn};

use crate::errors::TaskError;
use crate::sync::ReadWriteLock;
use crate::task::{TaskId, Version};

/// State shared by all tasks that may depend on each other.
///
/// - One [`ReadWriteLock`] guards every task of the graph: reads of cached
///   values are shared, invalidations are exclusive.
/// - The version clock orders invalidations. Versions come from a counter,
///   never from wall-clock time, so two updates can never tie.
/// - Live dependency edges (`downstream -> upstream`) mirror the one-shot
///   task subscriptions and are used to refuse edges that would close a
///   cycle.
pub struct TaskGraph {
    lock: ReadWriteLock,
    clock: AtomicU64,
    waves: AtomicU64,
    next_id: AtomicU64,
    edges: Mutex<DiGraphMap<TaskId, ()>>,
}

impl fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraph")
            .field("lock", &self.lock)
            .field("version", &self.current_version())
            .field("edges", &self.edges.lock().edge_count())
            .finish()
    }
}

impl TaskGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lock: ReadWriteLock::new(),
            clock: AtomicU64::new(0),
            waves: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
            edges: Mutex::new(DiGraphMap::new()),
        })
    }

    /// The lock shared by every task in this graph.
    pub fn lock(&self) -> &ReadWriteLock {
        &self.lock
    }

    /// Latest version issued so far.
    pub fn current_version(&self) -> Version {
        Version(self.clock.load(Ordering::SeqCst))
    }

    /// Issue a new version, strictly newer than every version issued before.
    ///
    /// Root triggers (e.g. a watcher) can mint a version when an event is
    /// observed and pass it to [`Memo::update_at`](crate::task::Memo::update_at)
    /// later; an invalidation that arrives after a newer one is then ignored.
    pub fn next_version(&self) -> Version {
        Version(self.clock.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Upstream tasks `task` currently depends on.
    pub fn dependencies_of(&self, task: TaskId) -> Vec<TaskId> {
        self.edges
            .lock()
            .neighbors_directed(task, Direction::Outgoing)
            .collect()
    }

    /// Downstream tasks currently subscribed to `task`.
    pub fn dependents_of(&self, task: TaskId) -> Vec<TaskId> {
        self.edges
            .lock()
            .neighbors_directed(task, Direction::Incoming)
            .collect()
    }

    /// Identifier of one accepted change as it propagates to dependents.
    /// Never 0, which marks a task no change has reached yet.
    pub(crate) fn next_wave(&self) -> u64 {
        self.waves.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn allocate_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Record that `downstream` reads `upstream`.
    ///
    /// Fails if `upstream` already (transitively) depends on `downstream`.
    pub(crate) fn link(&self, downstream: TaskId, upstream: TaskId) -> Result<(), TaskError> {
        let mut edges = self.edges.lock();

        if downstream == upstream || has_path_connecting(&*edges, upstream, downstream, None) {
            warn!(
                downstream = %downstream,
                upstream = %upstream,
                "refusing dependency edge that would close a cycle"
            );
            return Err(TaskError::Cycle {
                downstream,
                upstream,
            });
        }

        edges.add_edge(downstream, upstream, ());
        trace!(downstream = %downstream, upstream = %upstream, "dependency edge added");
        Ok(())
    }

    pub(crate) fn unlink(&self, downstream: TaskId, upstream: TaskId) {
        self.edges.lock().remove_edge(downstream, upstream);
    }

    /// Drop every edge from `downstream` to its upstream tasks.
    pub(crate) fn clear_dependencies(&self, downstream: TaskId) {
        let mut edges = self.edges.lock();
        let upstream: Vec<TaskId> = edges
            .neighbors_directed(downstream, Direction::Outgoing)
            .collect();
        for up in upstream {
            edges.remove_edge(downstream, up);
        }
    }

    /// Drop every edge touching a task that no longer exists.
    pub(crate) fn forget(&self, task: TaskId) {
        self.edges.lock().remove_node(task);
    }
}
