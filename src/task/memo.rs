// src/task/memo.rs

//! Memoized task node.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, trace, warn};

use crate::errors::TaskError;
use crate::task::state::{Outcome, TaskPhase, TaskState};
use crate::task::{TaskGraph, TaskId, Version};

/// The computation behind a [`Memo`].
///
/// `Info` is the payload carried by invalidations; every task in one
/// dependency chain shares the same `Info` type.
pub trait Work: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;
    type Info: Send + Sync + 'static;

    /// Produce the task's value.
    ///
    /// Upstream values must be read through [`WorkCx::result_from`], which
    /// records the dependency so that invalidating the upstream task also
    /// invalidates this one. Calling `get_result`/`update` on tasks of the
    /// same graph from here would wait on the lock this computation already
    /// holds.
    fn work(
        &self,
        cx: &WorkCx<'_, Self::Info>,
    ) -> impl Future<Output = anyhow::Result<Self::Value>> + Send;
}

/// Receiver of invalidations from an upstream task.
pub(crate) trait Invalidate<M>: Send + Sync {
    /// `wave` identifies the change being propagated; a task reached twice
    /// by the same wave (e.g. through both sides of a diamond) only reacts
    /// once.
    fn invalidate(&self, version: Version, wave: u64, info: &M) -> bool;
}

/// A one-shot registration on a task, consumed by its next accepted update.
enum Subscriber<M> {
    Callback(Box<dyn FnOnce(Version, &M) + Send>),
    Task {
        id: TaskId,
        task: Weak<dyn Invalidate<M>>,
    },
}

impl<M> Subscriber<M> {
    fn task_id(&self) -> Option<TaskId> {
        match self {
            Subscriber::Task { id, .. } => Some(*id),
            Subscriber::Callback(_) => None,
        }
    }
}

/// Context handed to [`Work::work`].
///
/// It only exists while the graph's lock is held in read mode on behalf of
/// the running computation.
pub struct WorkCx<'a, M> {
    graph: &'a Arc<TaskGraph>,
    task: TaskId,
    subscriber: Weak<dyn Invalidate<M>>,
}

impl<M> fmt::Debug for WorkCx<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkCx").field("task", &self.task).finish()
    }
}

impl<M: Send + Sync + 'static> WorkCx<'_, M> {
    /// The task being computed.
    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        self.graph
    }

    /// Read `upstream`'s value and subscribe the running task to it.
    ///
    /// The subscription is one-shot: once `upstream` is invalidated the
    /// running task is invalidated too, and must call `result_from` again on
    /// its next computation to keep observing `upstream`.
    ///
    /// # Panics
    ///
    /// If `upstream` belongs to a different [`TaskGraph`].
    pub async fn result_from<U>(&self, upstream: &Arc<Memo<U>>) -> Result<U::Value, TaskError>
    where
        U: Work<Info = M>,
    {
        assert!(
            Arc::ptr_eq(self.graph, &upstream.graph),
            "task {} cannot depend on task {} from another task graph",
            self.task,
            upstream.id
        );

        self.graph.link(self.task, upstream.id)?;
        upstream.subscribe(Subscriber::Task {
            id: self.task,
            task: self.subscriber.clone(),
        });

        // Boxed: a task type may depend on other instances of itself.
        let computation: Pin<Box<dyn Future<Output = Outcome<U::Value>> + Send + '_>> =
            Box::pin(upstream.compute());
        computation.await
    }
}

struct MemoInner<V, M> {
    version: Version,
    /// Last propagation wave that reached this task.
    wave: u64,
    state: TaskState<V>,
    subscribers: Vec<Subscriber<M>>,
}

/// A lazily computed, cached value with subscriber-driven invalidation.
///
/// Created with [`Memo::new`] and always shared through an `Arc`, because
/// downstream tasks subscribe to it with a weak back-reference.
pub struct Memo<W: Work> {
    id: TaskId,
    graph: Arc<TaskGraph>,
    me: Weak<Memo<W>>,
    work: W,
    inner: Mutex<MemoInner<W::Value, W::Info>>,
}

impl<W: Work> fmt::Debug for Memo<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Memo")
            .field("id", &self.id)
            .field("version", &inner.version)
            .field("phase", &inner.state.phase())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<W: Work> Memo<W> {
    pub fn new(graph: &Arc<TaskGraph>, work: W) -> Arc<Self> {
        let id = graph.allocate_id();
        let version = graph.current_version();
        debug!(task = %id, %version, "task created");

        Arc::new_cyclic(|me| Memo {
            id,
            graph: Arc::clone(graph),
            me: me.clone(),
            work,
            inner: Mutex::new(MemoInner {
                version,
                wave: 0,
                state: TaskState::Uncomputed,
                subscribers: Vec::new(),
            }),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    /// The task's [`Work`] implementation.
    pub fn work_ref(&self) -> &W {
        &self.work
    }

    pub fn phase(&self) -> TaskPhase {
        self.inner.lock().state.phase()
    }

    /// Version of the last accepted invalidation (or of creation).
    pub fn version(&self) -> Version {
        self.inner.lock().version
    }

    /// Number of one-shot subscriptions waiting for the next invalidation.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Get the task's value and register `on_invalidate` to be called once,
    /// at the next accepted invalidation.
    ///
    /// Runs under the graph's read lock: concurrent reads proceed together,
    /// but never overlap an `update`. The work runs at most once per
    /// invalidation no matter how many callers are waiting; a failure is
    /// delivered to all of them and is not cached.
    pub async fn get_result<F>(&self, on_invalidate: F) -> Result<W::Value, TaskError>
    where
        F: FnOnce(Version, &W::Info) + Send + 'static,
    {
        let _guard = self.graph.lock().acquire_read().await;
        self.subscribe(Subscriber::Callback(Box::new(on_invalidate)));
        self.compute().await
    }

    /// Like [`get_result`](Self::get_result), without subscribing.
    pub async fn get(&self) -> Result<W::Value, TaskError> {
        let _guard = self.graph.lock().acquire_read().await;
        self.compute().await
    }

    /// Invalidate this task (and, transitively, its subscribers) with a
    /// freshly issued version.
    ///
    /// Returns whether the invalidation was accepted.
    pub async fn update(&self, info: W::Info) -> bool {
        let _guard = self.graph.lock().acquire_write().await;
        let version = self.graph.next_version();
        self.invalidate_at(version, &info)
    }

    /// Invalidate with a version issued earlier by
    /// [`TaskGraph::next_version`].
    ///
    /// Ignored (returns `false`) unless `version` is strictly newer than the
    /// last version this task accepted. Once accepted, every dependent is
    /// invalidated regardless of the versions it has seen.
    pub async fn update_at(&self, version: Version, info: W::Info) -> bool {
        let _guard = self.graph.lock().acquire_write().await;
        self.invalidate_at(version, &info)
    }

    fn subscribe(&self, subscriber: Subscriber<W::Info>) {
        let mut inner = self.inner.lock();

        if let Some(id) = subscriber.task_id() {
            if inner.subscribers.iter().any(|s| s.task_id() == Some(id)) {
                trace!(task = %self.id, subscriber = %id, "already subscribed");
                return;
            }
        }

        inner.subscribers.push(subscriber);
    }

    async fn compute(&self) -> Outcome<W::Value> {
        let cell = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match &inner.state {
                TaskState::Ready(value) => return Ok(value.clone()),
                TaskState::Pending(cell) => Arc::clone(cell),
                TaskState::Uncomputed => {
                    let cell = Arc::new(OnceCell::new());
                    inner.state = TaskState::Pending(Arc::clone(&cell));
                    cell
                }
            }
        };

        let outcome = cell.get_or_init(|| self.run_work()).await.clone();
        self.settle(&cell, &outcome);
        outcome
    }

    async fn run_work(&self) -> Outcome<W::Value> {
        let subscriber: Weak<dyn Invalidate<W::Info>> = self.me.clone();
        let cx = WorkCx {
            graph: &self.graph,
            task: self.id,
            subscriber,
        };

        debug!(task = %self.id, "running task work");
        match self.work.work(&cx).await {
            Ok(value) => {
                debug!(task = %self.id, "task work finished");
                Ok(value)
            }
            Err(err) => {
                warn!(task = %self.id, error = %format!("{err:#}"), "task work failed");
                // Edges added by the failed run must not turn a retry into a
                // false cycle.
                self.graph.clear_dependencies(self.id);
                Err(match err.downcast::<TaskError>() {
                    Ok(cycle @ TaskError::Cycle { .. }) => cycle,
                    Ok(other) => TaskError::failed(self.id, other.into()),
                    Err(err) => TaskError::failed(self.id, err),
                })
            }
        }
    }

    /// Move a finished run out of `Pending`, unless an invalidation or an
    /// earlier waiter already did.
    fn settle(&self, cell: &Arc<OnceCell<Outcome<W::Value>>>, outcome: &Outcome<W::Value>) {
        let mut inner = self.inner.lock();

        let current = match &inner.state {
            TaskState::Pending(current) => current,
            _ => return,
        };
        if !Arc::ptr_eq(current, cell) {
            return;
        }

        inner.state = match outcome {
            Ok(value) => TaskState::Ready(value.clone()),
            Err(_) => TaskState::Uncomputed,
        };
    }

    /// Direct invalidation: only accepted if `version` is strictly newer
    /// than the last version this task accepted.
    fn invalidate_at(&self, version: Version, info: &W::Info) -> bool {
        let wave = self.graph.next_wave();
        let subscribers = {
            let mut inner = self.inner.lock();
            if version <= inner.version {
                debug!(
                    task = %self.id,
                    %version,
                    current = %inner.version,
                    "ignoring stale invalidation"
                );
                return false;
            }
            inner.version = version;
            inner.wave = wave;
            std::mem::take(&mut inner.subscribers)
        };

        info!(
            task = %self.id,
            %version,
            subscribers = subscribers.len(),
            "invalidating task"
        );
        self.notify(subscribers, version, wave, info);
        true
    }

    /// Invalidation delivered by an upstream task that accepted a change.
    ///
    /// Not version-checked; only a repeat of the same wave is ignored.
    fn invalidate_from_upstream(&self, version: Version, wave: u64, info: &W::Info) -> bool {
        let subscribers = {
            let mut inner = self.inner.lock();
            if inner.wave == wave {
                trace!(task = %self.id, wave, "already invalidated by this change");
                return false;
            }
            inner.version = inner.version.max(version);
            inner.wave = wave;
            std::mem::take(&mut inner.subscribers)
        };

        debug!(
            task = %self.id,
            %version,
            subscribers = subscribers.len(),
            "invalidated by upstream task"
        );
        self.notify(subscribers, version, wave, info);
        true
    }

    /// Consume the one-shot subscriptions and drop the cached value.
    fn notify(
        &self,
        subscribers: Vec<Subscriber<W::Info>>,
        version: Version,
        wave: u64,
        info: &W::Info,
    ) {
        for subscriber in subscribers {
            match subscriber {
                Subscriber::Callback(callback) => callback(version, info),
                Subscriber::Task { id, task } => {
                    self.graph.unlink(id, self.id);
                    match task.upgrade() {
                        Some(task) => {
                            task.invalidate(version, wave, info);
                        }
                        None => trace!(task = %self.id, subscriber = %id, "subscriber dropped"),
                    }
                }
            }
        }

        self.inner.lock().state = TaskState::Uncomputed;
    }
}

impl<W: Work> Invalidate<W::Info> for Memo<W> {
    fn invalidate(&self, version: Version, wave: u64, info: &W::Info) -> bool {
        self.invalidate_from_upstream(version, wave, info)
    }
}

impl<W: Work> Drop for Memo<W> {
    fn drop(&mut self) {
        self.graph.forget(self.id);
    }
}
