// src/watch/watcher.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::config::WatchSection;
use crate::errors::Result;
use crate::task::{Memo, Work};
use crate::watch::{EventFilter, FsEvent, ListenerId, ListenerSet};

/// Filesystem watcher that fans events out to registered listeners.
///
/// Each incoming event is filtered and then dispatched on its own tokio task,
/// so a slow listener does not hold up the event loop. Dropping the watcher
/// (or calling [`close`](Self::close)) stops watching.
pub struct Watcher {
    listeners: Arc<ListenerSet>,
    daemon: Option<JoinHandle<()>>,
    backend: Option<RecommendedWatcher>,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("listeners", &self.listeners.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Watcher {
    /// Start watching the paths of a `[watch]` section.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(cfg: &WatchSection) -> Result<Self> {
        let filter = EventFilter::from_config(cfg)?;

        // Channel from the blocking notify callback into the async world.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<FsEvent>();

        let mut backend = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Err(err) = event_tx.send(FsEvent::from(event)) {
                        // Not inside the runtime here; tracing may not be wired up.
                        eprintln!("arisa: failed to forward notify event: {err}");
                    }
                }
                Err(err) => {
                    eprintln!("arisa: file watch error: {err}");
                }
            },
            Config::default(),
        )?;

        let mode = if cfg.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        for path in cfg.resolved_paths() {
            let path = path.canonicalize().unwrap_or(path);
            backend.watch(&path, mode)?;
            info!(?path, recursive = cfg.recursive, "file watcher started");
        }

        let mut watcher = Self::from_receiver(event_rx, filter);
        watcher.backend = Some(backend);
        Ok(watcher)
    }

    /// Run the event loop over an existing event source instead of the OS
    /// watcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_receiver(
        mut events: mpsc::UnboundedReceiver<FsEvent>,
        filter: EventFilter,
    ) -> Self {
        let listeners = ListenerSet::new();
        let loop_listeners = Arc::clone(&listeners);

        let daemon = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(event) = filter.apply(event) else {
                    trace!("event dropped by exclude filter");
                    continue;
                };

                debug!(kind = ?event.kind, paths = ?event.paths, "received fs event");
                let listeners = Arc::clone(&loop_listeners);
                tokio::spawn(async move { listeners.dispatch(event).await });
            }

            debug!("file watcher loop ended");
        });

        Self {
            listeners,
            daemon: Some(daemon),
            backend: None,
        }
    }

    pub fn listeners(&self) -> &Arc<ListenerSet> {
        &self.listeners
    }

    /// See [`ListenerSet::on`].
    pub async fn on<F, Fut>(&self, listener: F) -> ListenerId
    where
        F: Fn(FsEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.listeners.on(listener).await
    }

    /// See [`ListenerSet::once`].
    pub async fn once<F, Fut>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(FsEvent) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.listeners.once(listener).await
    }

    /// See [`ListenerSet::off`].
    pub async fn off(&self, id: ListenerId) -> bool {
        self.listeners.off(id).await
    }

    /// Invalidate `task` whenever a modifying event touches `scope` (a file,
    /// or a directory and everything below it).
    ///
    /// The listener holds the task weakly; once the task is dropped the
    /// listener does nothing.
    pub async fn invalidate_on_change<W>(
        &self,
        task: &Arc<Memo<W>>,
        scope: impl Into<PathBuf>,
    ) -> ListenerId
    where
        W: Work<Info = FsEvent>,
    {
        let scope = scope.into();
        let scope = scope.canonicalize().unwrap_or(scope);
        let task = Arc::downgrade(task);

        debug!(?scope, "invalidating task on change");
        self.on(move |event: FsEvent| {
            let task = task.clone();
            let scope = scope.clone();
            async move {
                if !event.is_mutation() || !event.touches(&scope) {
                    return;
                }
                if let Some(task) = task.upgrade() {
                    let accepted = task.update(event).await;
                    trace!(task = %task.id(), accepted, "change invalidated task");
                }
            }
        })
        .await
    }

    pub fn is_closed(&self) -> bool {
        self.daemon.is_none()
    }

    /// Stop watching. Dispatches already in flight run to completion.
    pub fn close(&mut self) {
        let backend = self.backend.take();
        let Some(daemon) = self.daemon.take() else {
            return;
        };

        drop(backend);
        daemon.abort();
        info!("file watcher closed");
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.close();
    }
}
