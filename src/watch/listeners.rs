// src/watch/listeners.rs

//! Listener registry for watcher events.
//!
//! Registration and removal take the registry's lock in write mode and
//! dispatch takes it in read mode, so the listener set never changes while an
//! event is being delivered. Listeners must therefore not call `on`/`off` and
//! wait for the result from inside their own invocation; `once` deregisters
//! from a detached task for that reason.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::sync::ReadWriteLock;
use crate::watch::FsEvent;

/// Handle returned by registration; pass it to [`ListenerSet::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type ListenerFn = Arc<dyn Fn(FsEvent) -> BoxFuture + Send + Sync>;

pub struct ListenerSet {
    lock: ReadWriteLock,
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<ListenerId, ListenerFn>>,
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("lock", &self.lock)
            .field("listeners", &self.listeners.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ListenerSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lock: ReadWriteLock::new(),
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(BTreeMap::new()),
        })
    }

    /// Register `listener` for every dispatched event.
    pub async fn on<F, Fut>(&self, listener: F) -> ListenerId
    where
        F: Fn(FsEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.allocate_id();
        let listener: ListenerFn =
            Arc::new(move |event: FsEvent| -> BoxFuture { Box::pin(listener(event)) });
        self.lock
            .write(move || async move { self.insert(id, listener) })
            .await;
        id
    }

    /// Register `listener` for the next dispatched event only.
    ///
    /// It is removed before it runs, so an event dispatched concurrently
    /// with the first one cannot reach it a second time.
    pub async fn once<F, Fut>(self: &Arc<Self>, listener: F) -> ListenerId
    where
        F: FnOnce(FsEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.allocate_id();
        let set: Weak<Self> = Arc::downgrade(self);
        let slot = Mutex::new(Some(listener));

        let wrapper: ListenerFn = Arc::new(move |event: FsEvent| -> BoxFuture {
            let Some(listener) = slot.lock().take() else {
                return Box::pin(async {});
            };
            let set = set.clone();
            Box::pin(async move {
                tokio::spawn(async move {
                    if let Some(set) = set.upgrade() {
                        set.off(id).await;
                    }
                    listener(event).await;
                });
            })
        });

        self.lock
            .write(move || async move { self.insert(id, wrapper) })
            .await;
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub async fn off(&self, id: ListenerId) -> bool {
        self.lock
            .write(|| async {
                let removed = self.listeners.lock().remove(&id).is_some();
                if removed {
                    debug!(listener = %id, "listener removed");
                }
                removed
            })
            .await
    }

    /// Deliver `event` to every registered listener, in registration order.
    pub async fn dispatch(&self, event: FsEvent) {
        let _guard = self.lock.acquire_read().await;

        let listeners: Vec<(ListenerId, ListenerFn)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        trace!(
            kind = ?event.kind,
            listeners = listeners.len(),
            "dispatching event"
        );

        for (id, listener) in listeners {
            trace!(listener = %id, "notifying listener");
            listener(event.clone()).await;
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    fn allocate_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn insert(&self, id: ListenerId, listener: ListenerFn) {
        self.listeners.lock().insert(id, listener);
        debug!(listener = %id, "listener registered");
    }
}
