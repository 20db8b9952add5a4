// src/sync/lock.rs

//! Multi-reader / single-writer lock with writer priority.
//!
//! The lock is one state machine:
//!
//! - `state` is `Free`, `Reading(n)` (n active readers) or `Writing`.
//! - `writers` is a FIFO of writers waiting for exclusive access.
//! - `readers` holds readers that arrived while a writer was waiting or
//!   writing.
//!
//! Grants are handed over by the releasing side: when the lock becomes free
//! the next writer is moved straight into `Writing`, and only once no writer
//! is queued are all waiting readers admitted together. A queued writer
//! therefore blocks every reader that arrives after it, while readers that
//! were already running finish undisturbed.
//!
//! The closure-style [`ReadWriteLock::read`] / [`ReadWriteLock::write`] do not
//! inspect the protected state; they only serialize the caller's code.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Observable state of a [`ReadWriteLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Free,
    /// Number of readers currently holding the lock.
    Reading(usize),
    Writing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

struct LockInner {
    state: LockState,
    writers: VecDeque<oneshot::Sender<()>>,
    readers: Vec<oneshot::Sender<()>>,
}

impl LockInner {
    /// Hand the lock to whoever is next in line.
    ///
    /// Must be called after every transition that may have made room:
    /// releases and abandoned waits.
    fn dispatch(&mut self) {
        if self.state == LockState::Free {
            while let Some(writer) = self.writers.pop_front() {
                // A closed receiver belongs to an abandoned wait.
                if writer.send(()).is_ok() {
                    self.state = LockState::Writing;
                    trace!("lock handed to next writer");
                    return;
                }
            }
        }

        if self.writers.is_empty() && self.state != LockState::Writing {
            self.admit_readers();
        }
    }

    fn admit_readers(&mut self) {
        if self.readers.is_empty() {
            return;
        }

        let mut admitted = 0;
        for reader in self.readers.drain(..) {
            if reader.send(()).is_ok() {
                admitted += 1;
            }
        }

        if admitted > 0 {
            self.state = match self.state {
                LockState::Reading(n) => LockState::Reading(n + admitted),
                _ => LockState::Reading(admitted),
            };
            trace!(admitted, "admitted waiting readers");
        }
    }
}

/// Reader/writer lock for async code.
///
/// Many readers may hold the lock at once; a writer holds it alone. Writers
/// are served first-come-first-served and take priority over readers that
/// arrive while any writer is waiting.
pub struct ReadWriteLock {
    inner: Mutex<LockInner>,
}

impl fmt::Debug for ReadWriteLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ReadWriteLock")
            .field("state", &inner.state)
            .field("waiting_writers", &inner.writers.len())
            .field("waiting_readers", &inner.readers.len())
            .finish()
    }
}

impl Default for ReadWriteLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadWriteLock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LockInner {
                state: LockState::Free,
                writers: VecDeque::new(),
                readers: Vec::new(),
            }),
        }
    }

    /// Current state of the lock.
    pub fn state(&self) -> LockState {
        self.inner.lock().state
    }

    /// Number of writers queued for exclusive access.
    pub fn waiting_writers(&self) -> usize {
        self.inner.lock().writers.len()
    }

    /// Wait for shared access.
    ///
    /// Yields to every writer that is already waiting; joins the running
    /// readers immediately otherwise.
    pub async fn acquire_read(&self) -> ReadGuard<'_> {
        let rx = {
            let mut inner = self.inner.lock();
            let admissible = inner.writers.is_empty()
                && matches!(inner.state, LockState::Free | LockState::Reading(_));

            if admissible {
                inner.state = match inner.state {
                    LockState::Reading(n) => LockState::Reading(n + 1),
                    _ => LockState::Reading(1),
                };
                None
            } else {
                let (tx, rx) = oneshot::channel();
                inner.readers.push(tx);
                Some(rx)
            }
        };

        if let Some(rx) = rx {
            trace!("reader waiting behind writer");
            Waiter::new(self, rx, Access::Read).granted().await;
        }

        ReadGuard { lock: self }
    }

    /// Wait for exclusive access.
    pub async fn acquire_write(&self) -> WriteGuard<'_> {
        let rx = {
            let mut inner = self.inner.lock();

            if inner.state == LockState::Free && inner.writers.is_empty() {
                inner.state = LockState::Writing;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                inner.writers.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = rx {
            debug!("writer queued for exclusive access");
            Waiter::new(self, rx, Access::Write).granted().await;
        }

        WriteGuard { lock: self }
    }

    /// Run `action` with shared access and return its output.
    pub async fn read<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire_read().await;
        action().await
    }

    /// Run `action` with exclusive access and return its output.
    pub async fn write<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire_write().await;
        action().await
    }

    fn release(&self, access: Access) {
        let mut inner = self.inner.lock();

        match (access, inner.state) {
            (Access::Read, LockState::Reading(n)) if n > 1 => {
                inner.state = LockState::Reading(n - 1);
                return;
            }
            (Access::Read, LockState::Reading(_)) | (Access::Write, LockState::Writing) => {
                inner.state = LockState::Free;
            }
            (access, state) => {
                unreachable!("released {access:?} access while lock is {state:?}");
            }
        }

        inner.dispatch();
    }

    /// Drop queued waiters whose futures were abandoned, then let the queue
    /// move on (a cancelled writer may have been the only thing holding back
    /// readers).
    fn prune(&self) {
        let mut inner = self.inner.lock();
        inner.writers.retain(|tx| !tx.is_closed());
        inner.readers.retain(|tx| !tx.is_closed());
        inner.dispatch();
    }
}

/// Pending grant for a queued acquire.
///
/// If the acquiring future is dropped before observing its grant, the grant
/// (if one raced in) is released and the queue is cleaned up.
struct Waiter<'a> {
    lock: &'a ReadWriteLock,
    rx: oneshot::Receiver<()>,
    access: Access,
    done: bool,
}

impl<'a> Waiter<'a> {
    fn new(lock: &'a ReadWriteLock, rx: oneshot::Receiver<()>, access: Access) -> Self {
        Self {
            lock,
            rx,
            access,
            done: false,
        }
    }

    async fn granted(mut self) {
        // Senders are only dropped after sending or once this receiver is
        // closed, so the wait always ends in a grant.
        let _ = (&mut self.rx).await;
        self.done = true;
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        self.rx.close();
        if self.rx.try_recv().is_ok() {
            debug!(access = ?self.access, "abandoned lock wait after grant; releasing");
            self.lock.release(self.access);
        } else {
            trace!(access = ?self.access, "abandoned lock wait");
            self.lock.prune();
        }
    }
}

/// Shared access to a [`ReadWriteLock`]; released on drop.
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a ReadWriteLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(Access::Read);
    }
}

impl fmt::Debug for ReadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGuard").finish_non_exhaustive()
    }
}

/// Exclusive access to a [`ReadWriteLock`]; released on drop.
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a ReadWriteLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(Access::Write);
    }
}

impl fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard").finish_non_exhaustive()
    }
}
