// src/sync/mod.rs

//! Concurrency primitives shared by the task graph and the watcher.

pub mod lock;

pub use lock::{LockState, ReadGuard, ReadWriteLock, WriteGuard};
