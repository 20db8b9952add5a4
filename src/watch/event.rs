// src/watch/event.rs

use std::path::{Path, PathBuf};

/// What happened to the paths of an [`FsEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// The backend could not tell.
    Any,
    /// Read or open without modification.
    Access,
    Create,
    Modify,
    Remove,
    Other,
}

impl From<&notify::EventKind> for FsEventKind {
    fn from(kind: &notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Any => FsEventKind::Any,
            notify::EventKind::Access(_) => FsEventKind::Access,
            notify::EventKind::Create(_) => FsEventKind::Create,
            notify::EventKind::Modify(_) => FsEventKind::Modify,
            notify::EventKind::Remove(_) => FsEventKind::Remove,
            notify::EventKind::Other => FsEventKind::Other,
        }
    }
}

/// A filesystem change delivered to watcher listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub paths: Vec<PathBuf>,
}

impl FsEvent {
    pub fn new<I, P>(kind: FsEventKind, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            kind,
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the event may have changed file contents or the tree shape.
    pub fn is_mutation(&self) -> bool {
        self.kind != FsEventKind::Access
    }

    /// Whether any path of the event is `scope` or lies below it.
    pub fn touches(&self, scope: &Path) -> bool {
        self.paths.iter().any(|p| p.starts_with(scope))
    }
}

impl From<notify::Event> for FsEvent {
    fn from(event: notify::Event) -> Self {
        Self {
            kind: FsEventKind::from(&event.kind),
            paths: event.paths,
        }
    }
}
