// src/task/source.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::artifact::VFile;
use crate::task::{Work, WorkCx};
use crate::watch::FsEvent;

/// Leaf task that loads one file from disk.
///
/// Pair it with [`Watcher::invalidate_on_change`](crate::watch::Watcher::invalidate_on_change)
/// so edits to the file invalidate everything computed from it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Work for SourceFile {
    type Value = Arc<VFile>;
    type Info = FsEvent;

    async fn work(&self, _cx: &WorkCx<'_, FsEvent>) -> anyhow::Result<Arc<VFile>> {
        let file = VFile::load(&self.path)
            .await
            .with_context(|| format!("loading source file {:?}", self.path))?;
        Ok(Arc::new(file))
    }
}
