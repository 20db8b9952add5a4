// src/artifact.rs

//! Artifacts stored in the virtual namespace.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::Result;

/// An in-memory file: contents plus where they came from.
///
/// The content digest (blake3, hex) is computed once at construction and
/// serves as a cheap identity for comparing artifacts.
#[derive(Clone, PartialEq, Eq)]
pub struct VFile {
    source: Option<PathBuf>,
    contents: Vec<u8>,
    digest: String,
}

impl fmt::Debug for VFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VFile")
            .field("source", &self.source)
            .field("len", &self.contents.len())
            .field("digest", &self.digest)
            .finish()
    }
}

impl VFile {
    /// An artifact produced in memory.
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        let contents = contents.into();
        let digest = content_digest(&contents);
        Self {
            source: None,
            contents,
            digest,
        }
    }

    /// An artifact derived from the file at `source`.
    pub fn with_source(source: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new(contents)
        }
    }

    /// Read a file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        debug!(?path, len = contents.len(), "loaded file");
        Ok(Self::with_source(path, contents))
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Contents as UTF-8, if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.contents).ok()
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Hex-encoded blake3 digest of the contents.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn content_digest(contents: &[u8]) -> String {
    blake3::hash(contents).to_hex().to_string()
}
