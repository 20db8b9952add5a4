// src/vtree/mod.rs

//! Virtual namespace: a tree of directories holding artifacts and aliases,
//! addressed by slash-delimited paths.
//!
//! - [`path`] parses path strings into segments.
//! - [`node`] holds [`VDir`], the directory node, and [`Dirent`], the
//!   entries it stores.
//!
//! Directories own their children; a child only keeps a weak link to its
//! parent, used for `..` and for finding the root of an absolute path.

use std::sync::Arc;

use crate::artifact::VFile;

pub mod node;
pub mod path;

pub use node::{Dirent, Entry, VDir};
pub use path::{Segment, VPath};

/// Namespace of build artifacts keyed by output path.
pub type ArtifactTree = VDir<Arc<VFile>>;
