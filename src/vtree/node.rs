// src/vtree/node.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::vtree::path::{Segment, VPath};

/// An entry stored under a name in a [`VDir`].
#[derive(Clone)]
pub enum Dirent<T> {
    /// A subdirectory, owned by the directory holding this entry.
    Dir(Arc<VDir<T>>),
    /// An artifact.
    File(T),
    /// A path pointing elsewhere in the namespace. Not followed during
    /// resolution.
    Alias(String),
}

impl<T: fmt::Debug> fmt::Debug for Dirent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dirent::Dir(dir) => f.debug_tuple("Dir").field(&dir.path()).finish(),
            Dirent::File(value) => f.debug_tuple("File").field(value).finish(),
            Dirent::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
        }
    }
}

impl<T> Dirent<T> {
    pub fn is_dir(&self) -> bool {
        matches!(self, Dirent::Dir(_))
    }

    pub fn as_dir(&self) -> Option<&Arc<VDir<T>>> {
        match self {
            Dirent::Dir(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&T> {
        match self {
            Dirent::File(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_file(self) -> Option<T> {
        match self {
            Dirent::File(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_alias(&self) -> Option<&str> {
        match self {
            Dirent::Alias(target) => Some(target),
            _ => None,
        }
    }
}

/// What [`VDir::set`] stores.
#[derive(Debug, Clone)]
pub enum Entry<T> {
    File(T),
    Alias(String),
}

impl<T> From<Entry<T>> for Dirent<T> {
    fn from(entry: Entry<T>) -> Self {
        match entry {
            Entry::File(value) => Dirent::File(value),
            Entry::Alias(target) => Dirent::Alias(target),
        }
    }
}

/// Behaviour when a path walks through a name that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnMissing {
    Fail,
    CreateDir,
}

/// Where a path ends up.
enum Target<T> {
    /// The path names a directory itself (`/`, or a last segment of `.`/`..`).
    Dir(Arc<VDir<T>>),
    /// The path names key `name` inside `dir`, which may or may not exist.
    Entry { dir: Arc<VDir<T>>, name: String },
}

/// A directory node in the virtual namespace.
///
/// Always handled through `Arc`. Operations may be invoked on any node:
/// relative paths start there, absolute paths start at the ultimate root.
pub struct VDir<T> {
    name: String,
    parent: Mutex<Weak<VDir<T>>>,
    entries: RwLock<BTreeMap<String, Dirent<T>>>,
}

impl<T> fmt::Debug for VDir<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VDir")
            .field("path", &self.path())
            .field("entries", &self.entries.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> VDir<T> {
    /// An empty namespace.
    pub fn new_root() -> Arc<Self> {
        Arc::new(Self {
            name: String::new(),
            parent: Mutex::new(Weak::new()),
            entries: RwLock::new(BTreeMap::new()),
        })
    }

    fn new_child(name: &str, parent: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            parent: Mutex::new(Arc::downgrade(parent)),
            entries: RwLock::new(BTreeMap::new()),
        })
    }

    /// Key under which this directory is stored in its parent (empty for a
    /// root).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.lock().upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// The ultimate root reachable through parent links.
    pub fn root(self: &Arc<Self>) -> Arc<Self> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Absolute path of this directory, e.g. `/posts/2024`; `/` for a root.
    pub fn path(&self) -> String {
        let mut names = Vec::new();
        let mut parent = self.parent();
        if parent.is_some() {
            names.push(self.name.clone());
        }
        while let Some(dir) = parent {
            parent = dir.parent();
            if parent.is_some() {
                names.push(dir.name.clone());
            }
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Names stored directly in this directory, sorted.
    pub fn list(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn detach(&self) {
        *self.parent.lock() = Weak::new();
    }
}

impl<T: Clone> VDir<T> {
    /// Look up `path` without creating anything.
    ///
    /// `None` if an intermediate segment is missing or not a directory, or
    /// if the final entry does not exist. `"/"` and paths ending in `.` or
    /// `..` yield the directory they reach; `""` yields nothing.
    pub fn get(self: &Arc<Self>, path: &str) -> Option<Dirent<T>> {
        match self.resolve(path, OnMissing::Fail)? {
            Target::Dir(dir) => Some(Dirent::Dir(dir)),
            Target::Entry { dir, name } => dir.entries.read().get(&name).cloned(),
        }
    }

    /// Store `entry` at `path`, creating missing intermediate directories.
    ///
    /// Returns the stored entry, or `None` if an intermediate segment exists
    /// but is not a directory, or the path does not end in a name. An
    /// existing entry at `path` is replaced; a replaced directory is detached
    /// from the tree.
    pub fn set(self: &Arc<Self>, path: &str, entry: Entry<T>) -> Option<Dirent<T>> {
        let Target::Entry { dir, name } = self.resolve(path, OnMissing::CreateDir)? else {
            debug!(path, "set: path does not name an entry");
            return None;
        };

        let dirent = Dirent::from(entry);
        let previous = dir.entries.write().insert(name, dirent.clone());
        if let Some(Dirent::Dir(old)) = previous {
            old.detach();
        }

        trace!(path, "set entry");
        Some(dirent)
    }

    pub fn set_file(self: &Arc<Self>, path: &str, value: T) -> Option<Dirent<T>> {
        self.set(path, Entry::File(value))
    }

    pub fn set_alias(self: &Arc<Self>, path: &str, target: impl Into<String>) -> Option<Dirent<T>> {
        self.set(path, Entry::Alias(target.into()))
    }

    /// Remove the entry at `path` and return it.
    ///
    /// A removed directory keeps its contents but is detached: it becomes
    /// the root of its own namespace.
    pub fn del(self: &Arc<Self>, path: &str) -> Option<Dirent<T>> {
        let Target::Entry { dir, name } = self.resolve(path, OnMissing::Fail)? else {
            return None;
        };

        let removed = dir.entries.write().remove(&name)?;
        if let Dirent::Dir(sub) = &removed {
            sub.detach();
        }

        trace!(path, "deleted entry");
        Some(removed)
    }

    /// Every artifact below this directory with its absolute path, in path
    /// order. Aliases are not followed.
    pub fn files(&self) -> Vec<(String, T)> {
        let mut out = Vec::new();
        self.collect_files(&self.path(), &mut out);
        out
    }

    fn collect_files(&self, prefix: &str, out: &mut Vec<(String, T)>) {
        let entries: Vec<(String, Dirent<T>)> = self
            .entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();

        for (name, entry) in entries {
            let path = if prefix.ends_with('/') {
                format!("{prefix}{name}")
            } else {
                format!("{prefix}/{name}")
            };
            match entry {
                Dirent::File(value) => out.push((path, value)),
                Dirent::Dir(dir) => dir.collect_files(&path, out),
                Dirent::Alias(_) => {}
            }
        }
    }

    fn resolve(self: &Arc<Self>, path: &str, on_missing: OnMissing) -> Option<Target<T>> {
        let vpath = VPath::parse(path);
        let start = if vpath.is_absolute() {
            self.root()
        } else {
            Arc::clone(self)
        };

        let Some((last, intermediate)) = vpath.segments().split_last() else {
            return vpath.is_absolute().then_some(Target::Dir(start));
        };

        let mut current = start;
        for segment in intermediate {
            current = current.step(segment, on_missing)?;
        }

        match last {
            Segment::Name(name) => Some(Target::Entry {
                dir: current,
                name: name.clone(),
            }),
            navigation => Some(Target::Dir(current.step(navigation, OnMissing::Fail)?)),
        }
    }

    fn step(self: &Arc<Self>, segment: &Segment, on_missing: OnMissing) -> Option<Arc<Self>> {
        match segment {
            Segment::Current => Some(Arc::clone(self)),
            Segment::Parent => Some(self.parent().unwrap_or_else(|| Arc::clone(self))),
            Segment::Name(name) => self.child_dir(name, on_missing),
        }
    }

    fn child_dir(self: &Arc<Self>, name: &str, on_missing: OnMissing) -> Option<Arc<Self>> {
        if on_missing == OnMissing::CreateDir {
            let mut entries = self.entries.write();
            let entry = entries.entry(name.to_string()).or_insert_with(|| {
                trace!(name, parent = %self.path(), "creating intermediate directory");
                Dirent::Dir(VDir::new_child(name, self))
            });
            return entry.as_dir().cloned();
        }

        self.entries.read().get(name).and_then(|e| e.as_dir().cloned())
    }
}
