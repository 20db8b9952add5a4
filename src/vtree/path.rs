// src/vtree/path.rs

/// One component of a namespace path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `.`: stay in the current directory.
    Current,
    /// `..`: go to the parent directory (stay put at the root).
    Parent,
    /// A key looked up in the current directory.
    Name(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw {
            "." => Segment::Current,
            ".." => Segment::Parent,
            name => Segment::Name(name.to_string()),
        }
    }
}

/// A parsed namespace path.
///
/// Surrounding whitespace is ignored and empty segments (from `//` or a
/// trailing `/`) are dropped. A leading `/` makes the path absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VPath {
    absolute: bool,
    segments: Vec<Segment>,
}

impl VPath {
    pub fn parse(path: &str) -> Self {
        let path = path.trim();
        Self {
            absolute: path.starts_with('/'),
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(Segment::parse)
                .collect(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
