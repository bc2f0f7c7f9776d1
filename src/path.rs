//! Functor paths.
//!
//! A functor is a `/`-separated path such as `first/sub1`. Paths order
//! lexicographically by segment, so every path sharing a prefix sorts into one
//! contiguous run. The belief base relies on this for prefix queries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// A functor path.
///
/// # Examples
///
/// ```
/// use bdi_engine::Path;
///
/// let path = Path::new("second/sub/sub5");
/// assert_eq!(path.len(), 3);
/// assert!(path.starts_with(&Path::new("second")));
/// assert_eq!(path.to_string(), "second/sub/sub5");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parses a path; empty segments are dropped.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            segments: path
                .split(SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Builds a path from already separated segments.
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// The empty path, which is a prefix of every path.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, the plain functor name.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns true if `prefix` is a segment-wise prefix of this path.
    #[must_use]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Appends a segment.
    #[must_use]
    pub fn push(mut self, segment: impl Into<String>) -> Self {
        let segment = segment.into();
        if !segment.is_empty() {
            self.segments.push(segment);
        }
        self
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
