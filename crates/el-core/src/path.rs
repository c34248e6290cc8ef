//! Structural paths into nested values.
//!
//! A path is a sequence of segments. Its canonical string joins segments with
//! `.`; a literal `.` or `\` inside a segment is escaped with `\`, so two paths
//! have the same canonical form exactly when their segments are equal.

use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const SEPARATOR: char = '.';
const ESCAPE: char = '\\';

#[derive(Debug, Clone, Default)]
pub struct Path {
    segments: Vec<String>,
    canonical: String,
}

fn escape_segment(segment: &str, out: &mut String) {
    for ch in segment.chars() {
        if ch == SEPARATOR || ch == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
}

impl Path {
    /// The empty path, addressing the value itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::root();
        for seg in segments {
            path.push(seg.into());
        }
        path
    }

    /// Parse a canonical (possibly escaped) dotted path.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::root();
        }
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            match ch {
                ESCAPE => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                SEPARATOR => segments.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            }
        }
        segments.push(current);
        Self::from_segments(segments)
    }

    fn push(&mut self, segment: String) {
        if !self.segments.is_empty() {
            self.canonical.push(SEPARATOR);
        }
        escape_segment(&segment, &mut self.canonical);
        self.segments.push(segment);
    }

    /// A new path extended by one segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(segment.into());
        path
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl core::fmt::Display for Path {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Path {}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        Path::parse(text)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Path::parse(&text))
    }
}
