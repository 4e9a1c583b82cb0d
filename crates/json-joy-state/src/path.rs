//! Paths into a value tree and their canonical registry keys.
//!
//! Observers are keyed by the dot-joined form of a path. The root is the
//! distinguished `None` key; `Some("")` is a top-level member literally
//! named `""`.

use std::fmt;

use serde_json::Value as JsonValue;

/// A single step of a path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl PathStep {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathStep::Key(key) => Some(key),
            PathStep::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathStep::Key(_) => None,
            PathStep::Index(idx) => Some(*idx),
        }
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(key) => f.write_str(key),
            PathStep::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for PathStep {
    fn from(key: &str) -> Self {
        PathStep::Key(key.to_owned())
    }
}

impl From<String> for PathStep {
    fn from(key: String) -> Self {
        PathStep::Key(key)
    }
}

impl From<usize> for PathStep {
    fn from(idx: usize) -> Self {
        PathStep::Index(idx)
    }
}

/// Canonical registry key of a path; `None` is the root.
pub type PathKey = Option<String>;

/// Canonical key of a caller-supplied dot-path.
pub fn path_key(path: Option<&str>) -> PathKey {
    path.map(str::to_owned)
}

/// Canonical key of a sequence of steps.
pub fn join(steps: &[PathStep]) -> PathKey {
    if steps.is_empty() {
        return None;
    }
    let parts: Vec<String> = steps.iter().map(ToString::to_string).collect();
    Some(parts.join("."))
}

/// Splits a dot-path into its segments. Empty segments are kept.
pub fn split(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Parses a canonical array index: decimal digits without leading zeros.
pub fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    segment.parse().ok()
}

/// Navigates a plain JSON tree along a dot-path. `None` addresses the
/// whole tree.
pub fn value_at<'a>(root: &'a JsonValue, path: Option<&str>) -> Option<&'a JsonValue> {
    let Some(path) = path else {
        return Some(root);
    };
    let mut cur = root;
    for segment in split(path) {
        cur = match cur {
            JsonValue::Object(map) => map.get(segment)?,
            JsonValue::Array(arr) => arr.get(parse_index(segment)?)?,
            _ => return None,
        };
    }
    Some(cur)
}
