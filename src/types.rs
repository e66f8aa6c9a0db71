use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Map lookup, e.g. `a` in `a.b`
    Key(String),
    /// `[]` - expand every element of a list into its own row
    ArrayWildcard,
    /// `[3]` - a literal list index, no expansion
    ArrayIndex(usize),
    /// `[id]` - the current loop index of the enclosing array
    ArrayId,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{}", key),
            Segment::ArrayWildcard => write!(f, "[]"),
            Segment::ArrayIndex(index) => write!(f, "[{}]", index),
            Segment::ArrayId => write!(f, "[id]"),
        }
    }
}

/// Parsed form of a column name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath(pub Vec<Segment>);

impl FieldPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        FieldPath(segments)
    }

    /// Parse a column name such as `a.b[].c[id]`
    pub fn parse(name: &str) -> Self {
        crate::flatten::path::parse(name)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments before `depth`
    pub fn prefix(&self, depth: usize) -> &[Segment] {
        &self.0[..depth.min(self.0.len())]
    }

    pub fn is_wildcard_at(&self, depth: usize) -> bool {
        matches!(self.0.get(depth), Some(Segment::ArrayWildcard))
    }

    /// True when any `[]` appears strictly after `depth`
    pub fn has_wildcard_after(&self, depth: usize) -> bool {
        self.0
            .iter()
            .skip(depth + 1)
            .any(|s| matches!(s, Segment::ArrayWildcard))
    }

    pub fn has_wildcard(&self) -> bool {
        self.0.iter().any(|s| matches!(s, Segment::ArrayWildcard))
    }

    /// Position of the first `[id]` segment, if any
    pub fn array_id_position(&self) -> Option<usize> {
        self.0.iter().position(|s| matches!(s, Segment::ArrayId))
    }

    /// A simple path resolves without any loop index
    pub fn is_simple(&self) -> bool {
        !self.has_wildcard() && self.array_id_position().is_none()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && matches!(segment, Segment::Key(_)) {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Configuration for a [`NestedWriter`](crate::NestedWriter)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Fail the current record on a missing key, short list or non-container
    /// instead of substituting `restval`
    pub raise_on_missing: bool,

    /// Value written for anything that cannot be resolved
    pub restval: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            raise_on_missing: false,
            restval: String::new(),
        }
    }
}

impl WriterConfig {
    pub fn with_restval(mut self, restval: impl Into<String>) -> Self {
        self.restval = restval.into();
        self
    }

    pub fn with_raise_on_missing(mut self, raise_on_missing: bool) -> Self {
        self.raise_on_missing = raise_on_missing;
        self
    }
}
