//! Walking field paths through a record
//!
//! Lenient mode turns every failed step into "nothing here", which callers
//! render as `restval` (values) or 0 (array lengths). Strict mode reports the
//! failure as a [`LookupError`] instead.

use crate::error::LookupError;
use crate::types::Segment;
use serde_json::Value;

pub(crate) struct Resolver {
    raise_on_missing: bool,
}

impl Resolver {
    pub(crate) fn new(raise_on_missing: bool) -> Self {
        Resolver { raise_on_missing }
    }

    /// Resolve `path` in `record`, taking one entry of `indexes` for every `[]`.
    ///
    /// A `[]` past the end of its list always yields `None`, even in strict
    /// mode: shorter sibling arrays are expected while expanding rows.
    pub(crate) fn value<'v>(
        &self,
        field: &str,
        record: &'v Value,
        path: &[Segment],
        indexes: &[usize],
    ) -> Result<Option<&'v Value>, LookupError> {
        let mut current = record;
        let mut indexes = indexes.iter();

        for segment in path {
            current = match segment {
                Segment::ArrayWildcard => {
                    let Some(&index) = indexes.next() else {
                        return Ok(None);
                    };
                    match current {
                        Value::Array(items) => match items.get(index) {
                            Some(item) => item,
                            None => return Ok(None),
                        },
                        other => return self.mismatch(field, segment, other),
                    }
                }
                Segment::ArrayId => return Ok(None),
                _ => match self.step(field, current, segment)? {
                    Some(next) => next,
                    None => return Ok(None),
                },
            };
        }

        Ok(Some(current))
    }

    /// Length of the list at `path`. A `[]` inside the path probes every
    /// element and keeps the longest list found.
    pub(crate) fn max_len(
        &self,
        field: &str,
        value: &Value,
        path: &[Segment],
    ) -> Result<usize, LookupError> {
        let mut current = value;

        for (i, segment) in path.iter().enumerate() {
            match segment {
                Segment::ArrayWildcard => {
                    let Value::Array(items) = current else {
                        return self.mismatch::<()>(field, segment, current).map(|_| 0);
                    };
                    let mut longest = 0;
                    for item in items {
                        longest = longest.max(self.max_len(field, item, &path[i + 1..])?);
                    }
                    return Ok(longest);
                }
                _ => match self.step(field, current, segment)? {
                    Some(next) => current = next,
                    None => return Ok(0),
                },
            }
        }

        match current {
            Value::Array(items) => Ok(items.len()),
            other => self
                .mismatch::<()>(field, &Segment::ArrayWildcard, other)
                .map(|_| 0),
        }
    }

    /// Apply a key or literal index to one value
    fn step<'v>(
        &self,
        field: &str,
        current: &'v Value,
        segment: &Segment,
    ) -> Result<Option<&'v Value>, LookupError> {
        match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => match map.get(key) {
                Some(next) => Ok(Some(next)),
                None if self.raise_on_missing => Err(LookupError::MissingKey {
                    field: field.to_string(),
                    key: key.clone(),
                }),
                None => Ok(None),
            },
            (Segment::ArrayIndex(index), Value::Array(items)) => match items.get(*index) {
                Some(next) => Ok(Some(next)),
                None if self.raise_on_missing => Err(LookupError::IndexOutOfRange {
                    field: field.to_string(),
                    index: *index,
                    len: items.len(),
                }),
                None => Ok(None),
            },
            (segment, other) => self.mismatch(field, segment, other),
        }
    }

    fn mismatch<T>(
        &self,
        field: &str,
        segment: &Segment,
        found: &Value,
    ) -> Result<Option<T>, LookupError> {
        if self.raise_on_missing {
            Err(LookupError::TypeMismatch {
                field: field.to_string(),
                segment: segment.to_string(),
                found: kind(found),
            })
        } else {
            Ok(None)
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

/// Render a resolved value as a cell
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
