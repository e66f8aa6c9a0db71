//! Column-name scanner
//!
//! Recognises `.`, `[]`, `[<digits>]` and `[id]` anywhere in a name. Everything
//! between two delimiters is a key, including stray brackets: `a[b]` is the
//! single key `a[b]`.

use crate::types::{FieldPath, Segment};

/// Parse a column name into its segments. Never fails.
pub fn parse(name: &str) -> FieldPath {
    let mut segments = Vec::new();
    let mut key_start = 0;
    let mut pos = 0;

    while pos < name.len() {
        let rest = &name[pos..];
        match match_delimiter(rest) {
            Some((segment, width)) => {
                push_key(&mut segments, &name[key_start..pos]);
                if let Some(segment) = segment {
                    segments.push(segment);
                }
                pos += width;
                key_start = pos;
            }
            None => {
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }
    push_key(&mut segments, &name[key_start..]);

    FieldPath::new(segments)
}

fn push_key(segments: &mut Vec<Segment>, token: &str) {
    if !token.is_empty() {
        segments.push(Segment::Key(token.to_string()));
    }
}

/// Match a delimiter at the start of `rest`, returning the segment it
/// produces (`None` for the dot separator) and its byte width.
fn match_delimiter(rest: &str) -> Option<(Option<Segment>, usize)> {
    if rest.starts_with('.') {
        return Some((None, 1));
    }
    if rest.starts_with("[id]") {
        return Some((Some(Segment::ArrayId), 4));
    }

    let body = rest.strip_prefix('[')?;
    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if body.as_bytes().get(digits) != Some(&b']') {
        return None;
    }

    let width = digits + 2;
    let segment = if digits == 0 {
        Segment::ArrayWildcard
    } else {
        match body[..digits].parse() {
            Ok(index) => Segment::ArrayIndex(index),
            Err(_) => Segment::Key(rest[..width].to_string()),
        }
    };
    Some((Some(segment), width))
}
