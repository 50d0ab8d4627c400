//! Path Resolver
//!
//! String addresses into nested values and node trees:
//!
//! ```text
//! path    := segment ("." segment)*
//! segment := key ("[" index "]")?
//! ```
//!
//! `address.city` names a nested key, `items[2].name` the `name` key of the
//! third element of `items`. A key is any non-empty run of characters other
//! than `.`, `[` and `]`. Nested indices (`grid[0][1]`) are not part of the
//! grammar: list items are always objects.

mod tree;
mod value;

pub use tree::{get_form_node_value, get_node_by_path};
pub use value::{get_value_by_path, set_value_by_path, MAX_INDEX_GAP};

use std::fmt;

use smallvec::SmallVec;

use crate::error::{FormError, Result};

/// One `key` or `key[index]` step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub key: String,
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            index: None,
        }
    }

    pub fn indexed(key: impl Into<String>, index: usize) -> Self {
        Self {
            key: key.into(),
            index: Some(index),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.key, index),
            None => f.write_str(&self.key),
        }
    }
}

/// Parsed path. Most paths are a handful of segments deep.
pub type Segments = SmallVec<[PathSegment; 4]>;

/// Parse `path` into segments.
pub fn parse_path(path: &str) -> Result<Segments> {
    let mut segments = Segments::new();
    let mut chars = path.char_indices().peekable();

    loop {
        let start = chars.peek().map_or(path.len(), |(i, _)| *i);
        let mut end = path.len();
        while let Some(&(i, c)) = chars.peek() {
            if c == '.' || c == '[' || c == ']' {
                end = i;
                break;
            }
            chars.next();
        }
        let key = &path[start..end];
        if key.is_empty() {
            return Err(FormError::invalid_path(path, format!("empty key at offset {start}")));
        }

        let mut segment = PathSegment::key(key);
        if let Some(&(open, '[')) = chars.peek() {
            chars.next();
            let mut digits = String::new();
            loop {
                match chars.next() {
                    Some((_, ']')) => break,
                    Some((_, c)) if c.is_ascii_digit() => digits.push(c),
                    Some((i, c)) => {
                        return Err(FormError::invalid_path(
                            path,
                            format!("unexpected `{c}` in index at offset {i}"),
                        ))
                    }
                    None => {
                        return Err(FormError::invalid_path(
                            path,
                            format!("unclosed `[` at offset {open}"),
                        ))
                    }
                }
            }
            let index = digits
                .parse()
                .map_err(|_| FormError::invalid_path(path, format!("bad index at offset {open}")))?;
            segment.index = Some(index);
        }
        segments.push(segment);

        match chars.next() {
            None => return Ok(segments),
            Some((_, '.')) => continue,
            Some((i, c)) => {
                return Err(FormError::invalid_path(
                    path,
                    format!("unexpected `{c}` at offset {i}"),
                ))
            }
        }
    }
}

/// Render segments back into path syntax.
pub fn join_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_and_indices() {
        let segments = parse_path("order.items[12].sku").unwrap();
        assert_eq!(
            segments.as_slice(),
            &[
                PathSegment::key("order"),
                PathSegment::indexed("items", 12),
                PathSegment::key("sku"),
            ]
        );
    }

    #[test]
    fn join_round_trips() {
        for path in ["a", "a.b", "items[0]", "items[3].address.city", "x_1.y-2"] {
            assert_eq!(join_path(&parse_path(path).unwrap()), path);
        }
    }

    #[test]
    fn rejects_malformed_paths() {
        for path in ["", ".a", "a.", "a..b", "[0]", "a[", "a[x]", "a[]", "a[0][1]", "a]b", "a[0]b"] {
            assert!(
                matches!(parse_path(path), Err(FormError::InvalidPath { .. })),
                "{path} should be rejected"
            );
        }
    }
}
