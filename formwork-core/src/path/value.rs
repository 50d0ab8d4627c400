//! Path access on plain JSON values.

use serde_json::{Map, Value};

use super::{join_path, parse_path, PathSegment};
use crate::error::{kind_of, Container, FormError, Result};

/// How far past the end of an array a write may pad with `null`.
pub const MAX_INDEX_GAP: usize = 1024;

/// Read the value at `path`.
///
/// Returns `None` for malformed paths and for any segment that does not
/// resolve.
pub fn get_value_by_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path).ok()?;
    let mut current = root;
    for segment in &segments {
        current = current.as_object()?.get(&segment.key)?;
        if let Some(index) = segment.index {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Write `value` at `path`, creating missing objects and arrays on the way.
///
/// `null` counts as missing. Arrays are padded with `null` up to the index,
/// at most [`MAX_INDEX_GAP`] slots past their current end; an index beyond
/// that fails with [`FormError::IndexOutOfRange`]. Passing through any other non-container value fails with
/// [`FormError::StructuralMismatch`] and leaves `root` as far as it got.
pub fn set_value_by_path(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = parse_path(path)?;
    let mut current = root;

    for (depth, segment) in segments.iter().enumerate() {
        let object = as_object_mut(current, &segments[..depth], segment)?;
        let slot = object.entry(segment.key.clone()).or_insert(Value::Null);

        current = match segment.index {
            Some(index) => {
                let array = as_array_mut(slot, &segments[..=depth])?;
                if array.len() <= index {
                    let len = array.len();
                    let new_len = index
                        .checked_add(1)
                        .filter(|_| index - len <= MAX_INDEX_GAP)
                        .ok_or_else(|| FormError::IndexOutOfRange {
                            path: join_path(&segments[..=depth]),
                            index,
                            len,
                        })?;
                    array.resize(new_len, Value::Null);
                }
                &mut array[index]
            }
            None => slot,
        };
    }

    *current = value;
    Ok(())
}

fn as_object_mut<'a>(
    value: &'a mut Value,
    parent: &[PathSegment],
    segment: &PathSegment,
) -> Result<&'a mut Map<String, Value>> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map),
        other => Err(FormError::StructuralMismatch {
            path: if parent.is_empty() {
                segment.key.clone()
            } else {
                join_path(parent)
            },
            expected: Container::Object,
            found: kind_of(other),
        }),
    }
}

fn as_array_mut<'a>(value: &'a mut Value, upto: &[PathSegment]) -> Result<&'a mut Vec<Value>> {
    if value.is_null() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(items) => Ok(items),
        other => {
            let mut at = upto.to_vec();
            if let Some(last) = at.last_mut() {
                last.index = None;
            }
            Err(FormError::StructuralMismatch {
                path: join_path(&at),
                expected: Container::Array,
                found: kind_of(other),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_resolves_nested_and_indexed() {
        let value = json!({"order": {"items": [{"sku": "A"}, {"sku": "B"}]}});
        assert_eq!(get_value_by_path(&value, "order.items[1].sku"), Some(&json!("B")));
        assert_eq!(get_value_by_path(&value, "order.items[2].sku"), None);
        assert_eq!(get_value_by_path(&value, "order.missing"), None);
        assert_eq!(get_value_by_path(&value, "order..items"), None);
    }

    #[test]
    fn set_then_get_returns_written_value() {
        let cases = [
            ("name", json!("Ada")),
            ("address.city", json!("Oslo")),
            ("items[2].qty", json!(3)),
            ("a.b.c.d", json!({"deep": true})),
        ];
        for (path, written) in cases {
            let mut root = json!({"name": "x", "address": {"zip": "0150"}});
            set_value_by_path(&mut root, path, written.clone()).unwrap();
            assert_eq!(get_value_by_path(&root, path), Some(&written), "{path}");
        }
    }

    #[test]
    fn set_pads_arrays_and_keeps_siblings() {
        let mut root = json!({"address": {"zip": "0150"}});
        set_value_by_path(&mut root, "items[1].sku", json!("B")).unwrap();
        set_value_by_path(&mut root, "address.city", json!("Oslo")).unwrap();

        assert_eq!(
            root,
            json!({
                "address": {"zip": "0150", "city": "Oslo"},
                "items": [null, {"sku": "B"}]
            })
        );
    }

    #[test]
    fn set_through_wrong_container_fails() {
        let mut root = json!({"items": {"not": "a list"}, "name": "x"});

        let err = set_value_by_path(&mut root, "items[0].sku", json!(1)).unwrap_err();
        assert!(matches!(
            err,
            FormError::StructuralMismatch {
                expected: Container::Array,
                found: "object",
                ..
            }
        ));

        let err = set_value_by_path(&mut root, "name.first", json!("A")).unwrap_err();
        match err {
            FormError::StructuralMismatch { path, expected, found } => {
                assert_eq!(path, "name");
                assert_eq!(expected, Container::Object);
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn set_rejects_index_far_past_the_end() {
        let mut root = json!({"items": [1, 2]});

        let err =
            set_value_by_path(&mut root, "items[18446744073709551615]", json!(1)).unwrap_err();
        assert!(matches!(
            err,
            FormError::IndexOutOfRange { len: 2, index: usize::MAX, .. }
        ));

        let err = set_value_by_path(&mut root, "rows[1000000000000].a", json!(1)).unwrap_err();
        match err {
            FormError::IndexOutOfRange { path, len, .. } => {
                assert_eq!(path, "rows[1000000000000]");
                assert_eq!(len, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(root["items"], json!([1, 2]));

        let gap = 2 + MAX_INDEX_GAP;
        set_value_by_path(&mut root, &format!("items[{gap}]"), json!(3)).unwrap();
        assert_eq!(root["items"].as_array().map(Vec::len), Some(gap + 1));
    }

    #[test]
    fn set_rejects_malformed_path() {
        let mut root = json!({});
        assert!(matches!(
            set_value_by_path(&mut root, "a[", json!(1)),
            Err(FormError::InvalidPath { .. })
        ));
    }
}
