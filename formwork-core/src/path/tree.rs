//! Path access on node trees.

use serde_json::Value;

use super::parse_path;
use crate::node::{Control, FormNode, GroupNode};
use crate::reactive::untracked;

/// Resolve `path` to a node under `root`.
///
/// Returns `None` for malformed paths and for any segment that does not
/// resolve: a missing key, an index past the end, or indexing something
/// that is not a list.
pub fn get_node_by_path(root: &GroupNode, path: &str) -> Option<FormNode> {
    let segments = parse_path(path).ok()?;
    let mut current = FormNode::Group(root.clone());

    for segment in &segments {
        let child = current.as_group()?.get_field(&segment.key)?;
        current = match segment.index {
            Some(index) => FormNode::Group(untracked(|| child.as_array()?.at(index))?),
            None => child,
        };
    }
    Some(current)
}

/// Current value of the node at `path`, without tracking.
pub fn get_form_node_value(root: &GroupNode, path: &str) -> Option<Value> {
    get_node_by_path(root, path).map(|node| node.get_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ArraySchema, FieldConfig, GroupSchema, NodeKind};
    use serde_json::json;

    fn order() -> GroupNode {
        GroupNode::new(
            GroupSchema::new()
                .field("customer", GroupSchema::new().field("name", FieldConfig::new("Ada")))
                .field(
                    "items",
                    ArraySchema::new(GroupSchema::new().field("sku", FieldConfig::new("")))
                        .with_items([json!({"sku": "A"}), json!({"sku": "B"})]),
                ),
        )
    }

    #[test]
    fn resolves_every_node_kind() {
        let form = order();
        assert_eq!(get_node_by_path(&form, "customer").unwrap().kind(), NodeKind::Group);
        assert_eq!(get_node_by_path(&form, "customer.name").unwrap().kind(), NodeKind::Field);
        assert_eq!(get_node_by_path(&form, "items").unwrap().kind(), NodeKind::Array);
        assert_eq!(get_node_by_path(&form, "items[1]").unwrap().kind(), NodeKind::Group);
        assert_eq!(get_form_node_value(&form, "items[1].sku"), Some(json!("B")));
    }

    #[test]
    fn unresolved_paths_are_not_found() {
        let form = order();
        assert!(get_node_by_path(&form, "items[2].sku").is_none());
        assert!(get_node_by_path(&form, "customer[0]").is_none());
        assert!(get_node_by_path(&form, "customer.name.first").is_none());
        assert!(get_node_by_path(&form, "nope").is_none());
        assert!(get_form_node_value(&form, "customer..name").is_none());
    }

    #[test]
    fn sees_items_added_later() {
        let form = order();
        form.array_at("items").unwrap().push(Some(json!({"sku": "C"})));
        assert_eq!(get_form_node_value(&form, "items[2].sku"), Some(json!("C")));
    }
}
