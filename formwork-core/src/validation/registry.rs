//! Per-group registry of tree validators.
//!
//! Every [`GroupNode`] owns one. A tree validator judges a node in the
//! context of the whole group (cross-field rules such as "confirmation must
//! match password") and runs when that group validates. Nothing here is
//! global: a group only ever runs its own registrations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::applicator::{conditions_hold, Condition, ValidationContext};
use super::ValidationError;
use crate::node::{Control, FormNode, GroupNode};
use crate::path::get_node_by_path;
use crate::reactive::untracked;

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// Fresh id tagging everything one validation schema application installs.
pub(crate) fn next_schema_id() -> u64 {
    NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) type TreeValidator =
    Arc<dyn Fn(&ValidationContext) -> Option<ValidationError> + Send + Sync>;

struct TreeRegistration {
    schema: u64,
    /// Node the errors attach to; `None` for the group itself.
    target: Option<String>,
    conditions: Vec<Condition>,
    validator: TreeValidator,
}

#[derive(Default)]
pub(crate) struct ValidationRegistry {
    entries: RwLock<Vec<TreeRegistration>>,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        schema: u64,
        target: Option<String>,
        conditions: Vec<Condition>,
        validator: TreeValidator,
    ) {
        self.entries.write().push(TreeRegistration {
            schema,
            target,
            conditions,
            validator,
        });
    }

    /// Drop every registration made by `schema`. Returns how many went.
    pub fn remove_schema(&self, schema: u64) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.schema != schema);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Run every registration against `root`, appending errors to their
    /// targets. Disabled targets are skipped.
    pub fn run(&self, root: &GroupNode) {
        let snapshot: Vec<(Option<String>, Vec<Condition>, TreeValidator)> = self
            .entries
            .read()
            .iter()
            .map(|entry| {
                (
                    entry.target.clone(),
                    entry.conditions.clone(),
                    Arc::clone(&entry.validator),
                )
            })
            .collect();

        untracked(|| {
            for (target, conditions, validator) in snapshot {
                if !conditions_hold(&conditions, root) {
                    continue;
                }
                let node = match &target {
                    None => FormNode::Group(root.clone()),
                    Some(path) => match get_node_by_path(root, path) {
                        Some(node) => node,
                        None => {
                            tracing::warn!(path = %path, "tree validator target not found");
                            continue;
                        }
                    },
                };
                if node.disabled() {
                    continue;
                }
                let ctx = ValidationContext::new(root.clone(), node.get_value());
                if let Some(error) = validator(&ctx) {
                    node.append_errors(vec![error]);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FieldConfig, GroupSchema};
    use serde_json::json;

    fn form() -> GroupNode {
        GroupNode::new(
            GroupSchema::new()
                .field("password", FieldConfig::new("secret"))
                .field("confirm", FieldConfig::new("secrte")),
        )
    }

    fn mismatch() -> TreeValidator {
        Arc::new(|ctx: &ValidationContext| {
            (ctx.get("password") != ctx.get("confirm"))
                .then(|| ValidationError::new("mismatch", "Passwords differ"))
        })
    }

    #[test]
    fn run_attaches_to_group_or_target() {
        let form = form();
        let registry = ValidationRegistry::new();
        registry.register(1, None, Vec::new(), mismatch());
        registry.register(1, Some("confirm".into()), Vec::new(), mismatch());

        registry.run(&form);
        assert_eq!(form.errors().len(), 1);
        assert_eq!(form.field_at("confirm").unwrap().errors()[0].code, "mismatch");
    }

    #[test]
    fn remove_schema_only_drops_its_own() {
        let registry = ValidationRegistry::new();
        registry.register(1, None, Vec::new(), mismatch());
        registry.register(2, None, Vec::new(), mismatch());
        registry.register(1, None, Vec::new(), mismatch());

        assert_eq!(registry.remove_schema(1), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn disabled_target_and_false_condition_skip() {
        let form = form();
        let registry = ValidationRegistry::new();
        let never: Condition = Arc::new(|_: &GroupNode| false);
        registry.register(1, None, vec![never], mismatch());
        registry.register(1, Some("confirm".into()), Vec::new(), mismatch());
        form.field_at("confirm").unwrap().disable();

        registry.run(&form);
        assert!(form.errors().is_empty());
        assert!(form.field_at("confirm").unwrap().errors().is_empty());

        form.field_at("confirm").unwrap().enable();
        form.field_at("confirm").unwrap().set_value(json!("secret"));
        registry.run(&form);
        assert!(form.field_at("confirm").unwrap().errors().is_empty());
    }
}
