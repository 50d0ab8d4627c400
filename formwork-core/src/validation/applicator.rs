//! Validation Schemas
//!
//! A validation schema is a function over a [`ValidationBuilder`]. It names
//! fields by path and attaches validators to them:
//!
//! ```rust,ignore
//! form.apply_validation_schema(|v| {
//!     v.field("email", |value, _| required(value));
//!     v.apply_when("shipping", |value| value == true, |v| {
//!         v.field("address.city", |value, _| required(value));
//!     });
//!     v.tree_for("confirm", |ctx| {
//!         (ctx.get("password") != ctx.get("confirm"))
//!             .then(|| ValidationError::new("mismatch", "Passwords differ"))
//!     });
//!     v.items("items", |item| {
//!         item.field("sku", |value, _| required(value));
//!     });
//! });
//! ```
//!
//! Field validators are installed directly on the leaves, tagged with the
//! schema's id, and run as part of the leaf's own validation. Tree
//! validators go into the group's registry and run after the group's
//! children validated. Both receive a [`ValidationContext`] giving access to
//! the rest of the form.
//!
//! The leaves hold the group weakly: a schema never keeps its form alive.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, FutureExt};
use serde_json::Value;

use super::registry::next_schema_id;
use super::{AsyncValidator, SyncValidator, ValidationError};
use crate::lifecycle::Disposer;
use crate::node::{Control, FieldNode, GroupNode};
use crate::path::get_form_node_value;

/// Gate on a registration: it only applies while every condition holds.
pub(crate) type Condition = Arc<dyn Fn(&GroupNode) -> bool + Send + Sync>;

pub(crate) fn conditions_hold(conditions: &[Condition], root: &GroupNode) -> bool {
    conditions.iter().all(|condition| condition(root))
}

/// What a contextual validator sees.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    root: GroupNode,
    value: Value,
}

impl ValidationContext {
    pub(crate) fn new(root: GroupNode, value: Value) -> Self {
        Self { root, value }
    }

    /// Value of the node being validated.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The group the schema was applied to.
    pub fn root(&self) -> &GroupNode {
        &self.root
    }

    /// Value of another node, by path from the root.
    pub fn get(&self, path: &str) -> Option<Value> {
        get_form_node_value(&self.root, path)
    }

    /// Whole value of the root group.
    pub fn form_value(&self) -> Value {
        self.root.get_value()
    }
}

/// Collects the registrations of one validation schema application.
pub struct ValidationBuilder {
    root: GroupNode,
    schema_id: u64,
    conditions: Vec<Condition>,
    disposers: Vec<Disposer>,
}

impl ValidationBuilder {
    pub(crate) fn new(root: &GroupNode) -> Self {
        Self {
            root: root.clone(),
            schema_id: next_schema_id(),
            conditions: Vec::new(),
            disposers: Vec::new(),
        }
    }

    pub(crate) fn schema_id(&self) -> u64 {
        self.schema_id
    }

    /// The group this schema is being applied to.
    pub fn root(&self) -> &GroupNode {
        &self.root
    }

    /// Attach a sync validator to the leaf at `path`.
    pub fn field<F>(&mut self, path: &str, validator: F) -> &mut Self
    where
        F: Fn(&Value, &ValidationContext) -> Option<ValidationError> + Send + Sync + 'static,
    {
        let Some(field) = self.resolve_field(path) else {
            return self;
        };
        let weak = self.root.downgrade();
        let conditions = self.conditions.clone();

        let wrapped: SyncValidator = Arc::new(move |value: &Value| {
            let root = weak.upgrade()?;
            if !conditions_hold(&conditions, &root) {
                return None;
            }
            let ctx = ValidationContext::new(root, value.clone());
            validator(value, &ctx)
        });
        field.install_validator(self.schema_id, wrapped);
        self.track(field);
        self
    }

    /// Attach an async validator to the leaf at `path`.
    pub fn field_async<F, Fut>(&mut self, path: &str, validator: F) -> &mut Self
    where
        F: Fn(Value, ValidationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<ValidationError>> + Send + 'static,
    {
        let Some(field) = self.resolve_field(path) else {
            return self;
        };
        let weak = self.root.downgrade();
        let conditions = self.conditions.clone();

        let wrapped: AsyncValidator = Arc::new(move |value: Value| {
            let root = match weak.upgrade() {
                Some(root) if conditions_hold(&conditions, &root) => root,
                _ => return future::ready(None).boxed(),
            };
            let ctx = ValidationContext::new(root, value.clone());
            validator(value, ctx).boxed()
        });
        field.install_async_validator(self.schema_id, wrapped);
        self.track(field);
        self
    }

    /// Register a validator for the group itself. Its errors become
    /// group-level errors.
    pub fn tree<F>(&mut self, validator: F) -> &mut Self
    where
        F: Fn(&ValidationContext) -> Option<ValidationError> + Send + Sync + 'static,
    {
        self.root.registry().register(
            self.schema_id,
            None,
            self.conditions.clone(),
            Arc::new(validator),
        );
        self
    }

    /// Register a group-scoped validator whose errors attach to the node at
    /// `path`. Runs when the group validates, after `path` itself did.
    pub fn tree_for<F>(&mut self, path: &str, validator: F) -> &mut Self
    where
        F: Fn(&ValidationContext) -> Option<ValidationError> + Send + Sync + 'static,
    {
        if self.root.get_field_by_path(path).is_none() {
            tracing::warn!(path, "tree validator target does not resolve");
            return self;
        }
        self.root.registry().register(
            self.schema_id,
            Some(path.to_string()),
            self.conditions.clone(),
            Arc::new(validator),
        );
        self
    }

    /// Registrations made inside `apply` only take effect while the value
    /// at `path` satisfies `predicate`.
    pub fn apply_when<P, F>(&mut self, path: &str, predicate: P, apply: F) -> &mut Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        F: FnOnce(&mut ValidationBuilder),
    {
        let path = path.to_string();
        let condition: Condition = Arc::new(move |root: &GroupNode| {
            get_form_node_value(root, &path).is_some_and(|value| predicate(&value))
        });
        self.conditions.push(condition);
        apply(self);
        self.conditions.pop();
        self
    }

    /// Apply an item schema to the list at `path`.
    ///
    /// Conditions from an enclosing `apply_when` do not carry into items.
    pub fn items<F>(&mut self, path: &str, schema: F) -> &mut Self
    where
        F: Fn(&mut ValidationBuilder) + Send + Sync + 'static,
    {
        match self.root.array_at(path) {
            Some(array) => {
                let disposer = array.apply_validation_schema(schema);
                self.disposers.push(disposer);
            }
            None => tracing::warn!(path, "validation items target is not a list"),
        }
        self
    }

    fn resolve_field(&self, path: &str) -> Option<FieldNode> {
        let field = self.root.field_at(path);
        if field.is_none() {
            tracing::warn!(path, "validation target is not a field");
        }
        field
    }

    fn track(&mut self, field: FieldNode) {
        let schema_id = self.schema_id;
        self.disposers
            .push(Disposer::new(move || field.uninstall_schema(schema_id)));
    }

    /// Seal the application into one disposer removing everything it
    /// installed.
    pub(crate) fn finish(mut self) -> Disposer {
        let schema_id = self.schema_id;
        let root = self.root.downgrade();
        self.disposers.push(Disposer::new(move || {
            if let Some(root) = root.upgrade() {
                root.registry().remove_schema(schema_id);
            }
        }));
        Disposer::combine(self.disposers)
    }
}

impl std::fmt::Debug for ValidationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationBuilder")
            .field("schema_id", &self.schema_id)
            .field("conditions", &self.conditions.len())
            .field("registrations", &self.disposers.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ArraySchema, FieldConfig, GroupSchema};
    use crate::validation::ValidationOutcome;
    use serde_json::json;
    use std::time::Duration;

    fn required(value: &Value) -> Option<ValidationError> {
        let empty = value.is_null() || value.as_str().is_some_and(str::is_empty);
        empty.then(|| ValidationError::new("required", "Required"))
    }

    fn signup() -> GroupNode {
        GroupNode::new(
            GroupSchema::new()
                .field("email", FieldConfig::new(""))
                .field("password", FieldConfig::new("secret"))
                .field("confirm", FieldConfig::new(""))
                .field("ship", FieldConfig::new(false))
                .field("city", FieldConfig::new(""))
                .field(
                    "items",
                    ArraySchema::new(GroupSchema::new().field("sku", FieldConfig::new("")))
                        .with_items([json!({"sku": "A"})]),
                ),
        )
    }

    #[test]
    fn field_validator_runs_with_leaf_validation() {
        let form = signup();
        let _schema = form.apply_validation_schema(|v| {
            v.field("email", |value, _| required(value));
        });

        let email = form.field_at("email").unwrap();
        email.set_value(json!("a"));
        email.set_value(json!(""));
        assert_eq!(email.errors()[0].code, "required");
    }

    #[test]
    fn context_reads_other_fields() {
        let form = signup();
        let _schema = form.apply_validation_schema(|v| {
            v.field("confirm", |value, ctx| {
                (Some(value.clone()) != ctx.get("password"))
                    .then(|| ValidationError::new("mismatch", "Passwords differ"))
            });
        });

        let confirm = form.field_at("confirm").unwrap();
        confirm.set_value(json!("secrte"));
        assert!(confirm.invalid());
        confirm.set_value(json!("secret"));
        assert!(confirm.valid());
    }

    #[test]
    fn apply_when_gates_on_current_value() {
        let form = signup();
        let _schema = form.apply_validation_schema(|v| {
            v.apply_when("ship", |value| value == &json!(true), |v| {
                v.field("city", |value, _| required(value));
            });
        });

        let city = form.field_at("city").unwrap();
        city.set_value(json!("x"));
        city.set_value(json!(""));
        assert!(city.valid());

        form.get_field("ship").unwrap().set_value(json!(true));
        city.set_value(json!("x"));
        city.set_value(json!(""));
        assert!(city.invalid());
    }

    #[test]
    fn unresolved_paths_are_skipped() {
        let form = signup();
        let _schema = form.apply_validation_schema(|v| {
            v.field("nope", |value, _| required(value))
                .tree_for("nope.deeper", |_| None)
                .items("email", |_| {});
        });
        assert_eq!(form.registry().len(), 0);
    }

    #[test]
    fn dispose_removes_field_and_tree_validators() {
        let form = signup();
        let schema = form.apply_validation_schema(|v| {
            v.field("email", |value, _| required(value))
                .tree(|_| Some(ValidationError::custom("always")));
        });
        assert_eq!(form.field_at("email").unwrap().validator_count(), 1);
        assert_eq!(form.registry().len(), 1);

        schema.dispose();
        assert_eq!(form.field_at("email").unwrap().validator_count(), 0);
        assert_eq!(form.registry().len(), 0);
    }

    #[test]
    fn items_schema_reaches_list_items() {
        let form = signup();
        let _schema = form.apply_validation_schema(|v| {
            v.items("items", |item| {
                item.field("sku", |value, _| required(value));
            });
        });
        let pushed = form.array_at("items").unwrap().push(None);
        assert!(pushed.field_at("sku").unwrap().invalid());
        assert!(form.invalid());
    }

    #[tokio::test]
    async fn tree_validators_run_on_group_validation() {
        let form = signup();
        let _schema = form.apply_validation_schema(|v| {
            v.tree(|ctx| {
                let value = ctx.form_value();
                (value["password"] != value["confirm"])
                    .then(|| ValidationError::new("mismatch", "Passwords differ"))
            })
            .tree_for("confirm", |ctx| {
                (ctx.value() != &ctx.get("password").unwrap_or_default())
                    .then(|| ValidationError::new("mismatch", "Passwords differ"))
            });
        });

        assert_eq!(form.validate().await, ValidationOutcome::Invalid);
        assert_eq!(form.errors().len(), 1);
        assert_eq!(form.field_at("confirm").unwrap().errors().len(), 1);

        form.get_field("confirm").unwrap().set_value(json!("secret"));
        assert_eq!(form.validate().await, ValidationOutcome::Valid);
        assert!(form.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn async_field_validator_sees_context() {
        let form = signup();
        let _schema = form.apply_validation_schema(|v| {
            v.field_async("email", |value, ctx| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let taken = ctx.get("password") == Some(value);
                taken.then(|| ValidationError::new("taken", "Already registered"))
            });
        });

        let email = form.field_at("email").unwrap();
        email.set_value_with(json!("secret"), crate::node::SetValueOptions::silent());
        let run = email.validate();
        assert!(email.pending());
        assert_eq!(run.await, ValidationOutcome::Invalid);
    }
}
