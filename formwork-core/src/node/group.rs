//! Object-Composite Node
//!
//! A [`GroupNode`] has a fixed, ordered set of named children built once from
//! a [`GroupSchema`]. Its value, status and interaction flags are derived from
//! the enabled children on every read.
//!
//! # Schemas
//!
//! Behavior and validation schemas are functions run once against the group.
//! Whatever they wire up is recorded in the group's subscription registry,
//! and the returned [`Disposer`] undoes exactly that application.
//!
//! Tree validators registered by a validation schema live in this group's
//! own [`ValidationRegistry`] and run at the end of every group validation,
//! after the children have settled.

use std::future::Future;
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::schema::{FormConfig, GroupSchema};
use super::{ArrayNode, Control, FieldNode, FormNode, NodeState};
use crate::behavior::BehaviorContext;
use crate::config::FormSettings;
use crate::error::{FormError, Result};
use crate::lifecycle::Disposer;
use crate::path;
use crate::reactive::{untracked, Signal};
use crate::validation::{
    ValidationBuilder, ValidationError, ValidationOutcome, ValidationRegistry, ValidationRun,
};

struct GroupInner {
    state: NodeState,
    fields: IndexMap<String, FormNode>,
    submitting: Signal<bool>,
    registry: ValidationRegistry,
}

/// Handle to an object-composite node.
#[derive(Clone)]
pub struct GroupNode {
    inner: Arc<GroupInner>,
}

/// Non-owning handle to a [`GroupNode`].
///
/// Validators installed on leaves hold the root this way, so the tree does
/// not keep itself alive through its own validators.
#[derive(Clone)]
pub struct WeakGroupNode {
    inner: Weak<GroupInner>,
}

impl WeakGroupNode {
    pub fn upgrade(&self) -> Option<GroupNode> {
        self.inner.upgrade().map(|inner| GroupNode { inner })
    }
}

impl GroupNode {
    /// Build a group from its schema with default settings.
    pub fn new(schema: GroupSchema) -> Self {
        Self::with_settings(schema, FormSettings::default())
    }

    /// Build a group, applying `settings` to every leaf without its own
    /// trigger or debounce.
    pub fn with_settings(schema: GroupSchema, settings: FormSettings) -> Self {
        Self::build(&schema, &settings, None)
    }

    /// Build a group from a structured configuration, then apply its
    /// behavior and validation schemas, in that order.
    pub fn from_config(config: FormConfig) -> Self {
        let FormConfig {
            form,
            behavior,
            validation,
            settings,
        } = config;
        let group = Self::with_settings(form, settings);
        if let Some(behavior) = behavior {
            group.apply_behavior_schema(move |ctx| behavior(ctx));
        }
        if let Some(validation) = validation {
            group.apply_validation_schema(move |builder| validation(builder));
        }
        group
    }

    pub(crate) fn build(schema: &GroupSchema, settings: &FormSettings, value: Option<&Value>) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|(key, child)| {
                let child_value = value.and_then(|v| v.get(key));
                (key.clone(), FormNode::build(child, settings, child_value))
            })
            .collect();

        Self {
            inner: Arc::new(GroupInner {
                state: NodeState::new(false),
                fields,
                submitting: Signal::new(false),
                registry: ValidationRegistry::new(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakGroupNode {
        WeakGroupNode {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same group.
    pub fn ptr_eq(&self, other: &GroupNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------

    /// Direct child by key.
    pub fn get_field(&self, key: &str) -> Option<FormNode> {
        self.inner.fields.get(key).cloned()
    }

    /// Any descendant by path, e.g. `"address.city"` or `"items[0].name"`.
    pub fn get_field_by_path(&self, path: &str) -> Option<FormNode> {
        path::get_node_by_path(self, path)
    }

    /// Like [`get_field_by_path`](Self::get_field_by_path), but a miss is an
    /// error.
    pub fn node_required(&self, path: &str) -> Result<FormNode> {
        self.get_field_by_path(path).ok_or_else(|| FormError::NotFound {
            path: path.to_string(),
        })
    }

    /// Leaf at `path`, if the path resolves to one.
    pub fn field_at(&self, path: &str) -> Option<FieldNode> {
        match self.get_field_by_path(path)? {
            FormNode::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Group at `path`, if the path resolves to one.
    pub fn group_at(&self, path: &str) -> Option<GroupNode> {
        match self.get_field_by_path(path)? {
            FormNode::Group(group) => Some(group),
            _ => None,
        }
    }

    /// List at `path`, if the path resolves to one.
    pub fn array_at(&self, path: &str) -> Option<ArrayNode> {
        match self.get_field_by_path(path)? {
            FormNode::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.fields.keys().map(String::as_str)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &FormNode)> {
        self.inner
            .fields
            .iter()
            .map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.inner.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.is_empty()
    }

    fn enabled_children(&self) -> impl Iterator<Item = &FormNode> {
        self.inner.fields.values().filter(|child| !child.disabled())
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Assign errors to descendants by path, e.g. errors returned by a
    /// server. Validators do not re-run.
    ///
    /// Errors for a path that does not resolve are kept on this group.
    pub fn set_field_errors<I, P>(&self, errors: I)
    where
        I: IntoIterator<Item = (P, Vec<ValidationError>)>,
        P: AsRef<str>,
    {
        for (path, list) in errors {
            let path = path.as_ref();
            match self.get_field_by_path(path) {
                Some(node) => node.set_errors(list),
                None => {
                    tracing::warn!(path, "no node for field errors; keeping them on the group");
                    self.append_errors(list);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Schemas
    // ------------------------------------------------------------------

    /// Run a behavior schema against this group.
    ///
    /// The returned disposer tears down every rule the schema wired.
    pub fn apply_behavior_schema<F>(&self, schema: F) -> Disposer
    where
        F: FnOnce(&mut BehaviorContext),
    {
        let disposer = self.run_behavior_schema(schema);
        self.inner.state.own("behavior", disposer)
    }

    /// Run a validation schema against this group.
    ///
    /// Leaf validators are installed on the leaves they name; tree
    /// validators go into this group's registry. The returned disposer
    /// removes both.
    pub fn apply_validation_schema<F>(&self, schema: F) -> Disposer
    where
        F: FnOnce(&mut ValidationBuilder),
    {
        let disposer = self.run_validation_schema(schema);
        self.inner.state.own("validation", disposer)
    }

    /// Apply a behavior schema under a fixed registry key, replacing what
    /// was applied under that key before.
    pub(crate) fn install_behavior<F>(&self, key: &str, schema: F)
    where
        F: FnOnce(&mut BehaviorContext),
    {
        let disposer = self.run_behavior_schema(schema);
        self.inner.state.subscriptions.add(key, disposer);
    }

    pub(crate) fn install_validation<F>(&self, key: &str, schema: F)
    where
        F: FnOnce(&mut ValidationBuilder),
    {
        let disposer = self.run_validation_schema(schema);
        self.inner.state.subscriptions.add(key, disposer);
    }

    pub(crate) fn uninstall(&self, key: &str) -> bool {
        self.inner.state.subscriptions.remove(key)
    }

    fn run_behavior_schema<F>(&self, schema: F) -> Disposer
    where
        F: FnOnce(&mut BehaviorContext),
    {
        let mut ctx = BehaviorContext::new(self.clone());
        schema(&mut ctx);
        tracing::debug!(rules = ctx.len(), "applied behavior schema");
        ctx.into_disposer()
    }

    fn run_validation_schema<F>(&self, schema: F) -> Disposer
    where
        F: FnOnce(&mut ValidationBuilder),
    {
        let mut builder = ValidationBuilder::new(self);
        schema(&mut builder);
        tracing::debug!(
            schema = builder.schema_id(),
            tree_validators = self.inner.registry.len(),
            "applied validation schema"
        );
        builder.finish()
    }

    pub(crate) fn registry(&self) -> &ValidationRegistry {
        &self.inner.registry
    }

    // ------------------------------------------------------------------
    // Validation and submit
    // ------------------------------------------------------------------

    /// Whether a [`submit`](Self::submit) is running.
    pub fn submitting(&self) -> bool {
        self.inner.submitting.get()
    }

    /// Touch everything, validate, and call `on_submit` with the value only
    /// if the form came out valid.
    ///
    /// Returns `None` when the form was invalid (or a newer validation
    /// overtook this one).
    pub async fn submit<F, Fut, R>(&self, on_submit: F) -> Option<R>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = R>,
    {
        self.touch_all();
        self.inner.submitting.set(true);

        let outcome = self.validate().await;
        tracing::debug!(?outcome, "submit validation finished");

        let result = if outcome.is_valid() {
            Some(on_submit(self.get_value()).await)
        } else {
            None
        };

        self.inner.submitting.set(false);
        result
    }

    pub(crate) fn begin_validation(&self) -> ValidationRun {
        let state = &self.inner.state;
        let generation = state.next_generation();

        if state.is_disposed() || state.disabled.get_untracked() {
            state.clear_validation();
            return ValidationRun::Done(ValidationOutcome::Valid);
        }

        // Composite-level errors are recomputed by the tree validators.
        state.errors.set(Vec::new());

        let runs: Vec<ValidationRun> = untracked(|| {
            self.enabled_children()
                .map(FormNode::begin_validation)
                .collect()
        });

        let group = self.clone();
        ValidationRun::join(runs, move || group.finish_validation(generation))
    }

    fn finish_validation(&self, generation: u64) -> ValidationOutcome {
        if !self.inner.state.is_current(generation) {
            tracing::debug!(generation, "discarding stale group validation");
            return ValidationOutcome::Superseded;
        }
        self.inner.registry.run(self);

        match untracked(|| self.status()) {
            super::NodeStatus::Valid => ValidationOutcome::Valid,
            super::NodeStatus::Invalid => ValidationOutcome::Invalid,
            // A child restarted its own validation while we waited.
            super::NodeStatus::Pending => ValidationOutcome::Superseded,
        }
    }

    pub(crate) fn trigger_validation(&self) {
        if self.inner.state.is_disposed() {
            return;
        }
        let group = self.clone();
        self.begin_validation()
            .detach(move || group.abandon_validation());
    }

    pub(crate) fn abandon_validation(&self) {
        self.inner.state.next_generation();
        for child in self.inner.fields.values() {
            child.abandon_validation();
        }
    }

    pub(crate) fn append_errors(&self, errors: Vec<ValidationError>) {
        self.inner.state.errors.update(|current| {
            let mut next = current.clone();
            next.extend(errors);
            next
        });
    }
}

impl Control for GroupNode {
    fn value(&self) -> Value {
        let mut map = Map::with_capacity(self.inner.fields.len());
        for (key, child) in &self.inner.fields {
            if !child.disabled() {
                map.insert(key.clone(), child.value());
            }
        }
        Value::Object(map)
    }

    fn set_value(&self, value: Value) {
        match value {
            Value::Object(entries) => {
                for (key, child_value) in entries {
                    match self.inner.fields.get(&key) {
                        Some(child) => child.set_value(child_value),
                        None => tracing::trace!(key = %key, "ignoring unknown key"),
                    }
                }
            }
            other => tracing::warn!(found = crate::error::kind_of(&other), "group value must be an object"),
        }
    }

    fn patch_value(&self, value: Value) {
        match value {
            Value::Object(entries) => {
                for (key, child_value) in entries {
                    if let Some(child) = self.inner.fields.get(&key) {
                        child.patch_value(child_value);
                    }
                }
            }
            other => tracing::warn!(found = crate::error::kind_of(&other), "group value must be an object"),
        }
    }

    fn errors(&self) -> Vec<ValidationError> {
        self.inner.state.errors.get()
    }

    fn set_errors(&self, errors: Vec<ValidationError>) {
        self.inner.state.errors.set(errors);
    }

    fn invalid(&self) -> bool {
        if self.inner.state.disabled.get() {
            return false;
        }
        !self.inner.state.errors.get().is_empty() || self.enabled_children().any(|c| c.invalid())
    }

    fn pending(&self) -> bool {
        if self.inner.state.disabled.get() {
            return false;
        }
        self.enabled_children().any(|c| c.pending())
    }

    fn touched(&self) -> bool {
        self.inner.state.touched.get() || self.enabled_children().any(|c| c.touched())
    }

    fn dirty(&self) -> bool {
        self.inner.state.dirty.get() || self.enabled_children().any(|c| c.dirty())
    }

    fn disabled(&self) -> bool {
        self.inner.state.disabled.get()
    }

    fn visible(&self) -> bool {
        self.inner.state.visible.get()
    }

    fn mark_as_touched(&self) {
        self.inner.state.touched.set(true);
        for child in self.enabled_children() {
            child.mark_as_touched();
        }
    }

    fn mark_as_untouched(&self) {
        self.inner.state.touched.set(false);
        for child in self.enabled_children() {
            child.mark_as_untouched();
        }
    }

    fn mark_as_dirty(&self) {
        self.inner.state.dirty.set(true);
        for child in self.enabled_children() {
            child.mark_as_dirty();
        }
    }

    fn mark_as_pristine(&self) {
        self.inner.state.dirty.set(false);
        for child in self.enabled_children() {
            child.mark_as_pristine();
        }
    }

    fn touch_all(&self) {
        self.inner.state.touched.set(true);
        for child in self.enabled_children() {
            child.touch_all();
        }
    }

    fn enable(&self) {
        self.inner.state.disabled.set(false);
        for child in self.inner.fields.values() {
            child.enable();
        }
    }

    fn disable(&self) {
        let state = &self.inner.state;
        state.disabled.set(true);
        state.next_generation();
        state.clear_validation();
        for child in self.inner.fields.values() {
            child.disable();
        }
    }

    fn show(&self) {
        self.inner.state.visible.set(true);
    }

    fn hide(&self) {
        self.inner.state.visible.set(false);
    }

    fn reset(&self, value: Option<Value>) {
        let state = &self.inner.state;
        state.next_generation();
        for (key, child) in &self.inner.fields {
            let child_value = value.as_ref().and_then(|v| v.get(key)).cloned();
            child.reset(child_value);
        }
        state.clear_interaction();
        state.clear_validation();
    }

    fn reset_to_initial(&self) {
        let state = &self.inner.state;
        state.next_generation();
        for child in self.inner.fields.values() {
            child.reset_to_initial();
        }
        state.clear_interaction();
        state.clear_validation();
    }

    fn validate(&self) -> BoxFuture<'static, ValidationOutcome> {
        self.begin_validation().into_future()
    }

    fn dispose(&self) {
        let state = &self.inner.state;
        if !state.begin_dispose() {
            return;
        }
        tracing::debug!(
            children = self.inner.fields.len(),
            subscriptions = state.subscriptions.len(),
            "disposing group"
        );
        state.next_generation();
        state.subscriptions.dispose_all();
        self.inner.registry.clear();
        for child in self.inner.fields.values() {
            child.dispose();
        }
        state.clear_signal_subscribers();
        self.inner.submitting.clear_subscribers();
    }
}

impl std::fmt::Debug for GroupNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupNode")
            .field("fields", &self.inner.fields.keys().collect::<Vec<_>>())
            .field("disabled", &self.inner.state.disabled.get_untracked())
            .finish()
    }
}

impl std::fmt::Debug for WeakGroupNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakGroupNode")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
