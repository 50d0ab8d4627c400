//! List-Composite Node
//!
//! An [`ArrayNode`] holds an ordered list of [`GroupNode`] items, all built
//! from the same item schema. Items can be added, removed and reordered at
//! any time.
//!
//! The last behavior and validation schema applied to the list are kept and
//! installed on every item created afterwards, so a pushed item follows the
//! same rules as the ones already there. Each item keeps them under a fixed
//! registry key, which is what lets a later schema replace an earlier one.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::schema::{ArraySchema, BehaviorSchemaFn, GroupSchema, ValidationSchemaFn};
use super::{Control, GroupNode, NodeState};
use crate::behavior::BehaviorContext;
use crate::config::FormSettings;
use crate::lifecycle::Disposer;
use crate::reactive::{untracked, Effect, Signal};
use crate::validation::{ValidationBuilder, ValidationError, ValidationOutcome, ValidationRun};

const ITEM_BEHAVIOR_KEY: &str = "array-behavior";
const ITEM_VALIDATION_KEY: &str = "array-validation";

struct ArrayInner {
    state: NodeState,
    item_schema: GroupSchema,
    settings: FormSettings,
    initial: Vec<Value>,
    items: RwLock<Vec<GroupNode>>,
    length: Signal<usize>,
    /// Bumped on every structural change, including moves.
    revision: Signal<u64>,
    item_behavior: RwLock<Option<BehaviorSchemaFn>>,
    item_validation: RwLock<Option<ValidationSchemaFn>>,
}

/// Handle to a list-composite node.
#[derive(Clone)]
pub struct ArrayNode {
    inner: Arc<ArrayInner>,
}

impl ArrayNode {
    /// Build a standalone list from its schema.
    pub fn new(schema: ArraySchema) -> Self {
        Self::build(&schema, &FormSettings::default(), None)
    }

    pub(crate) fn build(schema: &ArraySchema, settings: &FormSettings, value: Option<&Value>) -> Self {
        let initial = match value {
            Some(Value::Array(values)) => values.clone(),
            _ => schema.initial.clone(),
        };
        let items: Vec<GroupNode> = initial
            .iter()
            .map(|value| GroupNode::build(&schema.item, settings, Some(value)))
            .collect();

        Self {
            inner: Arc::new(ArrayInner {
                state: NodeState::new(false),
                item_schema: schema.item.clone(),
                settings: settings.clone(),
                length: Signal::new(items.len()),
                revision: Signal::new(0),
                items: RwLock::new(items),
                initial,
                item_behavior: RwLock::new(None),
                item_validation: RwLock::new(None),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Append an item built from the item schema, patched with `value`.
    pub fn push(&self, value: Option<Value>) -> GroupNode {
        let item = self.create_item(value.as_ref(), true);
        self.inner.items.write().push(item.clone());
        self.structure_changed();
        item
    }

    /// Insert an item at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: Option<Value>) -> GroupNode {
        let item = self.create_item(value.as_ref(), true);
        {
            let mut items = self.inner.items.write();
            let index = index.min(items.len());
            items.insert(index, item.clone());
        }
        self.structure_changed();
        item
    }

    /// Remove and dispose the item at `index`.
    ///
    /// Returns `false` when `index` is out of bounds.
    pub fn remove_at(&self, index: usize) -> bool {
        let removed = {
            let mut items = self.inner.items.write();
            (index < items.len()).then(|| items.remove(index))
        };
        match removed {
            Some(item) => {
                item.dispose();
                self.structure_changed();
                true
            }
            None => false,
        }
    }

    /// Remove and dispose every item.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.inner.items.write());
        if removed.is_empty() {
            return;
        }
        for item in &removed {
            item.dispose();
        }
        self.structure_changed();
    }

    /// Move the item at `from` to position `to`.
    ///
    /// Returns `false` when either index is out of bounds.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        {
            let mut items = self.inner.items.write();
            if from >= items.len() || to >= items.len() {
                return false;
            }
            if from == to {
                return true;
            }
            let item = items.remove(from);
            items.insert(to, item);
        }
        self.structure_changed();
        true
    }

    /// Build an item and install the stored item schemas on it. With
    /// `validate` the item validation schema runs at once; rebuilding on
    /// reset skips it so the list comes back valid.
    fn create_item(&self, value: Option<&Value>, validate: bool) -> GroupNode {
        let item = GroupNode::build(&self.inner.item_schema, &self.inner.settings, value);
        if self.inner.state.disabled.get_untracked() {
            item.disable();
        }

        let behavior = self.inner.item_behavior.read().clone();
        if let Some(behavior) = behavior {
            item.install_behavior(ITEM_BEHAVIOR_KEY, |ctx| behavior(ctx));
        }

        let validation = self.inner.item_validation.read().clone();
        if let Some(validation) = validation {
            item.install_validation(ITEM_VALIDATION_KEY, |builder| validation(builder));
            if validate {
                item.trigger_validation();
            }
        }
        item
    }

    fn structure_changed(&self) {
        let len = self.inner.items.read().len();
        self.inner.length.set(len);
        self.inner.revision.update(|revision| revision + 1);
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    /// Item at `index`. Tracked: an effect reading it re-runs when the list
    /// changes shape.
    pub fn at(&self, index: usize) -> Option<GroupNode> {
        self.inner.revision.get();
        self.inner.items.read().get(index).cloned()
    }

    /// Number of items, untracked.
    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    /// Number of items, tracked.
    pub fn length(&self) -> usize {
        self.inner.length.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current items.
    pub fn items(&self) -> Vec<GroupNode> {
        self.inner.revision.get();
        self.inner.items.read().clone()
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&GroupNode, usize),
    {
        for (index, item) in self.items().iter().enumerate() {
            f(item, index);
        }
    }

    pub fn map<R, F>(&self, mut f: F) -> Vec<R>
    where
        F: FnMut(&GroupNode, usize) -> R,
    {
        self.items()
            .iter()
            .enumerate()
            .map(|(index, item)| f(item, index))
            .collect()
    }

    /// The values the list was built with.
    pub fn initial_value(&self) -> &[Value] {
        &self.inner.initial
    }

    fn enabled_items(&self) -> Vec<GroupNode> {
        self.items()
            .into_iter()
            .filter(|item| !item.disabled())
            .collect()
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Call `callback` with the new length after every insertion or removal.
    pub fn watch_length<F>(&self, callback: F) -> Disposer
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let disposer = self
            .inner
            .length
            .watch(move |len| untracked(|| callback(*len)));
        self.inner.state.own("watch-length", disposer)
    }

    /// Call `callback` with every item's `field_key` value whenever any of
    /// them changes, or the list changes shape.
    ///
    /// Items without that field are skipped.
    pub fn watch_items<F>(&self, field_key: &str, callback: F) -> Disposer
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let list = self.clone();
        let field_key = field_key.to_string();
        let last: Mutex<Option<Vec<Value>>> = Mutex::new(None);

        let effect = Effect::new(move || {
            let values: Vec<Value> = list
                .items()
                .iter()
                .filter_map(|item| item.get_field(&field_key))
                .map(|field| field.value())
                .collect();

            let previous = last.lock().replace(values.clone());
            match previous {
                Some(previous) if previous != values => untracked(|| callback(&values)),
                _ => {}
            }
        });
        self.inner.state.own("watch-items", effect.disposer())
    }

    // ------------------------------------------------------------------
    // Item schemas
    // ------------------------------------------------------------------

    /// Apply a behavior schema to every item, now and in the future.
    ///
    /// Replaces the previously applied item behavior schema.
    pub fn apply_behavior_schema<F>(&self, schema: F) -> Disposer
    where
        F: Fn(&mut BehaviorContext) + Send + Sync + 'static,
    {
        self.apply_behavior_schema_arc(Arc::new(schema))
    }

    pub(crate) fn apply_behavior_schema_arc(&self, schema: BehaviorSchemaFn) -> Disposer {
        *self.inner.item_behavior.write() = Some(Arc::clone(&schema));
        for item in self.items_untracked() {
            item.install_behavior(ITEM_BEHAVIOR_KEY, |ctx| schema(ctx));
        }
        tracing::debug!(items = self.len(), "applied item behavior schema");

        let list = self.clone();
        let applied = schema;
        let disposer = Disposer::new(move || {
            let mut current = list.inner.item_behavior.write();
            if current.as_ref().is_some_and(|s| Arc::ptr_eq(s, &applied)) {
                *current = None;
                drop(current);
                for item in list.items_untracked() {
                    item.uninstall(ITEM_BEHAVIOR_KEY);
                }
            }
        });
        self.inner.state.own("item-behavior", disposer)
    }

    /// Apply a validation schema to every item, now and in the future.
    ///
    /// Items pushed afterwards are validated against it immediately.
    pub fn apply_validation_schema<F>(&self, schema: F) -> Disposer
    where
        F: Fn(&mut ValidationBuilder) + Send + Sync + 'static,
    {
        self.apply_validation_schema_arc(Arc::new(schema))
    }

    pub(crate) fn apply_validation_schema_arc(&self, schema: ValidationSchemaFn) -> Disposer {
        *self.inner.item_validation.write() = Some(Arc::clone(&schema));
        for item in self.items_untracked() {
            item.install_validation(ITEM_VALIDATION_KEY, |builder| schema(builder));
        }
        tracing::debug!(items = self.len(), "applied item validation schema");

        let list = self.clone();
        let applied = schema;
        let disposer = Disposer::new(move || {
            let mut current = list.inner.item_validation.write();
            if current.as_ref().is_some_and(|s| Arc::ptr_eq(s, &applied)) {
                *current = None;
                drop(current);
                for item in list.items_untracked() {
                    item.uninstall(ITEM_VALIDATION_KEY);
                }
            }
        });
        self.inner.state.own("item-validation", disposer)
    }

    fn items_untracked(&self) -> Vec<GroupNode> {
        self.inner.items.read().clone()
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub(crate) fn begin_validation(&self) -> ValidationRun {
        let state = &self.inner.state;
        let generation = state.next_generation();

        if state.is_disposed() || state.disabled.get_untracked() {
            state.clear_validation();
            return ValidationRun::Done(ValidationOutcome::Valid);
        }
        state.errors.set(Vec::new());

        let runs: Vec<ValidationRun> = untracked(|| {
            self.enabled_items()
                .iter()
                .map(GroupNode::begin_validation)
                .collect()
        });

        let list = self.clone();
        ValidationRun::join(runs, move || {
            if !list.inner.state.is_current(generation) {
                tracing::debug!(generation, "discarding stale list validation");
                return ValidationOutcome::Superseded;
            }
            match untracked(|| list.status()) {
                super::NodeStatus::Valid => ValidationOutcome::Valid,
                super::NodeStatus::Invalid => ValidationOutcome::Invalid,
                super::NodeStatus::Pending => ValidationOutcome::Superseded,
            }
        })
    }

    pub(crate) fn trigger_validation(&self) {
        if self.inner.state.is_disposed() {
            return;
        }
        let list = self.clone();
        self.begin_validation()
            .detach(move || list.abandon_validation());
    }

    pub(crate) fn abandon_validation(&self) {
        self.inner.state.next_generation();
        for item in self.items_untracked() {
            item.abandon_validation();
        }
    }

    pub(crate) fn append_errors(&self, errors: Vec<ValidationError>) {
        self.inner.state.errors.update(|current| {
            let mut next = current.clone();
            next.extend(errors);
            next
        });
    }

    fn rebuild(&self, values: &[Value]) {
        let fresh: Vec<GroupNode> = values
            .iter()
            .map(|value| self.create_item(Some(value), false))
            .collect();
        let removed = std::mem::replace(&mut *self.inner.items.write(), fresh);
        for item in removed {
            item.dispose();
        }
        self.structure_changed();
    }
}

impl Control for ArrayNode {
    fn value(&self) -> Value {
        let values = self
            .items()
            .iter()
            .filter(|item| !item.disabled())
            .map(|item| item.value())
            .collect();
        Value::Array(values)
    }

    fn set_value(&self, value: Value) {
        let values = match value {
            Value::Array(values) => values,
            other => {
                tracing::warn!(found = crate::error::kind_of(&other), "list value must be an array");
                return;
            }
        };

        let existing = self.items_untracked();
        for (item, value) in existing.iter().zip(&values) {
            item.set_value(value.clone());
        }

        if values.len() > existing.len() {
            let added: Vec<GroupNode> = values[existing.len()..]
                .iter()
                .map(|value| self.create_item(Some(value), true))
                .collect();
            self.inner.items.write().extend(added);
            self.structure_changed();
        } else if values.len() < existing.len() {
            let removed = self.inner.items.write().split_off(values.len());
            for item in removed {
                item.dispose();
            }
            self.structure_changed();
        }
    }

    fn patch_value(&self, value: Value) {
        let values = match value {
            Value::Array(values) => values,
            other => {
                tracing::warn!(found = crate::error::kind_of(&other), "list value must be an array");
                return;
            }
        };
        for (item, value) in self.items_untracked().iter().zip(values) {
            item.patch_value(value);
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
        !self.inner.state.errors.get().is_empty()
            || self.enabled_items().iter().any(|item| item.invalid())
    }

    fn pending(&self) -> bool {
        if self.inner.state.disabled.get() {
            return false;
        }
        self.enabled_items().iter().any(|item| item.pending())
    }

    fn touched(&self) -> bool {
        self.inner.state.touched.get() || self.enabled_items().iter().any(|item| item.touched())
    }

    fn dirty(&self) -> bool {
        self.inner.state.dirty.get() || self.enabled_items().iter().any(|item| item.dirty())
    }

    fn disabled(&self) -> bool {
        self.inner.state.disabled.get()
    }

    fn visible(&self) -> bool {
        self.inner.state.visible.get()
    }

    fn mark_as_touched(&self) {
        self.inner.state.touched.set(true);
        for item in self.enabled_items() {
            item.mark_as_touched();
        }
    }

    fn mark_as_untouched(&self) {
        self.inner.state.touched.set(false);
        for item in self.enabled_items() {
            item.mark_as_untouched();
        }
    }

    fn mark_as_dirty(&self) {
        self.inner.state.dirty.set(true);
        for item in self.enabled_items() {
            item.mark_as_dirty();
        }
    }

    fn mark_as_pristine(&self) {
        self.inner.state.dirty.set(false);
        for item in self.enabled_items() {
            item.mark_as_pristine();
        }
    }

    fn touch_all(&self) {
        self.inner.state.touched.set(true);
        for item in self.enabled_items() {
            item.touch_all();
        }
    }

    fn enable(&self) {
        self.inner.state.disabled.set(false);
        for item in self.items_untracked() {
            item.enable();
        }
    }

    fn disable(&self) {
        let state = &self.inner.state;
        state.disabled.set(true);
        state.next_generation();
        state.clear_validation();
        for item in self.items_untracked() {
            item.disable();
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
        match value {
            Some(Value::Array(values)) => self.rebuild(&values),
            Some(other) => {
                tracing::warn!(found = crate::error::kind_of(&other), "list value must be an array");
                self.rebuild(&self.inner.initial);
            }
            None => self.rebuild(&self.inner.initial),
        }
        state.clear_interaction();
        state.clear_validation();
    }

    fn reset_to_initial(&self) {
        self.reset(None);
    }

    fn validate(&self) -> BoxFuture<'static, ValidationOutcome> {
        self.begin_validation().into_future()
    }

    fn dispose(&self) {
        let state = &self.inner.state;
        if !state.begin_dispose() {
            return;
        }
        tracing::debug!(items = self.len(), "disposing list");
        state.next_generation();
        state.subscriptions.dispose_all();
        *self.inner.item_behavior.write() = None;
        *self.inner.item_validation.write() = None;
        for item in self.items_untracked() {
            item.dispose();
        }
        state.clear_signal_subscribers();
        self.inner.length.clear_subscribers();
        self.inner.revision.clear_subscribers();
    }
}

impl std::fmt::Debug for ArrayNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayNode")
            .field("len", &self.len())
            .field("disabled", &self.inner.state.disabled.get_untracked())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
