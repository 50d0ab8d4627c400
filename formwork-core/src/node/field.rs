//! Leaf Node
//!
//! A [`FieldNode`] owns one value cell and the validators that judge it.
//!
//! # Validation
//!
//! Every attempt takes a fresh id from the node's generation counter. Sync
//! validators run first, all of them, and their errors are applied at once.
//! If none failed and async validators exist, the node goes `pending` and
//! the async validators run concurrently. When they finish, their errors are
//! applied only if no newer attempt has started in the meantime; otherwise
//! the result is dropped and the caller sees
//! [`ValidationOutcome::Superseded`].
//!
//! Disabling, resetting and disposing the node all start a new generation,
//! so results from before the change can never land afterwards.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::oneshot;

use super::schema::{Component, FieldConfig};
use super::{Control, FormNode, NodeState, SetValueOptions};
use crate::config::{FormSettings, UpdateOn};
use crate::lifecycle::{spawn_detached, Debouncer, Disposer};
use crate::reactive::{untracked, Effect, Signal};
use crate::validation::{
    AsyncValidator, SyncValidator, ValidateOptions, ValidationError, ValidationOutcome,
    ValidationRun,
};

/// A validator plus the schema that installed it (`None` for validators
/// given at construction or added directly).
struct Tagged<V> {
    schema: Option<u64>,
    validator: V,
}

struct FieldInner {
    state: NodeState,
    value: Signal<Value>,
    initial: Value,
    component: Option<Component>,
    validators: RwLock<Vec<Tagged<SyncValidator>>>,
    async_validators: RwLock<Vec<Tagged<AsyncValidator>>>,
    update_on: RwLock<UpdateOn>,
    debounce: RwLock<Option<Duration>>,
    debouncer: Debouncer,
}

/// Handle to a leaf node.
#[derive(Clone)]
pub struct FieldNode {
    inner: Arc<FieldInner>,
}

impl FieldNode {
    /// Build a standalone leaf from its config.
    pub fn new(config: FieldConfig) -> Self {
        Self::build(&config, &FormSettings::default(), None)
    }

    pub(crate) fn build(config: &FieldConfig, settings: &FormSettings, value: Option<Value>) -> Self {
        // An explicit zero on the field turns off the form-wide debounce.
        let debounce = match config.debounce {
            Some(delay) => Some(delay).filter(|d| !d.is_zero()),
            None => settings.debounce(),
        };
        let untagged = |validator: SyncValidator| Tagged {
            schema: None,
            validator,
        };
        Self {
            inner: Arc::new(FieldInner {
                state: NodeState::new(config.disabled),
                value: Signal::new(value.clone().unwrap_or_else(|| config.value.clone())),
                initial: value.unwrap_or_else(|| config.value.clone()),
                component: config.component.clone(),
                validators: RwLock::new(config.validators.iter().cloned().map(untagged).collect()),
                async_validators: RwLock::new(
                    config
                        .async_validators
                        .iter()
                        .cloned()
                        .map(|validator| Tagged {
                            schema: None,
                            validator,
                        })
                        .collect(),
                ),
                update_on: RwLock::new(config.update_on.unwrap_or(settings.update_on)),
                debounce: RwLock::new(debounce),
                debouncer: Debouncer::new(debounce.unwrap_or_default()),
            }),
        }
    }

    /// The value captured at construction.
    pub fn initial_value(&self) -> &Value {
        &self.inner.initial
    }

    /// The render descriptor given in the schema, untouched.
    pub fn component(&self) -> Option<&Component> {
        self.inner.component.as_ref()
    }

    /// Set the value with explicit options.
    pub fn set_value_with(&self, value: Value, options: SetValueOptions) {
        let changed = self.inner.value.set(value);
        if options.mark_dirty {
            self.inner.state.dirty.set(true);
        }
        if changed && options.validate && self.update_on() == UpdateOn::Change {
            self.trigger_validation();
        }
    }

    pub fn update_on(&self) -> UpdateOn {
        *self.inner.update_on.read()
    }

    /// Change when the leaf validates itself.
    pub fn set_update_on(&self, trigger: UpdateOn) {
        *self.inner.update_on.write() = trigger;
    }

    /// Change the delay applied to trigger-driven validation.
    pub fn set_debounce(&self, delay: Option<Duration>) {
        *self.inner.debounce.write() = delay.filter(|d| !d.is_zero());
    }

    /// Add a sync validator after construction.
    pub fn add_validator<F>(&self, validator: F)
    where
        F: Fn(&Value) -> Option<ValidationError> + Send + Sync + 'static,
    {
        self.inner.validators.write().push(Tagged {
            schema: None,
            validator: Arc::new(validator),
        });
    }

    /// Add an async validator after construction.
    pub fn add_async_validator<F, Fut>(&self, validator: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Option<ValidationError>> + Send + 'static,
    {
        self.inner.async_validators.write().push(Tagged {
            schema: None,
            validator: Arc::new(move |value: Value| validator(value).boxed()),
        });
    }

    /// Remove every validator, including schema-installed ones.
    pub fn clear_validators(&self) {
        self.inner.validators.write().clear();
        self.inner.async_validators.write().clear();
    }

    pub fn validator_count(&self) -> usize {
        self.inner.validators.read().len() + self.inner.async_validators.read().len()
    }

    pub(crate) fn install_validator(&self, schema: u64, validator: SyncValidator) {
        self.inner.validators.write().push(Tagged {
            schema: Some(schema),
            validator,
        });
    }

    pub(crate) fn install_async_validator(&self, schema: u64, validator: AsyncValidator) {
        self.inner.async_validators.write().push(Tagged {
            schema: Some(schema),
            validator,
        });
    }

    pub(crate) fn uninstall_schema(&self, schema: u64) {
        self.inner
            .validators
            .write()
            .retain(|tagged| tagged.schema != Some(schema));
        self.inner
            .async_validators
            .write()
            .retain(|tagged| tagged.schema != Some(schema));
    }

    /// Validate, optionally debounced.
    ///
    /// A debounced call replaced by a later one on the same leaf resolves to
    /// [`ValidationOutcome::Superseded`] without ever running.
    pub fn validate_with(&self, options: ValidateOptions) -> BoxFuture<'static, ValidationOutcome> {
        let delay = match options.debounce.filter(|d| !d.is_zero()) {
            Some(delay) => delay,
            None => return self.begin_validation().into_future(),
        };

        let (tx, rx) = oneshot::channel();
        let node = self.clone();
        self.inner.debouncer.schedule_after(delay, move || match node.begin_validation() {
            ValidationRun::Done(outcome) => {
                let _ = tx.send(outcome);
            }
            ValidationRun::Async(pending) => {
                let spawned = spawn_detached(async move {
                    let _ = tx.send(pending.await);
                });
                if !spawned {
                    node.abandon_validation();
                }
            }
        });

        async move { rx.await.unwrap_or(ValidationOutcome::Superseded) }.boxed()
    }

    /// Run a pending debounced validation now.
    pub fn flush_validation(&self) -> bool {
        self.inner.debouncer.flush()
    }

    /// Drop a pending debounced validation.
    pub fn cancel_validation(&self) -> bool {
        self.inner.debouncer.cancel()
    }

    /// Recompute this leaf from `sources` whenever any of them changes.
    ///
    /// Runs once immediately. The computed value is written without marking
    /// the leaf dirty.
    pub fn compute_from<F>(&self, sources: &[FormNode], compute: F) -> Disposer
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        let target = self.clone();
        let sources = sources.to_vec();
        let effect = Effect::new(move || {
            let values: Vec<Value> = sources.iter().map(|source| source.value()).collect();
            untracked(|| {
                let next = compute(&values);
                target.set_value_with(next, SetValueOptions::programmatic());
            });
        });
        self.inner.state.own("compute", effect.disposer())
    }

    /// Call `callback` with the new value on every change.
    pub fn watch<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let disposer = self
            .inner
            .value
            .watch(move |value| untracked(|| callback(value)));
        self.inner.state.own("watch", disposer)
    }

    /// Sync pass of a validation attempt.
    pub(crate) fn begin_validation(&self) -> ValidationRun {
        let state = &self.inner.state;
        let generation = state.next_generation();

        if state.is_disposed() || state.disabled.get_untracked() {
            state.clear_validation();
            return ValidationRun::Done(ValidationOutcome::Valid);
        }

        let value = self.inner.value.get_untracked();
        let validators: Vec<SyncValidator> = self
            .inner
            .validators
            .read()
            .iter()
            .map(|tagged| Arc::clone(&tagged.validator))
            .collect();
        let async_validators: Vec<AsyncValidator> = self
            .inner
            .async_validators
            .read()
            .iter()
            .map(|tagged| Arc::clone(&tagged.validator))
            .collect();

        let errors: Vec<ValidationError> =
            untracked(|| validators.iter().filter_map(|v| v(&value)).collect());

        if !errors.is_empty() || async_validators.is_empty() {
            let valid = errors.is_empty();
            state.errors.set(errors);
            state.pending.set(false);
            return ValidationRun::Done(ValidationOutcome::from_valid(valid));
        }

        tracing::debug!(generation, count = async_validators.len(), "starting async validation");
        state.errors.set(Vec::new());
        state.pending.set(true);

        let node = self.clone();
        ValidationRun::Async(
            async move {
                let checks = async_validators
                    .iter()
                    .map(|validator| validator(value.clone()));
                let results = future::join_all(checks).await;

                let state = &node.inner.state;
                if !state.is_current(generation) {
                    tracing::debug!(generation, "discarding stale validation result");
                    return ValidationOutcome::Superseded;
                }
                let errors: Vec<ValidationError> = results.into_iter().flatten().collect();
                let valid = errors.is_empty();
                state.errors.set(errors);
                state.pending.set(false);
                ValidationOutcome::from_valid(valid)
            }
            .boxed(),
        )
    }

    /// Fire-and-forget validation, honoring the configured debounce.
    pub(crate) fn trigger_validation(&self) {
        if self.inner.state.is_disposed() {
            return;
        }
        let debounce = *self.inner.debounce.read();
        match debounce {
            Some(delay) => {
                let node = self.clone();
                self.inner
                    .debouncer
                    .schedule_after(delay, move || node.run_detached());
            }
            None => self.run_detached(),
        }
    }

    fn run_detached(&self) {
        let node = self.clone();
        self.begin_validation()
            .detach(move || node.abandon_validation());
    }

    /// Forget the in-flight attempt without applying anything.
    pub(crate) fn abandon_validation(&self) {
        self.inner.state.next_generation();
        self.inner.state.pending.set(false);
    }

    pub(crate) fn append_errors(&self, errors: Vec<ValidationError>) {
        self.inner.state.errors.update(|current| {
            let mut next = current.clone();
            next.extend(errors);
            next
        });
    }

    /// Stop validation, pending or scheduled.
    fn interrupt_validation(&self) {
        self.inner.debouncer.cancel();
        self.inner.state.next_generation();
    }
}

impl Control for FieldNode {
    fn value(&self) -> Value {
        self.inner.value.get()
    }

    fn get_value(&self) -> Value {
        self.inner.value.get_untracked()
    }

    fn set_value(&self, value: Value) {
        self.set_value_with(value, SetValueOptions::default());
    }

    fn patch_value(&self, value: Value) {
        self.set_value(value);
    }

    fn errors(&self) -> Vec<ValidationError> {
        self.inner.state.errors.get()
    }

    fn set_errors(&self, errors: Vec<ValidationError>) {
        self.inner.state.errors.set(errors);
    }

    fn invalid(&self) -> bool {
        let state = &self.inner.state;
        !state.disabled.get() && !state.errors.get().is_empty()
    }

    fn pending(&self) -> bool {
        let state = &self.inner.state;
        !state.disabled.get() && state.pending.get()
    }

    fn touched(&self) -> bool {
        self.inner.state.touched.get()
    }

    fn dirty(&self) -> bool {
        self.inner.state.dirty.get()
    }

    fn disabled(&self) -> bool {
        self.inner.state.disabled.get()
    }

    fn visible(&self) -> bool {
        self.inner.state.visible.get()
    }

    fn mark_as_touched(&self) {
        self.inner.state.touched.set(true);
        if self.update_on() == UpdateOn::Blur {
            self.trigger_validation();
        }
    }

    fn mark_as_untouched(&self) {
        self.inner.state.touched.set(false);
    }

    fn mark_as_dirty(&self) {
        self.inner.state.dirty.set(true);
    }

    fn mark_as_pristine(&self) {
        self.inner.state.dirty.set(false);
    }

    fn enable(&self) {
        if self.inner.state.disabled.set(false) {
            self.trigger_validation();
        }
    }

    fn disable(&self) {
        if self.inner.state.disabled.set(true) {
            self.interrupt_validation();
            self.inner.state.clear_validation();
        }
    }

    fn show(&self) {
        self.inner.state.visible.set(true);
    }

    fn hide(&self) {
        self.inner.state.visible.set(false);
    }

    fn reset(&self, value: Option<Value>) {
        self.interrupt_validation();
        let state = &self.inner.state;
        self.inner
            .value
            .set(value.unwrap_or_else(|| self.inner.initial.clone()));
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
        tracing::debug!(subscriptions = state.subscriptions.len(), "disposing field");
        self.interrupt_validation();
        state.pending.set(false);
        state.subscriptions.dispose_all();
        state.clear_signal_subscribers();
        self.inner.value.clear_subscribers();
        self.clear_validators();
    }
}

impl std::fmt::Debug for FieldNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = &self.inner.state;
        f.debug_struct("FieldNode")
            .field("value", &self.inner.value.get_untracked())
            .field("errors", &state.errors.get_untracked())
            .field("disabled", &state.disabled.get_untracked())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
