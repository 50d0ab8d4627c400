//! Behaviors
//!
//! A behavior schema wires fields to each other: computed values,
//! conditional enablement and visibility, copying and syncing, watchers.
//! Each rule is an [`Effect`](crate::reactive::Effect) over node signals, so
//! it re-runs synchronously whenever something it read changes.
//!
//! ```rust,ignore
//! form.apply_behavior_schema(|b| {
//!     b.compute_from(&["price", "quantity"], "total", |v| {
//!         json!(v[0].as_f64().unwrap_or(0.0) * v[1].as_f64().unwrap_or(0.0))
//!     });
//!     b.enable_when("company", |form| form["kind"] == "business", EnableWhenOptions::resetting());
//! });
//! ```
//!
//! Paths are resolved once, when the rule is declared. A rule whose path
//! does not resolve logs a warning and does nothing.

mod context;

pub use context::BehaviorContext;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Options for [`BehaviorContext::enable_when`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnableWhenOptions {
    /// Reset the target to its initial value whenever it gets disabled.
    pub reset_on_disable: bool,
}

impl EnableWhenOptions {
    pub fn resetting() -> Self {
        Self {
            reset_on_disable: true,
        }
    }
}

type ValuePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
type ValueTransform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Options for [`BehaviorContext::copy_from`].
#[derive(Clone, Default)]
pub struct CopyOptions {
    when: Option<ValuePredicate>,
    transform: Option<ValueTransform>,
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only copy while `predicate` holds for the whole form value.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(predicate));
        self
    }

    /// Map the source value before writing it.
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl fmt::Debug for CopyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyOptions")
            .field("when", &self.when.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}
