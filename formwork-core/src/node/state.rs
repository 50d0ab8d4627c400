//! Flags shared by every node variant.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::lifecycle::{Disposer, SubscriptionRegistry};
use crate::reactive::Signal;
use crate::validation::ValidationError;

/// The orthogonal per-node flags plus the node's own error list.
///
/// For a leaf, `errors` holds validator output. For a composite it holds
/// composite-level errors only; child errors stay on the children.
pub(crate) struct NodeState {
    pub touched: Signal<bool>,
    pub dirty: Signal<bool>,
    pub disabled: Signal<bool>,
    pub visible: Signal<bool>,
    pub errors: Signal<Vec<ValidationError>>,
    /// Leaf only: an async validation attempt is in flight.
    pub pending: Signal<bool>,
    pub subscriptions: SubscriptionRegistry,
    generation: AtomicU64,
    next_key: AtomicU64,
    disposed: AtomicBool,
}

impl NodeState {
    pub fn new(disabled: bool) -> Self {
        Self {
            touched: Signal::new(false),
            dirty: Signal::new(false),
            disabled: Signal::new(disabled),
            visible: Signal::new(true),
            errors: Signal::new(Vec::new()),
            pending: Signal::new(false),
            subscriptions: SubscriptionRegistry::new(),
            generation: AtomicU64::new(0),
            next_key: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Start a new validation attempt and return its id.
    ///
    /// Any attempt started earlier becomes stale.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `generation` is still the latest attempt.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Flag the node disposed. Returns `false` if it already was.
    pub fn begin_dispose(&self) -> bool {
        !self.disposed.swap(true, Ordering::SeqCst)
    }

    /// Record `disposer` in this node's registry under a fresh key and hand
    /// it back, so the node's `dispose()` also tears it down.
    pub fn own(&self, prefix: &str, disposer: Disposer) -> Disposer {
        let n = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.subscriptions
            .add(format!("{prefix}#{n}"), disposer.clone());
        disposer
    }

    /// Clear the validation-derived state.
    pub fn clear_validation(&self) {
        self.errors.set(Vec::new());
        self.pending.set(false);
    }

    /// Reset interaction flags to pristine.
    pub fn clear_interaction(&self) {
        self.touched.set(false);
        self.dirty.set(false);
    }

    /// Drop every external subscriber of this node's flag signals.
    pub fn clear_signal_subscribers(&self) {
        self.touched.clear_subscribers();
        self.dirty.clear_subscribers();
        self.disabled.clear_subscribers();
        self.visible.clear_subscribers();
        self.errors.clear_subscribers();
        self.pending.clear_subscribers();
    }
}
