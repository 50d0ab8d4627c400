//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. Every signal read during a run subscribes the effect.
//!
//! 3. When any dependency changes, the effect re-runs synchronously. Before
//!    re-running it drops its old subscriptions and tracks fresh ones, so
//!    dependencies behind a branch that is no longer taken are released.
//!
//! # Reentrancy
//!
//! An effect that writes to a signal it also reads would otherwise recurse
//! forever. A notification that arrives while the effect is already running
//! is skipped.
//!
//! # Lifetime
//!
//! Subscriptions hold the effect alive. Dropping every `Effect` handle does
//! not stop it; only [`Effect::dispose`] does.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::subscriber::{Observer, SubscriberId};
use crate::lifecycle::Disposer;

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique effect ID.
fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct EffectInner {
    id: u64,
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    dependencies: Mutex<Vec<Disposer>>,
    dependency_count: AtomicUsize,
    disposed: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it immediately.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EffectInner {
                id: next_effect_id(),
                subscriber_id: SubscriberId::new(),
                run: Box::new(run),
                dependencies: Mutex::new(Vec::new()),
                dependency_count: AtomicUsize::new(0),
                disposed: AtomicBool::new(false),
                running: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Execute the effect function, re-tracking its dependencies.
    pub fn execute(&self) {
        if self.is_disposed() {
            return;
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::trace!(effect = self.inner.id, "skipping reentrant effect run");
            return;
        }

        self.release_dependencies();

        let this = self.clone();
        let observer = Observer::new(self.inner.subscriber_id, move || this.schedule());
        let ctx = ReactiveContext::enter(observer);
        (self.inner.run)();
        let tracked = ctx.finish();

        self.inner
            .dependency_count
            .store(tracked.len(), Ordering::SeqCst);
        *self.inner.dependencies.lock() = tracked;
        self.inner.run_count.fetch_add(1, Ordering::SeqCst);
        self.inner.running.store(false, Ordering::SeqCst);

        // Disposed from inside its own run: the fresh subscriptions must go too.
        if self.is_disposed() {
            self.release_dependencies();
        }
    }

    /// Re-run in response to a dependency change.
    pub fn schedule(&self) {
        if !self.is_disposed() {
            tracing::trace!(effect = self.inner.id, "effect notified");
            self.execute();
        }
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again and holds no
    /// subscriptions.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            self.release_dependencies();
        }
    }

    /// A disposer that disposes this effect.
    pub fn disposer(&self) -> Disposer {
        let this = self.clone();
        Disposer::new(move || this.dispose())
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of signals tracked by the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count.load(Ordering::SeqCst)
    }

    fn release_dependencies(&self) {
        let stale = std::mem::take(&mut *self.inner.dependencies.lock());
        self.inner.dependency_count.store(0, Ordering::SeqCst);
        for disposer in stale {
            disposer.dispose();
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
