//! Subscriber types for the reactive system.
//!
//! A subscriber is anything that wants to hear about signal changes: an
//! effect, a `watch` callback, or a node wiring one field to another.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscriber.
///
/// Every registration on a signal carries one of these so it can be removed
/// again without comparing closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A tracking observer: the computation that is currently running inside a
/// reactive context.
///
/// Signals read while an observer is active register `trigger` so the
/// computation re-runs when they change.
#[derive(Clone)]
pub struct Observer {
    id: SubscriberId,
    trigger: Arc<dyn Fn() + Send + Sync>,
}

impl Observer {
    /// Create a new observer with the given re-run callback.
    pub fn new<F>(id: SubscriberId, trigger: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            trigger: Arc::new(trigger),
        }
    }

    /// Get the observer's subscriber ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Notify the observer that one of its dependencies changed.
    pub fn notify(&self) {
        (self.trigger)();
    }

    pub(crate) fn trigger(&self) -> Arc<dyn Fn() + Send + Sync> {
        Arc::clone(&self.trigger)
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn observer_notify_calls_trigger() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let observer = Observer::new(SubscriberId::new(), move || {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        observer.notify();
        assert!(called.load(Ordering::SeqCst));
    }
}
