//! Subscription Registry
//!
//! Each node owns one registry. Anything the node wires up on behalf of a
//! caller (watchers, computed fields, applied schemas) is recorded here under
//! a key, so `dispose()` on the node can tear all of it down in one pass.
//!
//! A key holds at most one live entry. Adding under an existing key disposes
//! the previous entry first.

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::Disposer;

/// Keyed store of teardown callbacks.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<IndexMap<String, Disposer>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `disposer` under `key`, disposing whatever was there before.
    pub fn add(&self, key: impl Into<String>, disposer: Disposer) {
        let key = key.into();
        let previous = {
            let mut entries = self.entries.lock();
            // Entries disposed through their own handle are dead weight.
            entries.retain(|_, existing| !existing.is_disposed());
            entries.insert(key.clone(), disposer)
        };
        if let Some(previous) = previous {
            tracing::trace!(key = %key, "replacing subscription");
            previous.dispose();
        }
    }

    /// Dispose and forget the entry under `key`.
    ///
    /// Returns `false` if nothing was registered.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.lock().shift_remove(key);
        match removed {
            Some(disposer) => {
                disposer.dispose();
                true
            }
            None => false,
        }
    }

    /// Forget the entry under `key` without disposing it.
    pub fn forget(&self, key: &str) -> Option<Disposer> {
        self.entries.lock().shift_remove(key)
    }

    /// Check whether a live entry exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Dispose every entry, in registration order, and empty the registry.
    pub fn dispose_all(&self) {
        let drained: Vec<(String, Disposer)> = self.entries.lock().drain(..).collect();
        for (_, disposer) in drained {
            disposer.dispose();
        }
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("keys", &self.entries.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}
