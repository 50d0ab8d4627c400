//! Teardown handles.
//!
//! Every subscription the engine hands out (a `watch`, a computed field, a
//! whole behavior schema) is represented by a [`Disposer`]. Dropping a
//! disposer does *not* tear anything down: subscriptions stay live until
//! `dispose()` is called on the handle or on the node that owns it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type Teardown = Box<dyn FnOnce() + Send>;

/// A shareable, idempotent teardown callback.
///
/// Clones share the same callback; whichever clone disposes first runs it and
/// the rest become no-ops.
#[derive(Clone)]
pub struct Disposer {
    teardown: Arc<Mutex<Option<Teardown>>>,
}

impl Disposer {
    /// Wrap a teardown callback.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Arc::new(Mutex::new(Some(Box::new(teardown)))),
        }
    }

    /// A disposer with nothing to tear down.
    pub fn noop() -> Self {
        Self {
            teardown: Arc::new(Mutex::new(None)),
        }
    }

    /// Combine several disposers into one that disposes all of them in order.
    pub fn combine<I>(disposers: I) -> Self
    where
        I: IntoIterator<Item = Disposer>,
    {
        let disposers: Vec<Disposer> = disposers.into_iter().collect();
        Self::new(move || {
            for disposer in disposers {
                disposer.dispose();
            }
        })
    }

    /// Run the teardown callback if it has not run yet.
    pub fn dispose(&self) {
        // Take the callback out before running it so a teardown that
        // disposes this same handle again does not deadlock.
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Whether the teardown has already run (or there never was one).
    pub fn is_disposed(&self) -> bool {
        self.teardown.lock().is_none()
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn dispose_runs_once() {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let disposer = Disposer::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let copy = disposer.clone();
        disposer.dispose();
        copy.dispose();
        disposer.dispose();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(copy.is_disposed());
    }

    #[test]
    fn dropping_does_not_dispose() {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let disposer = Disposer::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        drop(disposer);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn combine_disposes_every_part() {
        let count = Arc::new(AtomicI32::new(0));
        let parts: Vec<Disposer> = (0..3)
            .map(|_| {
                let count = count.clone();
                Disposer::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        let combined = Disposer::combine(parts);
        combined.dispose();
        combined.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
