//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (an effect), the
//!    signal subscribes that context's observer.
//!
//! 2. When a signal's value changes, all subscribers are notified
//!    synchronously, before `set` returns.
//!
//! 3. Writing a value equal to the current one is a no-op and notifies
//!    nobody. This is what stops two linked fields from ping-ponging.
//!
//! # Thread Safety
//!
//! The value and the notifier list sit behind `parking_lot` locks. Neither
//! lock is held while notifiers run, so a notifier may freely read or write
//! the signal that triggered it.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::SubscriberId;
use crate::lifecycle::Disposer;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Notifier = Arc<dyn Fn() + Send + Sync>;
type NotifierList = RwLock<Vec<(SubscriberId, Notifier)>>;

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The stored value. `PartialEq` lets `set` skip no-op writes.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: u64,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Notification callbacks keyed by subscriber.
    notifiers: Arc<NotifierList>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_signal_id(),
            value: Arc::new(RwLock::new(value)),
            notifiers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also subscribes the
    /// current computation.
    pub fn get(&self) -> T {
        if let Some(observer) = ReactiveContext::track(self.id) {
            let trigger = observer.trigger();
            let disposer = self.subscribe(observer.id(), move || trigger());
            ReactiveContext::retain(disposer);
        }
        self.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Borrow the current value without cloning or tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Set a new value and notify subscribers.
    ///
    /// Returns `false` (and notifies nobody) when `value` equals the
    /// current value.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }
        self.notify_subscribers();
        true
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(new_value)
    }

    /// Register a notification callback under `subscriber_id`.
    ///
    /// The returned disposer removes it again.
    pub fn subscribe<F>(&self, subscriber_id: SubscriberId, notify: F) -> Disposer
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifiers.write().push((subscriber_id, Arc::new(notify)));

        let notifiers: Weak<NotifierList> = Arc::downgrade(&self.notifiers);
        Disposer::new(move || {
            if let Some(notifiers) = notifiers.upgrade() {
                notifiers.write().retain(|(id, _)| *id != subscriber_id);
            }
        })
    }

    /// Call `f` with the new value on every change.
    pub fn watch<F>(&self, f: F) -> Disposer
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let value = Arc::clone(&self.value);
        self.subscribe(SubscriberId::new(), move || {
            let current = value.read().clone();
            f(&current);
        })
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.notifiers
            .write()
            .retain(|(id, _)| *id != subscriber_id);
    }

    /// Drop every subscriber.
    pub fn clear_subscribers(&self) {
        self.notifiers.write().clear();
    }

    /// Notify all subscribers that the value has changed.
    fn notify_subscribers(&self) {
        // Snapshot first: notifiers may subscribe or unsubscribe while running.
        let snapshot: Vec<Notifier> = self
            .notifiers
            .read()
            .iter()
            .map(|(_, notify)| Arc::clone(notify))
            .collect();
        for notify in snapshot {
            notify();
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.notifiers.read().len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            notifiers: Arc::clone(&self.notifiers),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        assert!(signal.set(42));
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_subscribers() {
        let signal = Signal::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let _sub = signal.subscribe(SubscriberId::new(), move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn setting_equal_value_does_not_notify() {
        let signal = Signal::new(5);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let _sub = signal.watch(move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!signal.set(5));
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disposer_unsubscribes() {
        let signal = Signal::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let sub = signal.watch(move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        sub.dispose();
        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn watch_sees_new_value() {
        let signal = Signal::new(String::from("a"));
        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_clone = seen.clone();

        let _sub = signal.watch(move |v: &String| seen_clone.write().push(v.clone()));
        signal.set("b".into());
        signal.set("c".into());

        assert_eq!(*seen.read(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn notifier_may_write_back_to_its_signal() {
        let signal = Signal::new(0);
        let inner = signal.clone();

        let _sub = signal.watch(move |v| {
            if *v < 3 {
                inner.set(v + 1);
            }
        });
        signal.set(1);

        assert_eq!(signal.get_untracked(), 3);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }
}
