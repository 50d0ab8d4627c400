//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation subscribes to it.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running an effect pushes a frame
//! carrying its [`Observer`]; [`untracked`] pushes an empty frame so reads
//! inside it register nothing. Dropping the guard pops the frame.
//!
//! Each tracking frame also collects the teardown handles for the
//! subscriptions made while it was on top, so the effect can drop stale
//! dependencies before its next run.

use std::cell::RefCell;
use std::collections::HashSet;

use super::subscriber::{Observer, SubscriberId};
use crate::lifecycle::Disposer;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct Frame {
    /// `None` for an untracked frame.
    observer: Option<Observer>,
    /// Signal IDs read during this frame.
    dependencies: HashSet<u64>,
    /// Subscriptions made on behalf of the observer.
    disposers: Vec<Disposer>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking context for `observer`.
    pub fn enter(observer: Observer) -> Self {
        let subscriber_id = Some(observer.id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                observer: Some(observer),
                dependencies: HashSet::new(),
                disposers: Vec::new(),
            });
        });
        Self { subscriber_id }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                observer: None,
                dependencies: HashSet::new(),
                disposers: Vec::new(),
            });
        });
        Self {
            subscriber_id: None,
        }
    }

    /// Check if a tracking observer is active.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|frame| frame.observer.is_some())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.observer.as_ref().map(Observer::id))
        })
    }

    /// Record a read of `signal_id`.
    ///
    /// Returns the active observer the first time a given signal is read in
    /// the current frame; the caller subscribes it. Later reads of the same
    /// signal return `None`.
    pub(crate) fn track(signal_id: u64) -> Option<Observer> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let frame = stack.last_mut()?;
            let observer = frame.observer.clone()?;
            frame.dependencies.insert(signal_id).then_some(observer)
        })
    }

    /// Attach a subscription teardown to the current frame.
    pub(crate) fn retain(disposer: Disposer) {
        CONTEXT_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                frame.disposers.push(disposer);
            }
        });
    }

    /// Signal IDs read so far in the current frame.
    pub fn dependencies() -> Vec<u64> {
        CONTEXT_STACK.with(|stack| {
            let mut deps: Vec<u64> = stack
                .borrow()
                .last()
                .map(|frame| frame.dependencies.iter().copied().collect())
                .unwrap_or_default();
            deps.sort_unstable();
            deps
        })
    }

    /// Pop this frame and hand back the subscriptions it collected.
    pub(crate) fn finish(self) -> Vec<Disposer> {
        let disposers = CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|frame| std::mem::take(&mut frame.disposers))
                .unwrap_or_default()
        });
        drop(self);
        disposers
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.observer.as_ref().map(Observer::id),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` without tracking any signal reads.
///
/// Effects use this around their side effects so that mutating one node does
/// not make the effect depend on everything the mutation happens to read.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer() -> Observer {
        Observer::new(SubscriberId::new(), || {})
    }

    #[test]
    fn context_tracks_subscriber() {
        let obs = observer();
        let id = obs.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(obs);
            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn track_reports_each_signal_once() {
        let _ctx = ReactiveContext::enter(observer());

        assert!(ReactiveContext::track(1).is_some());
        assert!(ReactiveContext::track(2).is_some());
        assert!(ReactiveContext::track(1).is_none());

        assert_eq!(ReactiveContext::dependencies(), vec![1, 2]);
    }

    #[test]
    fn untracked_hides_the_observer() {
        let obs = observer();
        let id = obs.id();
        let _ctx = ReactiveContext::enter(obs);

        untracked(|| {
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::track(9).is_none());
        });

        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        assert!(ReactiveContext::dependencies().is_empty());
    }

    #[test]
    fn nested_contexts() {
        let outer = observer();
        let inner = observer();
        let (id1, id2) = (outer.id(), inner.id());

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
            }

            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }
}
