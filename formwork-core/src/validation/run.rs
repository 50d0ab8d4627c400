//! Validation attempts.
//!
//! Starting a validation is split in two. The synchronous pass (sync
//! validators, attempt-id capture, flag updates) happens immediately when
//! `validate()` is called. What remains, if anything, is an async
//! continuation that the caller awaits or that gets spawned.

use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::lifecycle::spawn_detached;

/// How a validation call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid,
    /// A newer validation started on the same node (or a debounced call was
    /// replaced) before this one finished. Its result was dropped.
    Superseded,
}

impl ValidationOutcome {
    pub(crate) fn from_valid(valid: bool) -> Self {
        if valid {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, ValidationOutcome::Superseded)
    }
}

/// Options for an explicit `validate_with` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Delay the whole attempt, coalescing with later calls on the same node.
    pub debounce: Option<Duration>,
}

impl ValidateOptions {
    pub fn debounced(delay: Duration) -> Self {
        Self {
            debounce: Some(delay),
        }
    }
}

/// A validation attempt after its synchronous pass.
pub(crate) enum ValidationRun {
    Done(ValidationOutcome),
    Async(BoxFuture<'static, ValidationOutcome>),
}

impl ValidationRun {
    pub fn is_done(&self) -> bool {
        matches!(self, ValidationRun::Done(_))
    }

    pub fn into_future(self) -> BoxFuture<'static, ValidationOutcome> {
        match self {
            ValidationRun::Done(outcome) => future::ready(outcome).boxed(),
            ValidationRun::Async(pending) => pending,
        }
    }

    /// Let any async remainder finish in the background.
    ///
    /// `on_skipped` runs when there is no runtime to spawn on.
    pub fn detach(self, on_skipped: impl FnOnce()) {
        if let ValidationRun::Async(pending) = self {
            if !spawn_detached(pending.map(|_| ())) {
                on_skipped();
            }
        }
    }

    /// Combine child attempts into one.
    ///
    /// `finish` runs after every child completed (immediately, when all of
    /// them were synchronous) and produces the combined outcome.
    pub fn join<F>(runs: Vec<ValidationRun>, finish: F) -> ValidationRun
    where
        F: FnOnce() -> ValidationOutcome + Send + 'static,
    {
        if runs.iter().all(ValidationRun::is_done) {
            return ValidationRun::Done(finish());
        }
        let pending: Vec<_> = runs.into_iter().map(ValidationRun::into_future).collect();
        ValidationRun::Async(
            async move {
                future::join_all(pending).await;
                finish()
            }
            .boxed(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_of_sync_runs_finishes_inline() {
        let run = ValidationRun::join(
            vec![
                ValidationRun::Done(ValidationOutcome::Valid),
                ValidationRun::Done(ValidationOutcome::Invalid),
            ],
            || ValidationOutcome::Invalid,
        );
        assert!(matches!(run, ValidationRun::Done(ValidationOutcome::Invalid)));
    }

    #[tokio::test]
    async fn join_waits_for_async_children() {
        let child = ValidationRun::Async(
            async {
                tokio::task::yield_now().await;
                ValidationOutcome::Valid
            }
            .boxed(),
        );
        let run = ValidationRun::join(vec![child], || ValidationOutcome::Valid);
        assert!(!run.is_done());
        assert_eq!(run.into_future().await, ValidationOutcome::Valid);
    }
}
