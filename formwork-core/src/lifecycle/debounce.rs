//! Debounced Invoker
//!
//! A [`Debouncer`] is an explicit timer handle. Scheduling a job arms the
//! timer; scheduling again before it fires replaces the job and restarts the
//! delay. The pending job can also be forced with [`Debouncer::flush`] or
//! thrown away with [`Debouncer::cancel`].
//!
//! # Timer Source
//!
//! Delays run on the ambient Tokio runtime (`tokio::time::sleep`). When no
//! runtime is active the job runs immediately, as if flushed.
//!
//! # Cancellation
//!
//! A cancelled job is dropped without being called. Anything the job owned
//! (for example the sender half of a oneshot channel) is dropped with it,
//! which is how callers waiting on a superseded job find out.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type Job = Box<dyn FnOnce() + Send>;

struct Pending {
    generation: u64,
    job: Job,
    timer: Option<JoinHandle<()>>,
}

impl Pending {
    fn into_job(self) -> Job {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        self.job
    }
}

#[derive(Default)]
struct DebounceState {
    generation: u64,
    pending: Option<Pending>,
}

/// Coalesces bursts of calls into a single delayed invocation.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl Debouncer {
    /// Create a debouncer with the given default delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// The default delay used by [`Debouncer::schedule`].
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `job` after the default delay, superseding any pending job.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_after(self.delay, job);
    }

    /// Schedule `job` after `delay`, superseding any pending job.
    pub fn schedule_after<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let (generation, superseded) = {
            let mut state = self.state.lock();
            state.generation += 1;
            let generation = state.generation;
            let superseded = state.pending.replace(Pending {
                generation,
                job: Box::new(job),
                timer: None,
            });
            (generation, superseded)
        };
        // Dropped outside the lock: the old job may own resources whose
        // destructors call back into user code.
        drop(superseded.map(Pending::into_job));

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("no tokio runtime, running debounced job immediately");
                self.flush();
                return;
            }
        };

        let state = Arc::clone(&self.state);
        let timer = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let job = {
                let mut state = state.lock();
                match &state.pending {
                    Some(pending) if pending.generation == generation => {
                        state.pending.take().map(|pending| pending.job)
                    }
                    _ => None,
                }
            };
            if let Some(job) = job {
                job();
            }
        });

        let mut state = self.state.lock();
        match state.pending.as_mut() {
            Some(pending) if pending.generation == generation => pending.timer = Some(timer),
            // Already fired or superseded between spawn and here.
            _ => {}
        }
    }

    /// Run the pending job now, cancelling its timer.
    ///
    /// Returns `false` when nothing was pending.
    pub fn flush(&self) -> bool {
        let pending = self.state.lock().pending.take();
        match pending {
            Some(pending) => {
                let job = pending.into_job();
                job();
                true
            }
            None => false,
        }
    }

    /// Discard the pending job without running it.
    ///
    /// Returns `false` when nothing was pending.
    pub fn cancel(&self) -> bool {
        let pending = self.state.lock().pending.take();
        match pending {
            Some(pending) => {
                drop(pending.into_job());
                true
            }
            None => false,
        }
    }

    /// Whether a job is waiting for its timer.
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<i32>>>, impl Fn(i32) -> Box<dyn FnOnce() + Send>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let make = move |n: i32| {
            let calls = calls_clone.clone();
            Box::new(move || calls.lock().push(n)) as Box<dyn FnOnce() + Send>
        };
        (calls, make)
    }

    #[tokio::test(start_paused = true)]
    async fn later_schedule_supersedes_earlier() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let (calls, make) = recorder();

        debouncer.schedule(make(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        debouncer.schedule(make(2));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(*calls.lock(), vec![2]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_immediately_and_disarms_timer() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let (calls, make) = recorder();

        debouncer.schedule(make(7));
        assert!(debouncer.flush());
        assert_eq!(*calls.lock(), vec![7]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*calls.lock(), vec![7]);
        assert!(!debouncer.flush());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_never_runs_the_job() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        debouncer.schedule(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(debouncer.cancel());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!debouncer.cancel());
    }

    #[test]
    fn runs_inline_without_a_runtime() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let (calls, make) = recorder();

        debouncer.schedule(make(3));
        assert_eq!(*calls.lock(), vec![3]);
        assert!(!debouncer.is_pending());
    }
}
