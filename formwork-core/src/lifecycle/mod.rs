//! Resource Lifecycle
//!
//! Teardown handles, the per-node subscription registry, and the debounce
//! timer used by delayed validation.
//!
//! Nothing in the engine is reclaimed implicitly. A subscription lives until
//! its [`Disposer`] runs, either directly or through the owning node's
//! `dispose()`.

mod debounce;
mod disposer;
mod registry;

pub use debounce::Debouncer;
pub use disposer::Disposer;
pub use registry::SubscriptionRegistry;

use std::future::Future;

/// Spawn `future` on the ambient Tokio runtime.
///
/// Returns `false` (and drops the future) when called outside a runtime.
pub(crate) fn spawn_detached<F>(future: F) -> bool
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
            true
        }
        Err(_) => {
            tracing::warn!("async validation requested outside a tokio runtime; skipped");
            false
        }
    }
}
