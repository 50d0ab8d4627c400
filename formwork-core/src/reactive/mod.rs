//! Reactive Primitives
//!
//! This module implements the reactive substrate the node engine is built
//! on: signals and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (an effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes,
//! all dependents are notified.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Computed fields, conditional enablement and field
//! linking are all effects over node signals.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! dependencies. Derived node state (a group's value, a list's status) is
//! not cached: it is recomputed on read from leaf signals, so reading it
//! inside an effect subscribes the effect to every contributing leaf.
//!
//! Propagation is synchronous. By the time `Signal::set` returns, every
//! dependent effect has already re-run.

mod context;
mod effect;
mod signal;
mod subscriber;

pub use context::{untracked, ReactiveContext};
pub use effect::Effect;
pub use signal::Signal;
pub use subscriber::{Observer, SubscriberId};
