//! Validation
//!
//! Validators are plain functions from a value to an optional
//! [`ValidationError`]. A leaf carries its own list of sync and async
//! validators; validation schemas add contextual ones on top.
//!
//! # Ordering
//!
//! On every attempt all sync validators run and all of their errors are
//! kept. Async validators only run when no sync validator failed, and run
//! concurrently. Composite validation validates every enabled child, then
//! runs the group's tree validators.
//!
//! # Races
//!
//! Each attempt is tagged with the node's generation counter. An async
//! result lands only if no newer attempt started on that node since.

mod applicator;
mod error;
mod registry;
mod run;

pub use applicator::{ValidationBuilder, ValidationContext};
pub use error::{ErrorFilter, ValidationError};
pub use run::{ValidateOptions, ValidationOutcome};

pub(crate) use registry::ValidationRegistry;
pub(crate) use run::ValidationRun;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

/// A synchronous validator.
pub type SyncValidator = Arc<dyn Fn(&Value) -> Option<ValidationError> + Send + Sync>;

/// An asynchronous validator. Receives an owned snapshot of the value.
pub type AsyncValidator =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Option<ValidationError>> + Send + Sync>;
