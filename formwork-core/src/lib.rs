//! Formwork Core
//!
//! This crate provides the node engine for the Formwork reactive form
//! library. It implements:
//!
//! - Reactive primitives (signals, effects)
//! - The form node tree (fields, groups, lists)
//! - Sync and async validation with stale-result protection
//! - Declarative behaviors (computed fields, conditional enablement, links)
//! - String paths into values and node trees
//!
//! Rendering, network submission and the catalog of concrete validators are
//! left to the caller.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals, effects and dependency tracking
//! - `lifecycle`: Disposers, subscription registries and debouncing
//! - `node`: The three node variants and the `Control` interface
//! - `validation`: Validators, validation schemas and outcomes
//! - `behavior`: The behavior rule catalog
//! - `path`: Path parsing and resolution
//!
//! # Example
//!
//! ```rust,ignore
//! use formwork_core::prelude::*;
//! use serde_json::json;
//!
//! let form = GroupNode::new(
//!     GroupSchema::new()
//!         .field("price", FieldConfig::new(0))
//!         .field("quantity", FieldConfig::new(1))
//!         .field("total", FieldConfig::new(0)),
//! );
//!
//! form.apply_behavior_schema(|b| {
//!     b.compute_from(&["price", "quantity"], "total", |v| {
//!         json!(v[0].as_i64().unwrap_or(0) * v[1].as_i64().unwrap_or(0))
//!     });
//! });
//!
//! form.get_field("price").unwrap().set_value(json!(100));
//! form.get_field("quantity").unwrap().set_value(json!(3));
//! assert_eq!(form.get_value()["total"], json!(300));
//! ```

pub mod behavior;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod node;
pub mod path;
pub mod reactive;
pub mod validation;

pub use error::{FormError, Result};

/// The types most callers need.
pub mod prelude {
    pub use crate::behavior::{BehaviorContext, CopyOptions, EnableWhenOptions};
    pub use crate::config::{FormSettings, UpdateOn};
    pub use crate::error::{FormError, Result};
    pub use crate::lifecycle::Disposer;
    pub use crate::node::{
        ArrayNode, ArraySchema, Control, FieldConfig, FieldNode, FormConfig, FormNode, GroupNode,
        GroupSchema, NodeKind, NodeStatus, SetValueOptions,
    };
    pub use crate::validation::{
        ErrorFilter, ValidateOptions, ValidationBuilder, ValidationContext, ValidationError,
        ValidationOutcome,
    };
}
