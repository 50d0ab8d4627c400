//! Engine error type.
//!
//! These are failures of the *caller's request* (a malformed path, a write
//! through the wrong container kind). Validation failures are data, carried
//! by [`ValidationError`](crate::validation::ValidationError), and never show
//! up here.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FormError>;

/// Which container a path segment needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Object,
    Array,
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Container::Object => f.write_str("object"),
            Container::Array => f.write_str("array"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    /// The path string does not match `key(.key | [index])*`.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A write reached a segment whose value is not the container the
    /// segment requires.
    #[error("cannot write through `{path}`: expected {expected}, found {found}")]
    StructuralMismatch {
        path: String,
        expected: Container,
        found: &'static str,
    },

    /// A write indexed further past the end of an array than padding allows.
    #[error("index {index} at `{path}` is too far past the end (length {len})")]
    IndexOutOfRange { path: String, index: usize, len: usize },

    /// A required node lookup did not resolve.
    #[error("no node at `{path}`")]
    NotFound { path: String },

    /// A node's value did not convert to or from the requested type.
    #[error("value type mismatch: {0}")]
    TypeMismatch(#[from] serde_json::Error),
}

impl FormError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        FormError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Short name of a JSON value's kind, for error messages.
pub(crate) fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
