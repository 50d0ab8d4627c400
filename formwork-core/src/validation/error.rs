//! Validation errors and error filters.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single validation failure attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Machine-readable code, e.g. `"required"`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Extra data for message formatting, e.g. `{"min": 3}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl ValidationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            params: None,
        }
    }

    /// An error with only a message, coded `"custom"`.
    ///
    /// Mostly useful for errors that come back from a server.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new("custom", message)
    }

    /// Attach a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|params| params.get(key))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

type ErrorPredicate = Arc<dyn Fn(&ValidationError) -> bool + Send + Sync>;

/// Selects a subset of a node's errors.
///
/// Every configured criterion must match. An empty filter matches every
/// error.
///
/// ```rust,ignore
/// let filter = ErrorFilter::new()
///     .codes(["required", "min_length"])
///     .param("min", 3);
/// let errors = field.get_errors(&filter);
/// ```
#[derive(Clone, Default)]
pub struct ErrorFilter {
    codes: Option<Vec<String>>,
    message_contains: Option<String>,
    params: Vec<(String, Value)>,
    predicate: Option<ErrorPredicate>,
}

impl ErrorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match errors with this code. Repeated calls widen the set.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.codes.get_or_insert_with(Vec::new).push(code.into());
        self
    }

    /// Match errors with any of these codes.
    pub fn codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.codes
            .get_or_insert_with(Vec::new)
            .extend(codes.into_iter().map(Into::into));
        self
    }

    /// Match errors whose message contains `needle`.
    pub fn message_contains(mut self, needle: impl Into<String>) -> Self {
        self.message_contains = Some(needle.into());
        self
    }

    /// Match errors whose params contain `key` equal to `value`.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Match errors accepted by an arbitrary predicate.
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ValidationError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn matches(&self, error: &ValidationError) -> bool {
        if let Some(codes) = &self.codes {
            if !codes.iter().any(|code| *code == error.code) {
                return false;
            }
        }
        if let Some(needle) = &self.message_contains {
            if !error.message.contains(needle.as_str()) {
                return false;
            }
        }
        if !self
            .params
            .iter()
            .all(|(key, value)| error.param(key) == Some(value))
        {
            return false;
        }
        self.predicate
            .as_ref()
            .map_or(true, |predicate| predicate(error))
    }

    /// Keep only the errors this filter matches, preserving order.
    pub fn apply(&self, errors: Vec<ValidationError>) -> Vec<ValidationError> {
        errors.into_iter().filter(|e| self.matches(e)).collect()
    }
}

impl fmt::Debug for ErrorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorFilter")
            .field("codes", &self.codes)
            .field("message_contains", &self.message_contains)
            .field("params", &self.params)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ValidationError> {
        vec![
            ValidationError::new("required", "Field is required"),
            ValidationError::new("min_length", "Too short").with_param("min", 3),
            ValidationError::new("min_length", "Way too short").with_param("min", 8),
            ValidationError::custom("Email already taken"),
        ]
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(ErrorFilter::new().apply(sample()).len(), 4);
    }

    #[test]
    fn filter_by_code_set() {
        let filtered = ErrorFilter::new()
            .codes(["required", "custom"])
            .apply(sample());
        let codes: Vec<_> = filtered.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["required", "custom"]);
    }

    #[test]
    fn filter_by_message_and_param() {
        let by_message = ErrorFilter::new().message_contains("short").apply(sample());
        assert_eq!(by_message.len(), 2);

        let by_param = ErrorFilter::new().param("min", 8).apply(sample());
        assert_eq!(by_param.len(), 1);
        assert_eq!(by_param[0].message, "Way too short");
    }

    #[test]
    fn filter_by_predicate_combines_with_code() {
        let filtered = ErrorFilter::new()
            .code("min_length")
            .predicate(|e| e.message.starts_with("Way"))
            .apply(sample());
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn params_are_omitted_from_json_when_absent() {
        let json = serde_json::to_value(ValidationError::new("required", "x")).unwrap();
        assert_eq!(json, serde_json::json!({"code": "required", "message": "x"}));
    }
}
