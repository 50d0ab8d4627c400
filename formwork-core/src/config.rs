//! Form-wide configuration.
//!
//! Settings here are defaults. A field's own [`FieldConfig`] wins over them.
//!
//! [`FieldConfig`]: crate::node::FieldConfig

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// When a leaf re-validates on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOn {
    /// After every value change.
    #[default]
    Change,
    /// When the field is marked touched.
    Blur,
    /// Only when the owning form is submitted or validated explicitly.
    Submit,
}

/// Defaults applied to every leaf built from a schema.
///
/// Deserializes from JSON such as `{"update_on": "blur", "debounce_ms": 300}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSettings {
    pub update_on: UpdateOn,
    /// Delay applied to validation triggered by the update trigger.
    pub debounce_ms: Option<u64>,
}

impl FormSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_from_json() {
        let settings = FormSettings::from_json(r#"{"update_on": "blur", "debounce_ms": 250}"#)
            .unwrap();
        assert_eq!(settings.update_on, UpdateOn::Blur);
        assert_eq!(settings.debounce(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = FormSettings::from_json("{}").unwrap();
        assert_eq!(settings, FormSettings::default());
        assert_eq!(settings.debounce(), None);
    }

    #[test]
    fn unknown_trigger_is_rejected() {
        assert!(FormSettings::from_json(r#"{"update_on": "never"}"#).is_err());
    }
}
