//! Standard settings as supplied by the standards runner.
//!
//! Every standard receives the same envelope: the three mode flags
//! (`remediate`, `alert`, `report`), an optional standard id used for alert
//! correlation, and a bag of standard-specific parameters. Parameters come
//! from a UI that sometimes stores a select box as `{ "label": .., "value": .. }`
//! and sometimes as the bare scalar, so parameter values are read through
//! [`SettingValue`].

use crate::error::SettingsError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A setting that is either wrapped in an object with a `value` field or
/// given as the raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue<T> {
    /// `{ "value": T, ... }`, extra fields such as `label` are ignored.
    Wrapped { value: T },
    /// The bare value.
    Raw(T),
}

impl<T> SettingValue<T> {
    /// Returns the inner value regardless of shape.
    pub fn value(&self) -> &T {
        match self {
            SettingValue::Wrapped { value } => value,
            SettingValue::Raw(value) => value,
        }
    }

    /// Consumes the setting and returns the inner value.
    pub fn into_value(self) -> T {
        match self {
            SettingValue::Wrapped { value } => value,
            SettingValue::Raw(value) => value,
        }
    }
}

/// Settings envelope passed to a standard for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardSettings {
    /// Apply the desired configuration when the tenant is not compliant.
    #[serde(default)]
    pub remediate: bool,
    /// Raise an alert when the tenant is not compliant.
    #[serde(default)]
    pub alert: bool,
    /// Record compliance and comparison fields.
    #[serde(default)]
    pub report: bool,
    /// Identifier of the standard template entry, attached to alerts.
    #[serde(default, rename = "standardId", alias = "standard_id")]
    pub standard_id: Option<String>,
    /// Standard-specific parameters.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl StandardSettings {
    /// Creates empty settings with every mode flag off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from a JSON value.
    pub fn from_json(value: Value) -> Result<Self, SettingsError> {
        serde_json::from_value(value).map_err(|e| SettingsError::Malformed(e.to_string()))
    }

    /// Sets the remediate flag.
    pub fn with_remediate(mut self, remediate: bool) -> Self {
        self.remediate = remediate;
        self
    }

    /// Sets the alert flag.
    pub fn with_alert(mut self, alert: bool) -> Self {
        self.alert = alert;
        self
    }

    /// Sets the report flag.
    pub fn with_report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    /// Sets the standard id.
    pub fn with_standard_id(mut self, standard_id: &str) -> Self {
        self.standard_id = Some(standard_id.to_string());
        self
    }

    /// Sets a parameter.
    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    /// Returns true if any of remediate, alert or report is set.
    pub fn has_any_mode(&self) -> bool {
        self.remediate || self.alert || self.report
    }

    /// Looks up a parameter. Keys match case-insensitively, an exact match wins.
    pub fn get_param(&self, key: &str) -> Option<&Value> {
        self.params.get(key).or_else(|| {
            self.params
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    /// Reads a parameter that may be wrapped or raw. `null` counts as absent.
    pub fn get_setting<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<SettingValue<T>>, SettingsError> {
        match self.get_param(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| SettingsError::invalid(key, e.to_string())),
        }
    }

    /// Reads a string parameter, unwrapping `{ value }` if present.
    pub fn get_string(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self
            .get_setting::<String>(key)?
            .map(SettingValue::into_value))
    }
}
