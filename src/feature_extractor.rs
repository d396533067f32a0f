//! Projection of patient records onto the persisted feature order.
//!
//! The feature list saved at training time is the single authority on which
//! inputs the classifier consumes and in what order. Incoming records are
//! validated against it, reordered, and their text values encoded with the
//! category codes learned during training.

use crate::data::encoding::CategoryEncoder;
use crate::error::{CkdError, CkdResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One input value: a number, a flag, or a category label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl From<i32> for FeatureValue {
    fn from(value: i32) -> Self {
        FeatureValue::Number(value as f64)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

/// Flat feature name to value mapping for one patient
pub type FeatureRecord = BTreeMap<String, FeatureValue>;

/// Ordered feature names fixed by a training run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names from this schema absent from `record`
    pub fn missing_from(&self, record: &FeatureRecord) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| !record.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Build the model input vector in schema order.
    ///
    /// Fails with `MissingFeature` listing every absent name before looking at
    /// any value. Fields not in the schema are ignored.
    pub fn project(&self, record: &FeatureRecord, encoder: &CategoryEncoder) -> CkdResult<Vec<f64>> {
        let missing = self.missing_from(record);
        if !missing.is_empty() {
            return Err(CkdError::MissingFeature { missing });
        }

        self.names
            .iter()
            .map(|name| Self::to_number(name, &record[name.as_str()], encoder))
            .collect()
    }

    fn to_number(name: &str, value: &FeatureValue, encoder: &CategoryEncoder) -> CkdResult<f64> {
        let number = match value {
            FeatureValue::Number(v) => *v,
            FeatureValue::Flag(flag) => f64::from(u8::from(*flag)),
            FeatureValue::Text(text) => {
                let text = text.trim();
                if encoder.is_categorical(name) {
                    encoder.encode(name, text)?
                } else {
                    text.parse::<f64>().map_err(|_| CkdError::InvalidFeature {
                        feature: name.to_string(),
                        reason: format!("'{}' is not a number", text),
                    })?
                }
            }
        };

        if !number.is_finite() {
            return Err(CkdError::InvalidFeature {
                feature: name.to_string(),
                reason: "value is not finite".to_string(),
            });
        }

        Ok(number)
    }
}
