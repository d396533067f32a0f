//! Category to integer code mapping learned at training time

use crate::error::{CkdError, CkdResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label encoder for every categorical feature column.
///
/// Each column keeps its distinct observed values in sorted order; the code of
/// a value is its position in that list. The encoder is persisted with the
/// artifact bundle so inference can encode text values exactly as training did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    columns: BTreeMap<String, Vec<String>>,
}

impl CategoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the classes of one column from its observed values
    pub fn fit_column<'a, I>(&mut self, column: &str, values: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        self.columns.insert(column.to_string(), classes);
    }

    pub fn is_categorical(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn classes(&self, column: &str) -> Option<&[String]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    /// Names of the encoded columns
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Code for `value` in `column`
    pub fn encode(&self, column: &str, value: &str) -> CkdResult<f64> {
        let classes = self.columns.get(column).ok_or_else(|| CkdError::InvalidFeature {
            feature: column.to_string(),
            reason: format!("'{}' is not a number and the column is not categorical", value),
        })?;

        classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .map(|code| code as f64)
            .map_err(|_| CkdError::InvalidFeature {
                feature: column.to_string(),
                reason: format!("unknown category '{}'", value),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> CategoryEncoder {
        let mut encoder = CategoryEncoder::new();
        encoder.fit_column("WaterQuality", ["poor", "good", "good", "fair"]);
        encoder
    }

    #[test]
    fn test_codes_follow_sorted_order() {
        let encoder = encoder();
        assert_eq!(
            encoder.classes("WaterQuality").unwrap(),
            &["fair", "good", "poor"]
        );
        assert_eq!(encoder.encode("WaterQuality", "fair").unwrap(), 0.0);
        assert_eq!(encoder.encode("WaterQuality", "poor").unwrap(), 2.0);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let err = encoder().encode("WaterQuality", "excellent").unwrap_err();
        assert!(matches!(err, CkdError::InvalidFeature { ref feature, .. } if feature == "WaterQuality"));
    }

    #[test]
    fn test_text_for_numeric_column_is_rejected() {
        let err = encoder().encode("GFR", "high").unwrap_err();
        assert!(err.to_string().contains("GFR"));
    }
}
