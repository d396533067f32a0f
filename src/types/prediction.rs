//! Scoring request, reply and prediction log document

use crate::feature_extractor::FeatureRecord;
use crate::models::inference::Prediction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request to score one patient's feature snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub patient_id: i64,
    pub features: FeatureRecord,
}

/// Prediction log document handed to the document store's "save prediction"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Document identifier; the store names this field `_id`
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    pub patient_id: i64,

    pub model_name: String,

    /// Training run that produced the artifact bundle
    pub model_version: String,

    /// Features exactly as received
    pub features: FeatureRecord,

    pub prediction: Prediction,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PredictionRecord {
    /// Create a new prediction log document
    pub fn new(
        patient_id: i64,
        model_name: impl Into<String>,
        model_version: impl Into<String>,
        features: FeatureRecord,
        prediction: Prediction,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            model_name: model_name.into(),
            model_version: model_version.into(),
            features,
            prediction,
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Reply sent back to the requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScoringReply {
    Ok {
        prediction_id: String,
        label: u8,
        ckd_probability: f64,
    },
    Error {
        message: String,
    },
}

impl ScoringReply {
    pub fn from_record(record: &PredictionRecord) -> Self {
        ScoringReply::Ok {
            prediction_id: record.id.clone(),
            label: record.prediction.label,
            ckd_probability: record.prediction.ckd_probability,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ScoringReply::Error {
            message: message.into(),
        }
    }
}
