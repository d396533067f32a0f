//! Single-record CKD inference over a loaded artifact bundle

use crate::error::CkdResult;
use crate::feature_extractor::FeatureRecord;
use crate::models::loader::ArtifactBundle;
use crate::types::patient::PatientSnapshot;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Result of scoring one patient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 0 = no CKD, 1 = CKD
    pub label: u8,
    /// Mean CKD vote share across the forest (0.0 - 1.0)
    pub ckd_probability: f64,
}

impl Prediction {
    pub fn has_ckd(&self) -> bool {
        self.label == 1
    }
}

/// Read-only inference engine.
///
/// Holds the bundle loaded at start-up and never mutates it, so one instance
/// can be shared across threads behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: ArtifactBundle,
}

impl Predictor {
    pub fn new(bundle: ArtifactBundle) -> Self {
        Self { bundle }
    }

    /// Load the bundle stored in `models_dir`
    pub fn load<P: AsRef<Path>>(models_dir: P) -> CkdResult<Self> {
        Ok(Self::new(ArtifactBundle::load(models_dir)?))
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn into_bundle(self) -> ArtifactBundle {
        self.bundle
    }

    /// Training run the bundle came from
    pub fn run_id(&self) -> Uuid {
        self.bundle.run_id
    }

    pub fn feature_names(&self) -> &[String] {
        self.bundle.features.names()
    }

    /// Validate, project, encode, scale and classify one record
    pub fn predict(&self, record: &FeatureRecord) -> CkdResult<Prediction> {
        let values = self.bundle.features.project(record, &self.bundle.encoder)?;
        let scaled = self.bundle.scaler.transform_row(&values)?;
        let prediction = self.predict_scaled(&scaled);

        debug!(
            label = prediction.label,
            ckd_probability = prediction.ckd_probability,
            "Record scored"
        );

        Ok(prediction)
    }

    /// Label only
    pub fn predict_label(&self, record: &FeatureRecord) -> CkdResult<u8> {
        self.predict(record).map(|p| p.label)
    }

    pub fn predict_snapshot(&self, snapshot: &PatientSnapshot) -> CkdResult<Prediction> {
        self.predict(&snapshot.to_record()?)
    }

    /// Score several records independently; one failure does not affect the others
    pub fn predict_batch(&self, records: &[FeatureRecord]) -> Vec<CkdResult<Prediction>> {
        records.iter().map(|r| self.predict(r)).collect()
    }

    /// Classify a row that is already in scaled feature order
    pub(crate) fn predict_scaled(&self, scaled: &[f64]) -> Prediction {
        let proba = self.bundle.forest.predict_proba(scaled);
        Prediction {
            label: u8::from(proba[1] > proba[0]),
            ckd_probability: proba[1],
        }
    }
}
