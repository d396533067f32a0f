//! Artifact bundle persistence and loading

use crate::data::encoding::CategoryEncoder;
use crate::error::{CkdError, CkdResult};
use crate::feature_extractor::FeatureSchema;
use crate::models::forest::RandomForest;
use crate::models::scaler::StandardScaler;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk layout version of the artifact files
pub const FORMAT_VERSION: u32 = 1;

/// Files making up a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Classifier,
    Scaler,
    FeatureNames,
    Encoder,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Classifier,
        ArtifactKind::Scaler,
        ArtifactKind::FeatureNames,
        ArtifactKind::Encoder,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::Classifier => "ckd_model.json",
            ArtifactKind::Scaler => "scaler.json",
            ArtifactKind::FeatureNames => "feature_names.json",
            ArtifactKind::Encoder => "encoder.json",
        }
    }
}

/// Header every artifact file carries around its payload
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope<T> {
    kind: ArtifactKind,
    format_version: u32,
    run_id: Uuid,
    created_at: DateTime<Utc>,
    payload: T,
}

/// Classifier, scaler, feature list and category codes from one training run
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub forest: RandomForest,
    pub scaler: StandardScaler,
    pub features: FeatureSchema,
    pub encoder: CategoryEncoder,
}

impl ArtifactBundle {
    /// Assemble a bundle under a fresh run id
    pub fn new(
        forest: RandomForest,
        scaler: StandardScaler,
        features: FeatureSchema,
        encoder: CategoryEncoder,
    ) -> CkdResult<Self> {
        let bundle = Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            forest,
            scaler,
            features,
            encoder,
        };
        bundle
            .check_consistency()
            .map_err(CkdError::data)?;
        Ok(bundle)
    }

    fn check_consistency(&self) -> Result<(), String> {
        if self.features.is_empty() {
            return Err("feature list is empty".to_string());
        }
        if self.forest.n_features() != self.features.len() {
            return Err(format!(
                "classifier expects {} features, feature list has {}",
                self.forest.n_features(),
                self.features.len()
            ));
        }
        if self.scaler.n_features() != self.features.len() {
            return Err(format!(
                "scaler covers {} features, feature list has {}",
                self.scaler.n_features(),
                self.features.len()
            ));
        }
        if let Some(column) = self
            .encoder
            .columns()
            .find(|c| !self.features.names().iter().any(|n| n == c))
        {
            return Err(format!("encoder column '{}' is not a feature", column));
        }
        self.forest.validate()
    }

    fn envelope_bytes<T: Serialize>(&self, kind: ArtifactKind, payload: &T) -> CkdResult<Vec<u8>> {
        let envelope = ArtifactEnvelope {
            kind,
            format_version: FORMAT_VERSION,
            run_id: self.run_id,
            created_at: self.created_at,
            payload,
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    /// Write all artifact files into `dir`, replacing a previous run.
    ///
    /// Everything is serialized and staged as `*.tmp` before any final file is
    /// touched; a failed write leaves the previous bundle in place.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> CkdResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let files = [
            (
                ArtifactKind::Classifier,
                self.envelope_bytes(ArtifactKind::Classifier, &self.forest)?,
            ),
            (
                ArtifactKind::Scaler,
                self.envelope_bytes(ArtifactKind::Scaler, &self.scaler)?,
            ),
            (
                ArtifactKind::FeatureNames,
                self.envelope_bytes(ArtifactKind::FeatureNames, &self.features)?,
            ),
            (
                ArtifactKind::Encoder,
                self.envelope_bytes(ArtifactKind::Encoder, &self.encoder)?,
            ),
        ];

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
        for (kind, bytes) in &files {
            let tmp = dir.join(format!("{}.tmp", kind.file_name()));
            if let Err(e) = fs::write(&tmp, bytes) {
                warn!(path = %tmp.display(), error = %e, "Failed to stage artifact, discarding run");
                discard_staged(&staged);
                return Err(e.into());
            }
            staged.push((tmp, dir.join(kind.file_name())));
        }

        for (i, (tmp, target)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(tmp, target) {
                warn!(path = %target.display(), error = %e, "Failed to install artifact");
                discard_staged(&staged[i..]);
                return Err(e.into());
            }
        }

        info!(
            run_id = %self.run_id,
            dir = %dir.display(),
            features = self.features.len(),
            "Model, scaler, feature names and encoder saved"
        );

        Ok(())
    }

    /// Load and cross-check every artifact file in `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> CkdResult<Self> {
        let dir = dir.as_ref();

        let (classifier, forest) = read_artifact::<RandomForest>(dir, ArtifactKind::Classifier)?;
        let (scaler_header, scaler) = read_artifact::<StandardScaler>(dir, ArtifactKind::Scaler)?;
        let (features_header, features) =
            read_artifact::<FeatureSchema>(dir, ArtifactKind::FeatureNames)?;
        let (encoder_header, encoder) =
            read_artifact::<CategoryEncoder>(dir, ArtifactKind::Encoder)?;

        for header in [&scaler_header, &features_header, &encoder_header] {
            if header.run_id != classifier.run_id {
                return Err(CkdError::VersionMismatch {
                    artifact: header.kind.file_name().to_string(),
                    expected: classifier.run_id.to_string(),
                    found: header.run_id.to_string(),
                });
            }
        }

        let bundle = Self {
            run_id: classifier.run_id,
            created_at: classifier.created_at,
            forest,
            scaler,
            features,
            encoder,
        };
        bundle
            .check_consistency()
            .map_err(|reason| CkdError::artifact(dir, reason))?;

        info!(
            run_id = %bundle.run_id,
            dir = %dir.display(),
            trees = bundle.forest.n_trees(),
            features = bundle.features.len(),
            "Model, scaler, feature names and encoder loaded"
        );

        Ok(bundle)
    }
}

/// Remove staged files that were written but never renamed into place
fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        if let Err(e) = fs::remove_file(tmp) {
            warn!(path = %tmp.display(), error = %e, "Could not remove staged artifact");
        }
    }
}

/// Envelope fields without the payload
struct ArtifactHeader {
    kind: ArtifactKind,
    run_id: Uuid,
    created_at: DateTime<Utc>,
}

fn read_artifact<T: DeserializeOwned>(
    dir: &Path,
    kind: ArtifactKind,
) -> CkdResult<(ArtifactHeader, T)> {
    let path = dir.join(kind.file_name());

    let bytes = fs::read(&path).map_err(|e| {
        let reason = if e.kind() == ErrorKind::NotFound {
            "file not found".to_string()
        } else {
            e.to_string()
        };
        CkdError::artifact(&path, reason)
    })?;

    // Header first, so a format change is reported as such rather than as corruption
    let envelope: ArtifactEnvelope<serde_json::Value> = serde_json::from_slice(&bytes)
        .map_err(|e| CkdError::artifact(&path, format!("corrupt artifact: {}", e)))?;

    if envelope.kind != kind {
        return Err(CkdError::artifact(
            &path,
            format!("expected {:?} artifact, found {:?}", kind, envelope.kind),
        ));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(CkdError::VersionMismatch {
            artifact: kind.file_name().to_string(),
            expected: format!("format v{}", FORMAT_VERSION),
            found: format!("format v{}", envelope.format_version),
        });
    }

    let payload = serde_json::from_value(envelope.payload)
        .map_err(|e| CkdError::artifact(&path, format!("corrupt payload: {}", e)))?;

    Ok((
        ArtifactHeader {
            kind,
            run_id: envelope.run_id,
            created_at: envelope.created_at,
        },
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::ForestParams;

    fn bundle() -> ArtifactBundle {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<u8> = (0..40).map(|i| u8::from(i >= 20)).collect();
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();
        let forest = RandomForest::fit(
            &scaled,
            &y,
            ForestParams {
                n_estimators: 5,
                ..ForestParams::default()
            },
        )
        .unwrap();
        let mut encoder = CategoryEncoder::new();
        encoder.fit_column("Clinic", ["north", "south"]);

        ArtifactBundle::new(
            forest,
            scaler,
            FeatureSchema::new(vec!["GFR".to_string(), "Clinic".to_string()]),
            encoder,
        )
        .unwrap()
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let original = bundle();
        original.save(dir.path()).unwrap();

        for kind in ArtifactKind::ALL {
            assert!(dir.path().join(kind.file_name()).exists());
            assert!(!dir.path().join(format!("{}.tmp", kind.file_name())).exists());
        }

        let loaded = ArtifactBundle::load(dir.path()).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        bundle().save(dir.path()).unwrap();
        fs::remove_file(dir.path().join("feature_names.json")).unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        match err {
            CkdError::ArtifactLoad { path, reason } => {
                assert!(path.ends_with("feature_names.json"));
                assert_eq!(reason, "file not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_file_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        bundle().save(dir.path()).unwrap();
        fs::write(dir.path().join("scaler.json"), b"{not json").unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, CkdError::ArtifactLoad { .. }));
    }

    #[test]
    fn test_mixed_runs_are_version_mismatch() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        bundle().save(first.path()).unwrap();
        bundle().save(second.path()).unwrap();

        fs::copy(
            second.path().join("scaler.json"),
            first.path().join("scaler.json"),
        )
        .unwrap();

        let err = ArtifactBundle::load(first.path()).unwrap_err();
        assert!(
            matches!(err, CkdError::VersionMismatch { ref artifact, .. } if artifact == "scaler.json")
        );
    }

    #[test]
    fn test_unknown_format_version_is_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        bundle().save(dir.path()).unwrap();

        let path = dir.path().join("encoder.json");
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["format_version"] = serde_json::json!(99);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, CkdError::VersionMismatch { .. }));
    }

    #[test]
    fn test_failed_save_keeps_previous_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let previous = bundle();
        previous.save(dir.path()).unwrap();

        // A directory in the way makes staging the scaler fail
        fs::create_dir(dir.path().join("scaler.json.tmp")).unwrap();
        assert!(bundle().save(dir.path()).is_err());

        let loaded = ArtifactBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.run_id, previous.run_id);
        assert_eq!(loaded, previous);

        for kind in ArtifactKind::ALL {
            let tmp = dir.path().join(format!("{}.tmp", kind.file_name()));
            assert!(!tmp.is_file(), "{} left behind", tmp.display());
        }
    }

    #[test]
    fn test_cyclic_tree_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        bundle().save(dir.path()).unwrap();

        let path = dir.path().join("ckd_model.json");
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let nodes = value["payload"]["trees"][0]["nodes"].as_array_mut().unwrap();
        let split = nodes.iter().position(|n| n["type"] == "split").unwrap();
        nodes[split]["left"] = serde_json::json!(split);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        match ArtifactBundle::load(dir.path()).unwrap_err() {
            CkdError::ArtifactLoad { reason, .. } => assert!(reason.contains("tree 0")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inconsistent_bundle_is_rejected() {
        let original = bundle();
        let err = ArtifactBundle::new(
            original.forest,
            original.scaler,
            FeatureSchema::new(vec!["GFR".to_string()]),
            CategoryEncoder::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("feature list"));
    }
}
