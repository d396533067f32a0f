//! Error taxonomy for training, artifact handling and inference

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the CKD prediction core
#[derive(Error, Debug)]
pub enum CkdError {
    /// Training input is unusable (unparsable, target missing, not binary, ...)
    #[error("Data integrity error: {reason}")]
    DataIntegrity { reason: String },

    /// Inference input lacks one or more required feature names
    #[error("Missing required feature(s): {}", .missing.join(", "))]
    MissingFeature { missing: Vec<String> },

    /// A feature value could not be turned into a number
    #[error("Invalid value for feature '{feature}': {reason}")]
    InvalidFeature { feature: String, reason: String },

    /// A bundle file is missing, unreadable, corrupt or inconsistent
    #[error("Failed to load artifact {}: {reason}", .path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    /// Artifacts were not produced by the same training run
    #[error("Artifact version mismatch in {artifact}: expected {expected}, found {found}")]
    VersionMismatch {
        artifact: String,
        expected: String,
        found: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for the prediction core
pub type CkdResult<T> = Result<T, CkdError>;

impl CkdError {
    pub(crate) fn data(reason: impl Into<String>) -> Self {
        CkdError::DataIntegrity {
            reason: reason.into(),
        }
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CkdError::ArtifactLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error is a per-request failure the caller can fix by
    /// correcting the input (as opposed to a deployment problem)
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            CkdError::MissingFeature { .. } | CkdError::InvalidFeature { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_feature_message_names_fields() {
        let err = CkdError::MissingFeature {
            missing: vec!["GFR".to_string(), "ACR".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required feature(s): GFR, ACR");
        assert!(err.is_request_error());
    }

    #[test]
    fn test_artifact_error_names_path() {
        let err = CkdError::artifact("ml/models/scaler.json", "file not found");
        assert!(err.to_string().contains("ml/models/scaler.json"));
        assert!(!err.is_request_error());
    }
}
