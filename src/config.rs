//! Configuration management for the CKD predictor

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Which rows the mode imputer learns from
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImputationScope {
    /// Fit on the training split only (no held-out leakage)
    #[default]
    TrainingSplit,
    /// Fit on every row before splitting; matches artifacts built by the
    /// historical training script
    FullDataset,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    pub training: TrainingConfig,
    pub serving: ServingConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming scoring requests
    pub request_subject: String,
    /// Subject the prediction log documents are published to
    pub prediction_subject: String,
}

/// Artifact bundle location
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding model, scaler, feature list, encoder and plots
    pub models_dir: String,
}

/// Offline training configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Labelled CSV dataset
    pub data_path: String,
    #[serde(default = "default_target_column")]
    pub target_column: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_missing_sentinel")]
    pub missing_sentinel: String,
    /// Held-out fraction for the stratified split
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Seed for the stratified split
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub imputation: ImputationScope,
    #[serde(default)]
    pub forest: ForestConfig,
    /// How many ranked features to report and plot
    #[serde(default = "default_top_features")]
    pub top_features: usize,
}

/// Random forest hyper-parameters
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            seed: 42,
        }
    }
}

/// Scoring service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServingConfig {
    /// Maximum number of requests scored concurrently
    pub workers: usize,
    /// Model name recorded in prediction log documents
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

fn default_target_column() -> String {
    "Diagnosis".to_string()
}

fn default_id_column() -> String {
    "PatientID".to_string()
}

fn default_missing_sentinel() -> String {
    "?".to_string()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_top_features() -> usize {
    10
}

fn default_model_name() -> String {
    "ckd_random_forest".to_string()
}

fn default_metrics_interval() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: "Chronic_Kidney_Disease_data.csv".to_string(),
            target_column: default_target_column(),
            id_column: default_id_column(),
            missing_sentinel: default_missing_sentinel(),
            test_size: default_test_size(),
            seed: default_seed(),
            imputation: ImputationScope::default(),
            forest: ForestConfig::default(),
            top_features: default_top_features(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "ckd.scoring.requests".to_string(),
                prediction_subject: "ckd.predictions".to_string(),
            },
            artifacts: ArtifactsConfig {
                models_dir: "ml/models".to_string(),
            },
            training: TrainingConfig::default(),
            serving: ServingConfig {
                workers: 4,
                model_name: default_model_name(),
                metrics_interval_secs: default_metrics_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
