//! CKD Predictor Library
//!
//! Trains a random-forest classifier for chronic kidney disease from a
//! labelled patient dataset, persists it as a versioned artifact bundle and
//! scores single patient records, locally or through a NATS scoring service.

pub mod config;
pub mod consumer;
pub mod data;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod training;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{CkdError, CkdResult};
pub use feature_extractor::{FeatureRecord, FeatureSchema, FeatureValue};
pub use models::inference::{Prediction, Predictor};
pub use models::loader::ArtifactBundle;
pub use producer::PredictionPublisher;
pub use training::{Trainer, TrainingOutcome};
pub use types::{PatientSnapshot, PredictionRecord, ScoringReply, ScoringRequest};
