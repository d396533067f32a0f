//! Type definitions for patients and prediction messages

pub mod patient;
pub mod prediction;

pub use patient::PatientSnapshot;
pub use prediction::{PredictionRecord, ScoringReply, ScoringRequest};
