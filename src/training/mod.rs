//! Offline training pipeline and held-out evaluation

pub mod evaluate;
pub mod report;
pub mod split;
pub mod trainer;

pub use evaluate::{rank_importances, ClassificationReport, ConfusionMatrix, RankedFeature};
pub use split::{stratified_split, SplitIndices};
pub use trainer::{train_from_csv, SamplePrediction, Trainer, TrainingOutcome};
