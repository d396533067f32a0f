//! Model components: scaler, random forest, artifact bundle and inference

pub mod forest;
pub mod inference;
pub mod loader;
pub mod scaler;
pub mod tree;

pub use forest::{ForestParams, RandomForest};
pub use inference::{Prediction, Predictor};
pub use loader::{ArtifactBundle, ArtifactKind};
pub use scaler::StandardScaler;
