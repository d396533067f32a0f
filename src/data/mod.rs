//! Dataset loading, cleaning and encoding

pub mod dataset;
pub mod encoding;
pub mod prepare;

pub use dataset::{ColumnKind, RawDataset};
pub use encoding::CategoryEncoder;
pub use prepare::{prepare, ModeImputer, PreparedDataset};
