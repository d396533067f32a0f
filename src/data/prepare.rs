//! Turning a raw dataset into a numeric feature matrix and binary target

use crate::config::TrainingConfig;
use crate::data::dataset::{parse_finite, ColumnKind, RawDataset};
use crate::data::encoding::CategoryEncoder;
use crate::error::{CkdError, CkdResult};
use tracing::{debug, info};

/// Encoded dataset ready for splitting; feature cells may still be missing
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    /// Feature columns in file order, id and target removed
    pub feature_names: Vec<String>,
    /// One row per patient, one cell per feature
    pub rows: Vec<Vec<Option<f64>>>,
    /// Binary target (0 = no CKD, 1 = CKD)
    pub target: Vec<u8>,
    /// Codes of every categorical feature column
    pub encoder: CategoryEncoder,
}

impl PreparedDataset {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// Drop the id column, encode categories and separate the target
pub fn prepare(raw: &RawDataset, config: &TrainingConfig) -> CkdResult<PreparedDataset> {
    let target_index = raw.column_index(&config.target_column).ok_or_else(|| {
        CkdError::data(format!("target column '{}' not found", config.target_column))
    })?;

    if raw.n_rows() == 0 {
        return Err(CkdError::data("dataset has no rows"));
    }

    let id_index = raw.column_index(&config.id_column);
    if id_index.is_some() {
        debug!(column = %config.id_column, "Dropping identifier column");
    }

    let feature_indices: Vec<usize> = (0..raw.n_columns())
        .filter(|&i| i != target_index && Some(i) != id_index)
        .collect();
    if feature_indices.is_empty() {
        return Err(CkdError::data("no feature columns left after removing id and target"));
    }

    let feature_names: Vec<String> = feature_indices
        .iter()
        .map(|&i| raw.columns()[i].clone())
        .collect();

    let mut encoder = CategoryEncoder::new();
    let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(feature_indices.len());
    for (&index, name) in feature_indices.iter().zip(&feature_names) {
        columns.push(encode_column(raw, index, name, &mut encoder)?);
    }

    let rows: Vec<Vec<Option<f64>>> = (0..raw.n_rows())
        .map(|r| columns.iter().map(|column| column[r]).collect())
        .collect();

    let target = encode_target(raw, target_index, &config.target_column)?;

    info!(
        rows = rows.len(),
        features = feature_names.len(),
        categorical = encoder.len(),
        "Categorical columns encoded"
    );

    Ok(PreparedDataset {
        feature_names,
        rows,
        target,
        encoder,
    })
}

fn encode_column(
    raw: &RawDataset,
    index: usize,
    name: &str,
    encoder: &mut CategoryEncoder,
) -> CkdResult<Vec<Option<f64>>> {
    match raw.column_kind(index) {
        ColumnKind::Numeric => Ok(raw
            .column_cells(index)
            .map(|cell| cell.and_then(parse_finite))
            .collect()),
        ColumnKind::Categorical => {
            encoder.fit_column(name, raw.column_cells(index).flatten());
            raw.column_cells(index)
                .map(|cell| cell.map(|v| encoder.encode(name, v)).transpose())
                .collect()
        }
    }
}

/// Encode the target to {0, 1}; missing labels take the most frequent label
fn encode_target(raw: &RawDataset, index: usize, name: &str) -> CkdResult<Vec<u8>> {
    let codes: Vec<Option<f64>> = match raw.column_kind(index) {
        ColumnKind::Numeric => raw
            .column_cells(index)
            .map(|cell| cell.and_then(parse_finite))
            .collect(),
        ColumnKind::Categorical => {
            let mut encoder = CategoryEncoder::new();
            encoder.fit_column(name, raw.column_cells(index).flatten());
            raw.column_cells(index)
                .map(|cell| cell.map(|v| encoder.encode(name, v)).transpose())
                .collect::<CkdResult<_>>()?
        }
    };

    let observed: Vec<f64> = codes.iter().flatten().copied().collect();
    let fill = most_frequent(&observed)
        .ok_or_else(|| CkdError::data(format!("target column '{}' has no values", name)))?;

    let mut target = Vec::with_capacity(codes.len());
    for code in codes {
        let value = code.unwrap_or(fill);
        let label = if value == 0.0 {
            0
        } else if value == 1.0 {
            1
        } else {
            return Err(CkdError::data(format!(
                "target column '{}' is not binary (found {})",
                name, value
            )));
        };
        target.push(label);
    }

    if !target.contains(&0) || !target.contains(&1) {
        return Err(CkdError::data(format!(
            "target column '{}' must contain both classes",
            name
        )));
    }

    Ok(target)
}

/// Most frequent finite value; ties resolve to the smallest value
pub(crate) fn most_frequent(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let mut j = i;
        while j < sorted.len() && sorted[j] == value {
            j += 1;
        }
        let count = j - i;
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
        i = j;
    }

    best.map(|(value, _)| value)
}

/// Per-column mode imputer
#[derive(Debug, Clone, PartialEq)]
pub struct ModeImputer {
    modes: Vec<f64>,
}

impl ModeImputer {
    /// Learn each column's mode from the selected rows
    pub fn fit(
        rows: &[Vec<Option<f64>>],
        indices: &[usize],
        feature_names: &[String],
    ) -> CkdResult<Self> {
        let mut modes = Vec::with_capacity(feature_names.len());
        for (col, name) in feature_names.iter().enumerate() {
            let observed: Vec<f64> = indices.iter().filter_map(|&r| rows[r][col]).collect();
            let mode = most_frequent(&observed).ok_or_else(|| {
                CkdError::data(format!("column '{}' has no observed values to impute from", name))
            })?;
            modes.push(mode);
        }
        Ok(Self { modes })
    }

    pub fn modes(&self) -> &[f64] {
        &self.modes
    }

    /// Fill the missing cells of one row
    pub fn fill_row(&self, row: &[Option<f64>]) -> Vec<f64> {
        row.iter()
            .zip(&self.modes)
            .map(|(cell, &mode)| cell.unwrap_or(mode))
            .collect()
    }

    /// Dense copies of the selected rows
    pub fn transform(&self, rows: &[Vec<Option<f64>>], indices: &[usize]) -> Vec<Vec<f64>> {
        indices.iter().map(|&r| self.fill_row(&rows[r])).collect()
    }
}
