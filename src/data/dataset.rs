//! Raw CSV dataset loading

use crate::error::{CkdError, CkdResult};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Inferred type of a dataset column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every present cell parses as a number
    Numeric,
    /// At least one present cell is not a number
    Categorical,
}

/// Untyped tabular dataset; `None` marks a missing cell
#[derive(Debug, Clone)]
pub struct RawDataset {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawDataset {
    /// Build a dataset from already split cells.
    ///
    /// Column names are whitespace-stripped; every row must have one cell
    /// per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> CkdResult<Self> {
        let columns: Vec<String> = columns.into_iter().map(|c| c.trim().to_string()).collect();

        let mut seen = HashSet::new();
        for column in &columns {
            if column.is_empty() {
                return Err(CkdError::data("empty column name in header"));
            }
            if !seen.insert(column.as_str()) {
                return Err(CkdError::data(format!("duplicate column '{}'", column)));
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(CkdError::data(format!(
                    "row {} has {} cells, expected {}",
                    i + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    /// Load a CSV file, treating `missing_sentinel` and empty cells as missing
    pub fn from_csv_path<P: AsRef<Path>>(path: P, missing_sentinel: &str) -> CkdResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            CkdError::data(format!("cannot open dataset {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_reader(file, missing_sentinel)?;

        info!(
            path = %path.display(),
            rows = dataset.n_rows(),
            columns = dataset.n_columns(),
            "Dataset loaded"
        );

        Ok(dataset)
    }

    /// Parse CSV content from any reader
    pub fn from_reader<R: Read>(reader: R, missing_sentinel: &str) -> CkdResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()
            .map_err(|e| CkdError::data(format!("unreadable header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| CkdError::data(format!("unparsable row: {}", e)))?;
            let row = record
                .iter()
                .map(|cell| {
                    if is_missing(cell, missing_sentinel) {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            rows.push(row);
        }

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column_cells(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(move |row| row[index].as_deref())
    }

    /// Number of missing cells across the whole table
    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().filter(|cell| cell.is_none()).count())
            .sum()
    }

    /// Infer whether a column holds numbers or categories
    pub fn column_kind(&self, index: usize) -> ColumnKind {
        let all_numeric = self
            .column_cells(index)
            .flatten()
            .all(|cell| parse_finite(cell).is_some());

        if all_numeric {
            ColumnKind::Numeric
        } else {
            ColumnKind::Categorical
        }
    }
}

/// Parse a numeric cell; `NaN` and infinities do not count as numbers
pub(crate) fn parse_finite(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Empty cells, the sentinel and non-finite spellings (`NaN`, `inf`) are missing
fn is_missing(cell: &str, missing_sentinel: &str) -> bool {
    cell.is_empty()
        || cell == missing_sentinel
        || cell.parse::<f64>().map_or(false, |v| !v.is_finite())
}
