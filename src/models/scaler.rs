//! Per-feature standardization

use crate::error::{CkdError, CkdResult};
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance transform learned from the training split.
///
/// Never refit after training; inference applies the stored statistics in
/// persisted feature order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Learn mean and population standard deviation per column
    pub fn fit(rows: &[Vec<f64>]) -> CkdResult<Self> {
        let first = rows
            .first()
            .ok_or_else(|| CkdError::data("cannot fit scaler on an empty training split"))?;
        let width = first.len();
        let n = rows.len() as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            if row.len() != width {
                return Err(CkdError::data("inconsistent row width while fitting scaler"));
            }
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, &v), &m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }

        // Constant columns keep their centred value instead of dividing by zero
        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Standardize one row
    pub fn transform_row(&self, row: &[f64]) -> CkdResult<Vec<f64>> {
        if row.len() != self.mean.len() {
            return Err(CkdError::InvalidFeature {
                feature: "<row>".to_string(),
                reason: format!(
                    "expected {} values, got {}",
                    self.mean.len(),
                    row.len()
                ),
            });
        }

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect())
    }

    /// Standardize many rows
    pub fn transform(&self, rows: &[Vec<f64>]) -> CkdResult<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_learns_mean_and_population_std() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();

        assert_eq!(scaler.mean(), &[2.0, 10.0]);
        assert_eq!(scaler.scale(), &[1.0, 1.0]);
        assert_eq!(scaler.transform_row(&[3.0, 12.0]).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_transformed_training_rows_are_standardized() {
        let rows = vec![vec![2.0], vec![4.0], vec![6.0], vec![8.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();

        let mean: f64 = scaled.iter().map(|r| r[0]).sum::<f64>() / 4.0;
        let var: f64 = scaled.iter().map(|r| (r[0] - mean).powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0]]).unwrap();
        assert!(scaler.transform_row(&[1.0]).is_err());
    }

    #[test]
    fn test_empty_fit_is_rejected() {
        assert!(StandardScaler::fit(&[]).is_err());
    }
}
