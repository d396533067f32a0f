//! Offline training run: prepare, split, impute, scale, fit, evaluate, persist

use crate::config::{ImputationScope, TrainingConfig};
use crate::data::dataset::RawDataset;
use crate::data::prepare::{prepare, ModeImputer};
use crate::error::CkdResult;
use crate::feature_extractor::{FeatureRecord, FeatureSchema, FeatureValue};
use crate::models::forest::{ForestParams, RandomForest};
use crate::models::inference::{Prediction, Predictor};
use crate::models::loader::ArtifactBundle;
use crate::models::scaler::StandardScaler;
use crate::training::evaluate::{
    rank_importances, ClassificationReport, ConfusionMatrix, RankedFeature,
};
use crate::training::report::{
    render_confusion_matrix, render_feature_importance, CONFUSION_MATRIX_FILE,
    FEATURE_IMPORTANCE_FILE,
};
use crate::training::split::stratified_split;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// First held-out patient scored through the regular inference path
#[derive(Debug, Clone)]
pub struct SamplePrediction {
    /// Row index in the input dataset
    pub row: usize,
    /// Imputed, encoded feature values keyed by feature name
    pub record: FeatureRecord,
    pub prediction: Prediction,
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
    pub ranked_features: Vec<RankedFeature>,
    pub train_rows: Vec<usize>,
    pub test_rows: Vec<usize>,
    pub test_labels: Vec<u8>,
    pub test_predictions: Vec<u8>,
    pub sample_prediction: Option<SamplePrediction>,
}

impl TrainingOutcome {
    pub fn accuracy(&self) -> f64 {
        self.report.accuracy
    }
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train and evaluate on an in-memory dataset. Nothing is written to disk.
    pub fn run(&self, raw: &RawDataset) -> CkdResult<TrainingOutcome> {
        let prepared = prepare(raw, &self.config)?;

        let split = stratified_split(&prepared.target, self.config.test_size, self.config.seed)?;
        info!(
            train = split.train.len(),
            test = split.test.len(),
            seed = self.config.seed,
            "Stratified split"
        );

        let imputer = match self.config.imputation {
            ImputationScope::TrainingSplit => {
                ModeImputer::fit(&prepared.rows, &split.train, &prepared.feature_names)?
            }
            ImputationScope::FullDataset => {
                let all: Vec<usize> = (0..prepared.n_rows()).collect();
                ModeImputer::fit(&prepared.rows, &all, &prepared.feature_names)?
            }
        };
        debug!(scope = ?self.config.imputation, "Missing values imputed with column modes");

        let x_train = imputer.transform(&prepared.rows, &split.train);
        let x_test = imputer.transform(&prepared.rows, &split.test);
        let y_train: Vec<u8> = split.train.iter().map(|&r| prepared.target[r]).collect();
        let y_test: Vec<u8> = split.test.iter().map(|&r| prepared.target[r]).collect();

        let scaler = StandardScaler::fit(&x_train)?;
        let scaled_train = scaler.transform(&x_train)?;
        let scaled_test = scaler.transform(&x_test)?;

        let forest = RandomForest::fit(
            &scaled_train,
            &y_train,
            ForestParams::from(&self.config.forest),
        )?;

        let predictions = forest.predict_many(&scaled_test);
        let confusion = ConfusionMatrix::from_labels(&y_test, &predictions);
        let report = ClassificationReport::from_confusion(&confusion);
        let ranked_features = rank_importances(
            &prepared.feature_names,
            &forest.feature_importances(),
            self.config.top_features,
        );

        let bundle = ArtifactBundle::new(
            forest,
            scaler,
            FeatureSchema::new(prepared.feature_names.clone()),
            prepared.encoder,
        )?;

        let predictor = Predictor::new(bundle);
        let sample_prediction = match (split.test.first(), x_test.first()) {
            (Some(&row), Some(values)) => {
                let record: FeatureRecord = prepared
                    .feature_names
                    .iter()
                    .zip(values)
                    .map(|(name, &value)| (name.clone(), FeatureValue::Number(value)))
                    .collect();
                let prediction = predictor.predict(&record)?;
                Some(SamplePrediction {
                    row,
                    record,
                    prediction,
                })
            }
            _ => None,
        };

        Ok(TrainingOutcome {
            bundle: predictor.into_bundle(),
            report,
            confusion,
            ranked_features,
            train_rows: split.train,
            test_rows: split.test,
            test_labels: y_test,
            test_predictions: predictions,
            sample_prediction,
        })
    }
}

/// Full offline run: read the CSV, train, persist the bundle and diagnostics
pub fn train_from_csv(config: &TrainingConfig, models_dir: &Path) -> Result<TrainingOutcome> {
    info!(path = %config.data_path, "Loading dataset");
    let raw = RawDataset::from_csv_path(&config.data_path, &config.missing_sentinel)
        .with_context(|| format!("Failed to read dataset {}", config.data_path))?;
    debug!(missing_cells = raw.missing_count(), "Missing cells before imputation");

    let outcome = Trainer::new(config.clone())
        .run(&raw)
        .context("Training failed")?;

    outcome
        .bundle
        .save(models_dir)
        .with_context(|| format!("Failed to save artifacts to {}", models_dir.display()))?;

    let confusion_path = models_dir.join(CONFUSION_MATRIX_FILE);
    if let Err(e) = render_confusion_matrix(&confusion_path, &outcome.confusion) {
        warn!(path = %confusion_path.display(), "Could not render confusion matrix: {:#}", e);
    }
    let importance_path = models_dir.join(FEATURE_IMPORTANCE_FILE);
    if let Err(e) = render_feature_importance(&importance_path, &outcome.ranked_features) {
        warn!(path = %importance_path.display(), "Could not render feature importances: {:#}", e);
    }

    info!(accuracy = outcome.accuracy(), "Model accuracy: {:.4}", outcome.accuracy());
    info!("Classification report:\n{}", outcome.report);
    for (rank, feature) in outcome.ranked_features.iter().enumerate() {
        info!(
            rank = rank + 1,
            feature = %feature.name,
            importance = feature.importance,
            "Top feature"
        );
    }

    if let Some(sample) = &outcome.sample_prediction {
        info!(
            row = sample.row,
            label = sample.prediction.label,
            ckd_probability = sample.prediction.ckd_probability,
            "Sample prediction on first held-out patient"
        );
    }

    info!(
        run_id = %outcome.bundle.run_id,
        dir = %models_dir.display(),
        "Training complete"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForestConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// GFR-driven labels with a noise column and a text column
    fn dataset(rows: usize) -> RawDataset {
        dataset_with_gaps(rows, "?")
    }

    /// Every ninth Age cell holds `gap` instead of a number
    fn dataset_with_gaps(rows: usize, gap: &str) -> RawDataset {
        let mut rng = StdRng::seed_from_u64(11);
        let mut csv = String::from("PatientID,Age,GFR,Clinic,Diagnosis\n");
        for i in 0..rows {
            let gfr: f64 = rng.gen_range(15.0..120.0);
            let age = if i % 9 == 0 {
                gap.to_string()
            } else {
                rng.gen_range(20..90).to_string()
            };
            let clinic = ["North", "South", "East"][i % 3];
            csv.push_str(&format!(
                "{},{},{:.1},{},{}\n",
                i + 1,
                age,
                gfr,
                clinic,
                u8::from(gfr < 60.0)
            ));
        }
        RawDataset::from_reader(csv.as_bytes(), "?").unwrap()
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            forest: ForestConfig {
                n_estimators: 15,
                ..ForestConfig::default()
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_run_produces_consistent_bundle() {
        let outcome = Trainer::new(config()).run(&dataset(150)).unwrap();

        assert_eq!(outcome.bundle.features.names(), &["Age", "GFR", "Clinic"]);
        assert_eq!(outcome.bundle.forest.n_features(), 3);
        assert_eq!(outcome.bundle.scaler.n_features(), 3);
        assert!(outcome.bundle.encoder.is_categorical("Clinic"));
        assert_eq!(outcome.test_rows.len(), 30);
        assert_eq!(outcome.confusion.total(), 30);
        assert!(outcome.accuracy() > 0.8);
        assert_eq!(outcome.ranked_features[0].name, "GFR");
    }

    #[test]
    fn test_sample_prediction_matches_held_out_prediction() {
        let outcome = Trainer::new(config()).run(&dataset(120)).unwrap();
        let sample = outcome.sample_prediction.unwrap();

        assert_eq!(sample.row, outcome.test_rows[0]);
        assert_eq!(sample.prediction.label, outcome.test_predictions[0]);
    }

    /// Deterministic GFR with labels at 60; `ages[i]` of `None` is written as `?`
    fn dataset_with_ages(ages: &[Option<f64>]) -> RawDataset {
        let mut csv = String::from("PatientID,Age,GFR,Diagnosis\n");
        for (i, age) in ages.iter().enumerate() {
            let gfr = 15 + (i * 37) % 105;
            let age = age.map_or_else(|| "?".to_string(), |a| a.to_string());
            csv.push_str(&format!("{},{},{},{}\n", i + 1, age, gfr, u8::from(gfr < 60)));
        }
        RawDataset::from_reader(csv.as_bytes(), "?").unwrap()
    }

    #[test]
    fn test_imputation_scope_changes_only_imputed_values() {
        // The split depends on labels only, so it can be read off a first run
        let rows = 120;
        let layout = Trainer::new(config())
            .run(&dataset_with_ages(&vec![Some(50.0); rows]))
            .unwrap();

        // Training rows: mode 40 with gaps. Held-out rows: all 85, which
        // outnumbers the 40s once the whole table is counted.
        let mut ages = vec![Some(85.0); rows];
        for (k, &row) in layout.train_rows.iter().enumerate() {
            ages[row] = match k % 6 {
                0 => None,
                1 => Some(40.0),
                _ => Some(100.5 + k as f64),
            };
        }
        let gaps = layout.train_rows.len().div_ceil(6);
        let raw = dataset_with_ages(&ages);

        let split_scope = Trainer::new(config()).run(&raw).unwrap();
        let full_scope = Trainer::new(TrainingConfig {
            imputation: ImputationScope::FullDataset,
            ..config()
        })
        .run(&raw)
        .unwrap();

        assert_eq!(split_scope.train_rows, layout.train_rows);
        assert_eq!(split_scope.train_rows, full_scope.train_rows);
        assert_eq!(split_scope.test_rows, full_scope.test_rows);

        // Age is feature 0; only the imputed cells move its training mean
        let n_train = split_scope.train_rows.len() as f64;
        let shift = full_scope.bundle.scaler.mean()[0] - split_scope.bundle.scaler.mean()[0];
        assert!((shift - gaps as f64 * (85.0 - 40.0) / n_train).abs() < 1e-9);
        assert_eq!(
            split_scope.bundle.scaler.mean()[1],
            full_scope.bundle.scaler.mean()[1]
        );
    }

    #[test]
    fn test_nan_cells_are_imputed_during_training() {
        let with_nan = Trainer::new(config()).run(&dataset_with_gaps(90, "NaN")).unwrap();
        let with_sentinel = Trainer::new(config()).run(&dataset_with_gaps(90, "?")).unwrap();

        assert!(with_nan.bundle.scaler.mean().iter().all(|m| m.is_finite()));
        assert_eq!(with_nan.bundle.scaler, with_sentinel.bundle.scaler);
        assert_eq!(with_nan.bundle.forest, with_sentinel.bundle.forest);
        assert_eq!(with_nan.test_predictions, with_sentinel.test_predictions);
    }

    #[test]
    fn test_train_from_csv_writes_bundle_and_plots() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("ckd.csv");
        let mut csv = String::from("PatientID,GFR,Diagnosis\n");
        for i in 0..60 {
            let gfr = 20 + i * 2;
            csv.push_str(&format!("{},{},{}\n", i, gfr, u8::from(gfr < 60)));
        }
        std::fs::write(&data_path, csv).unwrap();

        let models_dir = dir.path().join("models");
        let training = TrainingConfig {
            data_path: data_path.display().to_string(),
            ..config()
        };
        let outcome = train_from_csv(&training, &models_dir).unwrap();

        let loaded = ArtifactBundle::load(&models_dir).unwrap();
        assert_eq!(loaded, outcome.bundle);
        assert!(models_dir.join(CONFUSION_MATRIX_FILE).exists());
        assert!(models_dir.join(FEATURE_IMPORTANCE_FILE).exists());
    }

    #[test]
    fn test_missing_dataset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let training = TrainingConfig {
            data_path: dir.path().join("absent.csv").display().to_string(),
            ..config()
        };
        assert!(train_from_csv(&training, dir.path()).is_err());
    }
}
