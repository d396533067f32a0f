//! End-to-end training, persistence and inference over a synthetic CKD dataset

use ckd_predictor::config::{ForestConfig, ImputationScope, TrainingConfig};
use ckd_predictor::data::RawDataset;
use ckd_predictor::feature_extractor::{FeatureRecord, FeatureValue};
use ckd_predictor::models::loader::ArtifactKind;
use ckd_predictor::training::{train_from_csv, Trainer, TrainingOutcome};
use ckd_predictor::{ArtifactBundle, CkdError, PatientSnapshot, Predictor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ROWS: usize = 400;

/// Columns: PatientID, every snapshot feature (sorted), Diagnosis.
///
/// Features scatter around the reference patient; GFR is uniform over
/// 15..120 and CKD means GFR below 60. Creatinine and BUN follow GFR.
fn synthetic_csv(seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let names = PatientSnapshot::feature_names();
    let reference = PatientSnapshot::reference().to_record().unwrap();

    let mut csv = String::from("PatientID,");
    csv.push_str(&names.join(","));
    csv.push_str(",Diagnosis\n");

    for id in 0..ROWS {
        let gfr: f64 = rng.gen_range(15.0..120.0);
        let mut cells = vec![(id + 1000).to_string()];

        for name in &names {
            let cell = match name.as_str() {
                "GFR" => format!("{:.2}", gfr),
                "SerumCreatinine" => format!("{:.3}", 100.0 / gfr + rng.gen_range(-0.1..0.1)),
                "BUNLevels" => format!("{:.2}", 5.0 + 900.0 / gfr + rng.gen_range(-2.0..2.0)),
                "DoctorInCharge" => "Confidential".to_string(),
                _ if rng.gen_bool(0.02) => "?".to_string(),
                _ => match &reference[name.as_str()] {
                    FeatureValue::Number(base) => {
                        let spread = base.abs() * 0.2 + 1.0;
                        format!("{:.3}", base + rng.gen_range(-spread..spread))
                    }
                    other => panic!("unexpected reference value {:?}", other),
                },
            };
            cells.push(cell);
        }

        cells.push(u8::from(gfr < 60.0).to_string());
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }

    csv
}

fn write_dataset(dir: &Path, seed: u64) -> PathBuf {
    let path = dir.join("ckd.csv");
    std::fs::write(&path, synthetic_csv(seed)).unwrap();
    path
}

fn config(data_path: &Path) -> TrainingConfig {
    TrainingConfig {
        data_path: data_path.display().to_string(),
        forest: ForestConfig {
            n_estimators: 30,
            ..ForestConfig::default()
        },
        ..TrainingConfig::default()
    }
}

fn train(dir: &TempDir) -> (TrainingConfig, RawDataset, TrainingOutcome) {
    let config = config(&write_dataset(dir.path(), 7));
    let raw = RawDataset::from_csv_path(&config.data_path, &config.missing_sentinel).unwrap();
    let outcome = Trainer::new(config.clone()).run(&raw).unwrap();
    (config, raw, outcome)
}

#[test]
fn persisted_feature_list_matches_training_columns() {
    let dir = tempfile::tempdir().unwrap();
    let (_, raw, outcome) = train(&dir);

    let expected: Vec<String> = raw
        .columns()
        .iter()
        .filter(|c| c.as_str() != "PatientID" && c.as_str() != "Diagnosis")
        .cloned()
        .collect();

    assert_eq!(outcome.bundle.features.names(), expected.as_slice());
    assert_eq!(outcome.bundle.features.len(), 52);
    assert_eq!(outcome.bundle.forest.n_features(), 52);
    assert_eq!(outcome.bundle.scaler.n_features(), 52);
    assert!(outcome.bundle.encoder.is_categorical("DoctorInCharge"));
}

#[test]
fn training_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let (config, raw, first) = train(&dir);
    let second = Trainer::new(config).run(&raw).unwrap();

    assert_eq!(first.test_rows, second.test_rows);
    assert_eq!(first.confusion, second.confusion);
    assert_eq!(first.ranked_features, second.ranked_features);
    assert_eq!(first.report, second.report);
    assert_eq!(first.bundle.forest, second.bundle.forest);
    assert_ne!(first.bundle.run_id, second.bundle.run_id);
}

#[test]
fn held_out_accuracy_reflects_the_signal() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, outcome) = train(&dir);

    assert_eq!(outcome.test_rows.len(), ROWS / 5);
    assert_eq!(outcome.confusion.total() as usize, ROWS / 5);
    assert!(outcome.accuracy() > 0.8, "accuracy {}", outcome.accuracy());

    let top: Vec<&str> = outcome
        .ranked_features
        .iter()
        .take(3)
        .map(|f| f.name.as_str())
        .collect();
    assert!(top.contains(&"GFR"), "top features {:?}", top);
    assert_eq!(outcome.ranked_features.len(), 10);
}

#[test]
fn save_load_predict_matches_fresh_model() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, outcome) = train(&dir);
    let models_dir = dir.path().join("models");
    outcome.bundle.save(&models_dir).unwrap();

    let fresh = Predictor::new(outcome.bundle.clone());
    let loaded = Predictor::load(&models_dir).unwrap();
    assert_eq!(loaded.bundle(), fresh.bundle());

    let sample = outcome.sample_prediction.as_ref().unwrap();
    assert_eq!(loaded.predict(&sample.record).unwrap(), sample.prediction);

    let reference = PatientSnapshot::reference().to_record().unwrap();
    assert_eq!(
        loaded.predict(&reference).unwrap(),
        fresh.predict(&reference).unwrap()
    );
}

#[test]
fn reference_patient_classifies_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, outcome) = train(&dir);
    let predictor = Predictor::new(outcome.bundle);

    let healthy = predictor
        .predict_snapshot(&PatientSnapshot::reference())
        .unwrap();
    assert_eq!(healthy.label, 0);
    assert_eq!(
        predictor
            .predict_snapshot(&PatientSnapshot::reference())
            .unwrap(),
        healthy
    );

    let failing_kidneys = PatientSnapshot {
        gfr: 22.0,
        serum_creatinine: 4.5,
        bun_levels: 45.0,
        ..PatientSnapshot::reference()
    };
    assert_eq!(predictor.predict_snapshot(&failing_kidneys).unwrap().label, 1);
}

#[test]
fn missing_gfr_is_rejected_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, outcome) = train(&dir);
    let predictor = Predictor::new(outcome.bundle);

    let mut record: FeatureRecord = PatientSnapshot::reference().to_record().unwrap();
    record.remove("GFR");

    match predictor.predict(&record) {
        Err(CkdError::MissingFeature { missing }) => assert_eq!(missing, vec!["GFR"]),
        other => panic!("expected MissingFeature, got {:?}", other),
    }
}

#[test]
fn text_category_is_encoded_with_training_codes() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, outcome) = train(&dir);
    let predictor = Predictor::new(outcome.bundle);

    let mut record = PatientSnapshot::reference().to_record().unwrap();
    record.insert(
        "DoctorInCharge".to_string(),
        FeatureValue::Text("Confidential".to_string()),
    );
    assert!(predictor.predict(&record).is_ok());

    record.insert(
        "DoctorInCharge".to_string(),
        FeatureValue::Text("Dr Unknown".to_string()),
    );
    assert!(matches!(
        predictor.predict(&record),
        Err(CkdError::InvalidFeature { .. })
    ));
}

#[test]
fn mixed_run_artifacts_are_a_version_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let (config, raw, first) = train(&dir);
    let second = Trainer::new(config).run(&raw).unwrap();

    let first_dir = dir.path().join("first");
    let second_dir = dir.path().join("second");
    first.bundle.save(&first_dir).unwrap();
    second.bundle.save(&second_dir).unwrap();

    let scaler = ArtifactKind::Scaler.file_name();
    std::fs::copy(second_dir.join(scaler), first_dir.join(scaler)).unwrap();

    match ArtifactBundle::load(&first_dir) {
        Err(CkdError::VersionMismatch { artifact, .. }) => assert_eq!(artifact, scaler),
        other => panic!("expected VersionMismatch, got {:?}", other.map(|b| b.run_id)),
    }
}

#[test]
fn missing_artifact_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, outcome) = train(&dir);
    let models_dir = dir.path().join("models");
    outcome.bundle.save(&models_dir).unwrap();

    std::fs::remove_file(models_dir.join(ArtifactKind::FeatureNames.file_name())).unwrap();

    match Predictor::load(&models_dir) {
        Err(CkdError::ArtifactLoad { path, .. }) => {
            assert!(path.ends_with(ArtifactKind::FeatureNames.file_name()))
        }
        other => panic!("expected ArtifactLoad, got {:?}", other.map(|p| p.run_id())),
    }
}

#[test]
fn both_imputation_scopes_train() {
    let dir = tempfile::tempdir().unwrap();
    let (config, raw, split_scope) = train(&dir);
    let full_scope = Trainer::new(TrainingConfig {
        imputation: ImputationScope::FullDataset,
        ..config
    })
    .run(&raw)
    .unwrap();

    assert_eq!(split_scope.test_rows, full_scope.test_rows);
    assert!(full_scope.accuracy() > 0.8);
}

#[test]
fn train_from_csv_writes_artifacts_and_plots() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&write_dataset(dir.path(), 3));
    let models_dir = dir.path().join("ml").join("models");

    let outcome = train_from_csv(&config, &models_dir).unwrap();

    for kind in ArtifactKind::ALL {
        assert!(models_dir.join(kind.file_name()).exists());
    }
    assert!(models_dir.join("confusion_matrix.svg").exists());
    assert!(models_dir.join("feature_importance.svg").exists());
    assert_eq!(
        ArtifactBundle::load(&models_dir).unwrap().run_id,
        outcome.bundle.run_id
    );
}
