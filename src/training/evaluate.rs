//! Held-out evaluation: confusion matrix, classification report, feature ranking

use serde::{Deserialize, Serialize};
use std::fmt;

/// Display names of the two target classes
pub const CLASS_NAMES: [&str; 2] = ["Not CKD", "CKD"];

/// 2x2 confusion matrix; rows are actual labels, columns predicted labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[u32; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[u8], predicted: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (&truth, &guess) in actual.iter().zip(predicted) {
            matrix.add(truth, guess);
        }
        matrix
    }

    /// Record one outcome; labels outside {0, 1} are ignored
    pub fn add(&mut self, actual: u8, predicted: u8) {
        if actual > 1 || predicted > 1 {
            return;
        }
        let cell = &mut self.counts[actual as usize][predicted as usize];
        *cell = cell.saturating_add(1);
    }

    pub fn get(&self, actual: u8, predicted: u8) -> u32 {
        self.counts[actual as usize][predicted as usize]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> u32 {
        self.counts[0][0] + self.counts[1][1]
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct() as f64, self.total() as f64)
    }

    /// Precision, recall and F1 for one class
    pub fn class_metrics(&self, class: u8) -> ClassMetrics {
        let other = 1 - class;
        let tp = self.get(class, class) as f64;
        let fp = self.get(other, class) as f64;
        let fn_ = self.get(class, other) as f64;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        ClassMetrics {
            precision,
            recall,
            f1: ratio(2.0 * precision * recall, precision + recall),
            support: self.counts[class as usize].iter().sum(),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Per-class precision/recall statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of actual examples of the class
    pub support: u32,
}

/// Text report in the usual precision / recall / f1 / support layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let classes = [matrix.class_metrics(0), matrix.class_metrics(1)];
        let total = matrix.total();

        let macro_avg = ClassMetrics {
            precision: (classes[0].precision + classes[1].precision) / 2.0,
            recall: (classes[0].recall + classes[1].recall) / 2.0,
            f1: (classes[0].f1 + classes[1].f1) / 2.0,
            support: total,
        };

        let weight = |metric: fn(&ClassMetrics) -> f64| {
            let sum: f64 = classes.iter().map(|c| metric(c) * c.support as f64).sum();
            ratio(sum, total as f64)
        };
        let weighted_avg = ClassMetrics {
            precision: weight(|c: &ClassMetrics| c.precision),
            recall: weight(|c: &ClassMetrics| c.recall),
            f1: weight(|c: &ClassMetrics| c.f1),
            support: total,
        };

        Self {
            classes,
            accuracy: matrix.accuracy(),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (name, metrics) in CLASS_NAMES.iter().zip(&self.classes) {
            write_row(f, name, metrics)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        name, m.precision, m.recall, m.f1, m.support
    )
}

/// One feature with its importance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub name: String,
    pub importance: f64,
}

/// Sort features by descending importance and keep the first `top_n`.
///
/// The sort is stable, so equal importances keep their feature-list order.
pub fn rank_importances(names: &[String], importances: &[f64], top_n: usize) -> Vec<RankedFeature> {
    let mut ranked: Vec<RankedFeature> = names
        .iter()
        .zip(importances)
        .map(|(name, &importance)| RankedFeature {
            name: name.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(top_n);
    ranked
}
