//! Random forest classifier

use crate::config::ForestConfig;
use crate::error::{CkdError, CkdResult};
use crate::models::tree::{DecisionTree, TreeParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Hyper-parameters recorded with the fitted forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl From<&ForestConfig> for ForestParams {
    fn from(config: &ForestConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            seed: config.seed,
        }
    }
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::from(&ForestConfig::default())
    }
}

/// Bagged ensemble of CART trees; immutable once fitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit on scaled training rows and binary labels.
    ///
    /// Each tree draws a bootstrap sample and considers `floor(sqrt(n_features))`
    /// candidate features per split. Output is fully determined by `params.seed`.
    pub fn fit(x: &[Vec<f64>], y: &[u8], params: ForestParams) -> CkdResult<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(CkdError::data(format!(
                "cannot fit forest on {} rows with {} labels",
                x.len(),
                y.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(CkdError::data("forest needs at least one tree"));
        }
        if let Some(&label) = y.iter().find(|&&label| label > 1) {
            return Err(CkdError::data(format!("label {} is not binary", label)));
        }

        let n_features = x[0].len();
        let n_samples = x.len();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features: ((n_features as f64).sqrt().floor() as usize).max(1),
        };

        info!(
            trees = params.n_estimators,
            max_depth = params.max_depth,
            min_samples_split = params.min_samples_split,
            max_features = tree_params.max_features,
            samples = n_samples,
            features = n_features,
            "Fitting random forest"
        );

        let mut seeds = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_estimators)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seeds.gen());
                let bootstrap: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                let tree = DecisionTree::fit(x, y, &bootstrap, tree_params, &mut rng);
                debug!(tree = i, nodes = tree.n_nodes(), depth = tree.depth(), "Tree grown");
                tree
            })
            .collect();

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the tree leaf distributions, `[p(no CKD), p(CKD)]`
    pub fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        let mut sum = [0.0; 2];
        for tree in &self.trees {
            let proba = tree.predict_proba(row);
            sum[0] += proba[0];
            sum[1] += proba[1];
        }
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n]
    }

    /// Most probable class; ties go to class 0
    pub fn predict(&self, row: &[f64]) -> u8 {
        let proba = self.predict_proba(row);
        u8::from(proba[1] > proba[0])
    }

    pub fn predict_many(&self, rows: &[Vec<f64>]) -> Vec<u8> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    /// Mean decrease in impurity per feature, summing to one.
    ///
    /// Trees that never split are left out of the average.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut sum = vec![0.0; self.n_features];
        let mut contributing = 0usize;
        for tree in self.trees.iter().filter(|t| t.n_nodes() > 1) {
            for (s, v) in sum.iter_mut().zip(tree.feature_importances()) {
                *s += v;
            }
            contributing += 1;
        }

        if contributing == 0 {
            return sum;
        }

        let total: f64 = sum.iter().sum();
        if total > 0.0 {
            sum.iter().map(|v| v / total).collect()
        } else {
            sum
        }
    }

    /// Structural check used when loading a persisted forest
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.n_features() != self.n_features || !tree.is_well_formed() {
                return Err(format!("tree {} is malformed", i));
            }
        }
        Ok(())
    }
}
