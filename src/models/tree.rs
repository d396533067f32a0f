//! CART decision tree for binary classification

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Node of a fitted tree, stored in a flat arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Samples with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class distribution `[p(0), p(1)]` of the training samples reaching it
    Leaf { proba: [f64; 2], samples: usize },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Candidate features examined per split
    pub max_features: usize,
}

/// Fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Total weighted Gini decrease attributed to each feature
    impurity_decrease: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity_left: f64,
    impurity_right: f64,
}

fn class_counts(y: &[u8], samples: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &s in samples {
        counts[y[s] as usize] += 1;
    }
    counts
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

impl DecisionTree {
    /// Grow a tree on the given sample indices (duplicates allowed)
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        samples: &[usize],
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut tree = Self {
            nodes: Vec::new(),
            impurity_decrease: vec![0.0; n_features],
        };
        let mut samples = samples.to_vec();
        tree.grow(x, y, &mut samples, 0, params, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[u8],
        samples: &mut [usize],
        depth: usize,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let counts = class_counts(y, samples);
        let n = samples.len();
        let impurity = gini(counts);

        let node_index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            proba: [
                counts[0] as f64 / n.max(1) as f64,
                counts[1] as f64 / n.max(1) as f64,
            ],
            samples: n,
        });

        if depth >= params.max_depth || n < params.min_samples_split || impurity <= 0.0 {
            return node_index;
        }

        let Some(split) = self.best_split(x, y, samples, impurity, params.max_features, rng)
        else {
            return node_index;
        };

        // Partition in place: left block first
        let mut mid = 0;
        for i in 0..samples.len() {
            if x[samples[i]][split.feature] <= split.threshold {
                samples.swap(i, mid);
                mid += 1;
            }
        }

        let n_left = mid as f64;
        let n_right = (n - mid) as f64;
        self.impurity_decrease[split.feature] += n as f64 * impurity
            - n_left * split.impurity_left
            - n_right * split.impurity_right;

        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(x, y, left_samples, depth + 1, params, rng);
        let right = self.grow(x, y, right_samples, depth + 1, params, rng);

        self.nodes[node_index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };

        node_index
    }

    /// Search a random subset of features for the lowest weighted Gini split.
    ///
    /// Constant features do not count towards `max_features`.
    fn best_split(
        &self,
        x: &[Vec<f64>],
        y: &[u8],
        samples: &[usize],
        parent_impurity: f64,
        max_features: usize,
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let n = samples.len();
        let total = class_counts(y, samples);

        let mut features: Vec<usize> = (0..self.impurity_decrease.len()).collect();
        features.shuffle(rng);

        let mut best: Option<BestSplit> = None;
        let mut best_score = parent_impurity;
        let mut visited = 0;

        let mut column: Vec<(f64, u8)> = Vec::with_capacity(n);
        for feature in features {
            if visited >= max_features {
                break;
            }

            column.clear();
            column.extend(samples.iter().map(|&s| (x[s][feature], y[s])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            if column[0].0 == column[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left = [0usize; 2];
            for i in 0..n - 1 {
                left[column[i].1 as usize] += 1;
                if column[i].0 == column[i + 1].0 {
                    continue;
                }

                let right = [total[0] - left[0], total[1] - left[1]];
                let n_left = (i + 1) as f64;
                let n_right = (n - i - 1) as f64;
                let impurity_left = gini(left);
                let impurity_right = gini(right);
                let score = (n_left * impurity_left + n_right * impurity_right) / n as f64;

                if score < best_score {
                    let mut threshold = (column[i].0 + column[i + 1].0) / 2.0;
                    if threshold >= column[i + 1].0 {
                        threshold = column[i].0;
                    }
                    best_score = score;
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity_left,
                        impurity_right,
                    });
                }
            }
        }

        best
    }

    /// Class distribution of the leaf `row` falls into
    pub fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { proba, .. } => return *proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_features(&self) -> usize {
        self.impurity_decrease.len()
    }

    /// Depth of the deepest leaf (root only = 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Impurity decrease per feature, normalized to sum to one.
    ///
    /// A tree that never split returns all zeros.
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total > 0.0 {
            self.impurity_decrease.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.impurity_decrease.len()]
        }
    }

    /// Nodes are in preorder: every child index is past its parent and
    /// inside the arena, so prediction always reaches a leaf
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(index, node)| match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < self.impurity_decrease.len()
                        && threshold.is_finite()
                        && (index + 1..self.nodes.len()).contains(left)
                        && (index + 1..self.nodes.len()).contains(right)
                }
                Node::Leaf { proba, .. } => proba.iter().all(|p| (0.0..=1.0).contains(p)),
            })
    }
}
