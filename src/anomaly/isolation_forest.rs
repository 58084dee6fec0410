//! Isolation Forest anomaly detection

use crate::anomaly::AnomalyDetector;
use crate::data::summary::quantile_sorted;
use crate::error::{DatalensError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.5772156649;

/// Isolation Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left subtree (values < threshold)
        left: Box<IsolationTree>,
        /// Right subtree (values >= threshold)
        right: Box<IsolationTree>,
    },
    /// External (leaf) node
    External {
        /// Number of samples in this node
        size: usize,
    },
}

impl IsolationTree {
    /// Build an isolation tree over the rows in `indices`
    pub fn build(x: &Array2<f64>, indices: &[usize], height: usize, max_height: usize, rng: &mut impl Rng) -> Self {
        let n_samples = indices.len();

        if height >= max_height || n_samples <= 1 || x.ncols() == 0 {
            return IsolationTree::External { size: n_samples };
        }

        let feature = rng.gen_range(0..x.ncols());

        let (min_val, max_val) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = x[[i, feature]];
            (lo.min(v), hi.max(v))
        });

        // Constant on this feature
        if max_val - min_val <= 1e-10 {
            return IsolationTree::External { size: n_samples };
        }

        let threshold = rng.gen_range(min_val..max_val);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let left = Box::new(Self::build(x, &left_indices, height + 1, max_height, rng));
        let right = Box::new(Self::build(x, &right_indices, height + 1, max_height, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Depth at which `sample` is isolated, adjusted for unsplit leaves
    pub fn path_length(&self, sample: ArrayView1<f64>, current_height: usize) -> f64 {
        match self {
            IsolationTree::External { size } => current_height as f64 + average_path_length(*size),
            IsolationTree::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, current_height + 1)
                } else {
                    right.path_length(sample, current_height + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful search in a binary search tree of `n` nodes
///
/// c(n) = 2 H(n-1) - 2(n-1)/n, with H(i) ~ ln(i) + Euler's constant
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n_f = n as f64;
            2.0 * ((n_f - 1.0).ln() + EULER_GAMMA) - 2.0 * (n_f - 1.0) / n_f
        }
    }
}

/// Isolation Forest anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees
    n_estimators: usize,
    /// Maximum samples per tree
    max_samples: usize,
    /// Expected proportion of outliers
    contamination: f64,
    seed: u64,
    trees: Option<Vec<IsolationTree>>,
    /// Decision threshold on the anomaly score
    threshold: Option<f64>,
    /// Rows each tree was grown on
    n_samples: Option<usize>,
    n_features: Option<usize>,
}

impl IsolationForest {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
            trees: None,
            threshold: None,
            n_samples: None,
            n_features: None,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n.max(1);
        self
    }

    /// Set contamination ratio; checked against [0, 0.5] when fitting
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Anomaly score per row in (0, 1], higher means more anomalous
    fn compute_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let trees = self.trees.as_ref().ok_or(DatalensError::ModelNotFitted)?;

        if let Some(expected) = self.n_features {
            if x.ncols() != expected {
                return Err(DatalensError::ShapeError {
                    expected: format!("{} features", expected),
                    actual: format!("{} features", x.ncols()),
                });
            }
        }

        let c_n = average_path_length(self.n_samples.unwrap_or(self.max_samples));

        let scores = x.rows().into_iter().map(|row| {
            let avg_path_length: f64 =
                trees.iter().map(|tree| tree.path_length(row, 0)).sum::<f64>() / trees.len() as f64;

            // s(x, n) = 2^(-E[h(x)] / c(n))
            if c_n > 0.0 {
                2.0_f64.powf(-avg_path_length / c_n)
            } else {
                0.5
            }
        });

        Ok(Array1::from_iter(scores))
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    fn validate(&self) -> Result<()> {
        if !(0.0..=0.5).contains(&self.contamination) {
            return Err(DatalensError::InvalidParameter {
                name: "contamination".to_string(),
                value: self.contamination.to_string(),
                reason: "must be within [0, 0.5]".to_string(),
            });
        }
        Ok(())
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.validate()?;

        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(DatalensError::InsufficientData("cannot fit on zero rows".to_string()));
        }

        let samples_per_tree = self.max_samples.min(n_samples);
        let max_height = (samples_per_tree as f64).log2().ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let trees: Vec<IsolationTree> = (0..self.n_estimators)
            .map(|_| {
                // Subsample without replacement
                let indices = index::sample(&mut rng, n_samples, samples_per_tree).into_vec();
                IsolationTree::build(x, &indices, 0, max_height, &mut rng)
            })
            .collect();

        self.trees = Some(trees);
        self.n_samples = Some(samples_per_tree);
        self.n_features = Some(x.ncols());

        let mut sorted_scores = self.compute_scores(x)?.to_vec();
        sorted_scores.sort_by(|a, b| a.total_cmp(b));
        self.threshold = Some(quantile_sorted(&sorted_scores, 1.0 - self.contamination));

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.compute_scores(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let threshold = self.threshold.ok_or(DatalensError::ModelNotFitted)?;
        let scores = self.score_samples(x)?;
        Ok(scores.mapv(|s| if s > threshold { -1 } else { 1 }))
    }

    fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_with_outliers() -> Array2<f64> {
        let mut data = Vec::new();
        for i in 0..50 {
            data.push((i % 10) as f64);
            data.push(((i % 10) + 1) as f64);
        }
        data.extend_from_slice(&[100.0, 100.0]);
        data.extend_from_slice(&[-50.0, -50.0]);
        Array2::from_shape_vec((52, 2), data).unwrap()
    }

    #[test]
    fn test_isolation_forest_basic() {
        let x = clustered_with_outliers();

        let mut iforest = IsolationForest::new()
            .with_n_estimators(50)
            .with_contamination(0.05)
            .with_seed(42);

        iforest.fit(&x).unwrap();

        let scores = iforest.score_samples(&x).unwrap();
        let labels = iforest.predict(&x).unwrap();

        assert!(scores[50] > scores[0]);
        assert!(scores[51] > scores[0]);
        assert_eq!(labels[50], -1);
        assert_eq!(labels[51], -1);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let x = clustered_with_outliers();
        let mut a = IsolationForest::new().with_n_estimators(20).with_seed(7);
        let mut b = IsolationForest::new().with_n_estimators(20).with_seed(7);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();
        assert_eq!(a.score_samples(&x).unwrap(), b.score_samples(&x).unwrap());
    }

    #[test]
    fn test_zero_contamination_flags_nothing() {
        let x = clustered_with_outliers();
        let mut iforest = IsolationForest::new().with_n_estimators(20).with_contamination(0.0);
        iforest.fit(&x).unwrap();
        assert!(iforest.predict(&x).unwrap().iter().all(|&l| l == 1));
    }

    #[test]
    fn test_invalid_contamination() {
        let x = clustered_with_outliers();
        let mut iforest = IsolationForest::new().with_contamination(0.7);
        assert!(matches!(iforest.fit(&x), Err(DatalensError::InvalidParameter { .. })));
    }

    #[test]
    fn test_predict_before_fit() {
        let iforest = IsolationForest::new();
        assert!(matches!(
            iforest.predict(&Array2::zeros((2, 2))),
            Err(DatalensError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.2448).abs() < 1e-3);
    }

    #[test]
    fn test_isolation_tree_path_length() {
        let x = Array2::from_shape_fn((10, 2), |(i, _)| (i + 1) as f64);
        let indices: Vec<usize> = (0..10).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let tree = IsolationTree::build(&x, &indices, 0, 10, &mut rng);

        let sample = ndarray::array![5.0, 5.0];
        assert!(tree.path_length(sample.view(), 0) > 0.0);
    }
}
