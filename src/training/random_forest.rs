//! Bagged ensemble of CART trees
//!
//! Tree `i` draws its bootstrap sample and its split features from a ChaCha8
//! stream seeded with `seed + i`, so fitting in parallel gives the same forest
//! on every run and platform.

use super::decision_tree::{Criterion, DecisionTree};
use crate::error::{DatalensError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How many features each split may look at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`
    Sqrt,
    Fixed(usize),
    All,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        };
        n.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Ensemble {
    /// Labels are class codes `0..n_classes`
    Vote { n_classes: usize },
    Mean,
}

/// Random forest over an encoded feature matrix.
///
/// Classifiers predict class codes as `f64`, regressors predict the mean of the
/// tree outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub max_features: MaxFeatures,
    pub criterion: Criterion,
    pub seed: u64,
    ensemble: Ensemble,
    trees: Vec<DecisionTree>,
    importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    /// Gini trees, `sqrt` features per split
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_features: MaxFeatures::Sqrt,
            criterion: Criterion::Gini,
            seed: 42,
            ensemble: Ensemble::Vote { n_classes: 0 },
            trees: Vec::new(),
            importances: None,
        }
    }

    /// MSE trees, every feature considered at each split
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self {
            max_features: MaxFeatures::All,
            criterion: Criterion::MSE,
            ensemble: Ensemble::Mean,
            ..Self::new_classifier(n_estimators)
        }
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_classification(&self) -> bool {
        matches!(self.ensemble, Ensemble::Vote { .. })
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_rows = x.nrows();
        if n_rows != y.len() {
            return Err(DatalensError::ShapeError {
                expected: format!("{} targets", n_rows),
                actual: format!("{} targets", y.len()),
            });
        }
        if n_rows == 0 {
            return Err(DatalensError::InsufficientData(
                "cannot fit a forest on zero rows".to_string(),
            ));
        }

        if let Ensemble::Vote { n_classes } = &mut self.ensemble {
            *n_classes = y.iter().fold(0.0f64, |m, &v| m.max(v)) as usize + 1;
        }

        let split_features = self.max_features.resolve(x.ncols());
        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| self.grow_tree(x, y, split_features, self.seed.wrapping_add(i as u64)))
            .collect::<Result<Vec<_>>>()?;

        self.importances = Some(mean_importances(&trees, x.ncols()));
        self.trees = trees;
        Ok(self)
    }

    fn grow_tree(&self, x: &Array2<f64>, y: &Array1<f64>, split_features: usize, seed: u64) -> Result<DecisionTree> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n_rows = x.nrows();
        let rows: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();

        let mut tree = match self.ensemble {
            Ensemble::Vote { .. } => DecisionTree::new_classifier(),
            Ensemble::Mean => DecisionTree::new_regressor(),
        }
        .with_max_features(split_features)
        .with_criterion(self.criterion);

        tree.fit_with_rng(&x.select(Axis(0), &rows), &y.select(Axis(0), &rows), &mut rng)?;
        Ok(tree)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(DatalensError::ModelNotFitted);
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let combined = (0..x.nrows()).map(|row| {
            let outputs = per_tree.iter().map(|p| p[row]);
            match self.ensemble {
                Ensemble::Vote { n_classes } => majority(outputs, n_classes),
                Ensemble::Mean => outputs.sum::<f64>() / per_tree.len() as f64,
            }
        });
        Ok(combined.collect())
    }

    /// Mean impurity decrease per feature, summing to 1
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Most voted class code; the smallest code wins a tie
fn majority(votes: impl Iterator<Item = f64>, n_classes: usize) -> f64 {
    let mut counts = vec![0usize; n_classes.max(1)];
    for class in votes {
        if let Some(count) = counts.get_mut(class as usize) {
            *count += 1;
        }
    }
    let mut winner = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[winner] {
            winner = class;
        }
    }
    winner as f64
}

fn mean_importances(trees: &[DecisionTree], n_features: usize) -> Array1<f64> {
    let mut summed = Array1::<f64>::zeros(n_features);
    for importances in trees.iter().filter_map(DecisionTree::feature_importances) {
        summed += importances;
    }
    let total = summed.sum();
    if total > 0.0 {
        summed /= total;
    }
    summed
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_clusters() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [0.2, 0.2], [1.0, 1.0], [1.1, 1.1], [1.2, 1.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut forest = RandomForest::new_classifier(10).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        let correct = forest
            .predict(&x)
            .unwrap()
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| p == a)
            .count();
        assert!(correct >= 5, "{} of 6 correct", correct);
        assert_eq!(forest.n_trees(), 10);
        assert!(forest.is_classification());
    }

    #[test]
    fn test_regressor_tracks_trend() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut forest = RandomForest::new_regressor(10);
        forest.fit(&x, &y).unwrap();

        let mse = (&forest.predict(&x).unwrap() - &y).mapv(|d| d * d).mean().unwrap();
        assert!(mse < 2.0, "mse {}", mse);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let x = array![[1.0, 5.0], [2.0, 3.0], [3.0, 8.0], [4.0, 1.0], [5.0, 7.0], [6.0, 2.0]];
        let y = array![1.5, 2.0, 3.5, 4.0, 5.5, 6.0];

        let mut a = RandomForest::new_regressor(20).with_random_state(7);
        let mut b = RandomForest::new_regressor(20).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_importances_favor_informative_feature() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut forest = RandomForest::new_regressor(10).with_max_features(MaxFeatures::Fixed(2));
        forest.fit(&x, &y).unwrap();

        let importances = forest.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_vote_tie_goes_to_smallest_class() {
        assert_eq!(majority([2.0, 1.0, 1.0, 2.0].into_iter(), 3), 1.0);
        assert_eq!(majority([0.0, 2.0, 2.0].into_iter(), 3), 2.0);
    }

    #[test]
    fn test_shape_mismatch_and_unfitted() {
        let mut forest = RandomForest::new_classifier(5);
        assert!(matches!(
            forest.predict(&array![[1.0]]),
            Err(DatalensError::ModelNotFitted)
        ));
        assert!(matches!(
            forest.fit(&array![[1.0], [2.0]], &array![0.0]),
            Err(DatalensError::ShapeError { .. })
        ));
    }
}
