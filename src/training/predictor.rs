//! Automated supervised predictor
//!
//! Given a target column, the predictor encodes the remaining columns, decides
//! between classification and regression, trains a random forest on a seeded
//! 80/20 split and reports held-out metrics.

use super::features::{FeatureEncoder, LabelEncoder};
use super::metrics::ModelMetrics;
use super::random_forest::RandomForest;
use super::split::TrainTestSplit;
use crate::data::{ColumnValues, Dataset, Value};
use crate::error::{DatalensError, Result};
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Supervised task type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    Classification,
    Regression,
}

impl TaskType {
    /// Decide the task from the target's storage.
    ///
    /// Text and date targets are classification. Integer targets with fewer than
    /// `max_classes` distinct values are classification too. Every other target is
    /// regression, including floats and booleans (fitted as 0/1).
    pub fn detect(values: &ColumnValues, max_classes: usize) -> Self {
        match values {
            ColumnValues::Integer(v) => {
                let distinct: HashSet<i64> = v.iter().flatten().copied().collect();
                if distinct.len() < max_classes {
                    TaskType::Classification
                } else {
                    TaskType::Regression
                }
            }
            ColumnValues::Float(_) | ColumnValues::Boolean(_) => TaskType::Regression,
            ColumnValues::Text(_) | ColumnValues::Date(_) => TaskType::Classification,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Classification => write!(f, "Classification"),
            TaskType::Regression => write!(f, "Regression"),
        }
    }
}

/// Held-out evaluation of a trained predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorMetrics {
    #[serde(rename = "type")]
    pub task: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r2_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub training_time_secs: f64,
}

/// A fitted model together with the exact encoding it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedPredictor {
    target: String,
    task: TaskType,
    encoder: FeatureEncoder,
    labels: Option<LabelEncoder>,
    model: RandomForest,
}

impl TrainedPredictor {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Class labels, in code order (classification only)
    pub fn classes(&self) -> Option<&[String]> {
        self.labels.as_ref().map(LabelEncoder::classes)
    }

    /// Predict one value per row by replaying the training-time encoding
    pub fn predict(&self, dataset: &Dataset) -> Result<Vec<Value>> {
        let x = self.encoder.transform(dataset)?;
        let raw = self.model.predict(&x)?;

        match &self.labels {
            Some(labels) => Ok(labels
                .inverse_transform(&raw)?
                .into_iter()
                .map(Value::Text)
                .collect()),
            None => Ok(raw.iter().copied().map(Value::Float).collect()),
        }
    }

    /// Feature importances, most important first
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.model.feature_importances() else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = self
            .encoder
            .feature_names()
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// AutoML predictor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoMLPredictor {
    pub n_estimators: usize,
    pub random_seed: u64,
    pub test_size: f64,
    /// Integer targets with fewer distinct values than this are treated as classes
    pub max_classes: usize,
}

impl Default for AutoMLPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoMLPredictor {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            random_seed: 42,
            test_size: 0.2,
            max_classes: 10,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_max_classes(mut self, max_classes: usize) -> Self {
        self.max_classes = max_classes;
        self
    }

    /// Train on `dataset` to predict `target`
    pub fn train(&self, dataset: &Dataset, target: &str) -> Result<(TrainedPredictor, PredictorMetrics)> {
        let start = Instant::now();
        let target_values = dataset.require_column(target)?.values();

        let present: Vec<usize> = (0..dataset.n_rows())
            .filter(|&row| !target_values.is_null(row))
            .collect();
        if present.is_empty() {
            return Err(DatalensError::InsufficientData(format!(
                "target '{}' has no values",
                target
            )));
        }

        let data = if present.len() == dataset.n_rows() {
            dataset.clone()
        } else {
            debug!(dropped = dataset.n_rows() - present.len(), "Dropped rows with missing target");
            dataset.take_rows(&present)
        };
        let target_values = data.require_column(target)?.values();

        let task = TaskType::detect(target_values, self.max_classes);

        let encoder = FeatureEncoder::fit(&data, &[target])?;
        if encoder.n_features() == 0 {
            return Err(DatalensError::InsufficientData(
                "no feature columns besides the target".to_string(),
            ));
        }
        let x = encoder.transform(&data)?;

        let (labels, y) = match task {
            TaskType::Classification => {
                let labels = LabelEncoder::fit(target_values);
                let y = labels.transform(target_values)?;
                (Some(labels), y)
            }
            TaskType::Regression => {
                let y: Array1<f64> = match target_values {
                    ColumnValues::Boolean(v) => v.iter().map(|b| if *b == Some(true) { 1.0 } else { 0.0 }).collect(),
                    _ => (0..data.n_rows())
                        .map(|row| target_values.f64_at(row).unwrap_or(0.0))
                        .collect(),
                };
                (None, y)
            }
        };

        let split = TrainTestSplit::new(data.n_rows(), self.test_size, self.random_seed)?;
        let x_train = x.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = match task {
            TaskType::Classification => RandomForest::new_classifier(self.n_estimators),
            TaskType::Regression => RandomForest::new_regressor(self.n_estimators),
        }
        .with_random_state(self.random_seed);
        model.fit(&x_train, &y_train)?;

        let predictions = model.predict(&x_test)?;
        let evaluation = match task {
            TaskType::Classification => ModelMetrics::compute_classification(&y_test, &predictions),
            TaskType::Regression => ModelMetrics::compute_regression(&y_test, &predictions),
        };

        let metrics = PredictorMetrics {
            task,
            accuracy: evaluation.accuracy,
            r2_score: evaluation.r2,
            mae: evaluation.mae,
            n_train: split.train_indices.len(),
            n_test: split.test_indices.len(),
            n_features: encoder.n_features(),
            training_time_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            target = %target,
            task = %task,
            n_train = metrics.n_train,
            n_test = metrics.n_test,
            n_features = metrics.n_features,
            elapsed_secs = metrics.training_time_secs,
            "Predictor trained"
        );

        let trained = TrainedPredictor {
            target: target.to_string(),
            task,
            encoder,
            labels,
            model,
        };

        Ok((trained, metrics))
    }
}
