//! Evaluation metrics for held-out predictions

use serde::{Deserialize, Serialize};
use ndarray::Array1;

/// Metrics for model evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy (classification)
    pub accuracy: Option<f64>,
    /// Mean Squared Error (regression)
    pub mse: Option<f64>,
    /// Mean Absolute Error (regression)
    pub mae: Option<f64>,
    /// R-squared (regression)
    pub r2: Option<f64>,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Fraction of exactly matching class codes
    pub fn compute_classification(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n_samples = y_true.len();
        let accuracy = if n_samples == 0 {
            None
        } else {
            let correct = y_true
                .iter()
                .zip(y_pred.iter())
                .filter(|(t, p)| (*t - *p).abs() < 0.5)
                .count();
            Some(correct as f64 / n_samples as f64)
        };

        Self {
            accuracy,
            n_samples,
            ..Self::default()
        }
    }

    /// MSE, MAE and R² of continuous predictions
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n_samples = y_true.len();
        if n_samples == 0 {
            return Self::default();
        }

        let n = n_samples as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e * e).sum();

        // A constant target has no variance to explain: perfect fit scores 1, anything else 0
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            accuracy: None,
            mse: Some(mse),
            mae: Some(mae),
            r2: Some(r2),
            n_samples,
        }
    }
}
