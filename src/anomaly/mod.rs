//! Anomaly detection module
//!
//! Provides unsupervised outlier detection over the numeric columns of a dataset:
//! - Isolation Forest
//! - Row-level flagging into an `is_anomaly` column

mod isolation_forest;

pub use isolation_forest::{average_path_length, IsolationForest, IsolationTree};

use crate::data::{DataColumn, Dataset};
use crate::error::Result;
use ndarray::{Array1, Array2};
use std::time::Instant;
use tracing::{debug, info};

/// Name of the Boolean column holding anomaly flags
pub const ANOMALY_COLUMN: &str = "is_anomaly";

/// Common interface of unsupervised outlier detectors
pub trait AnomalyDetector {
    /// Check hyperparameters without fitting
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Fit the detector on unlabeled rows
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Anomaly score per row, higher means more anomalous
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// -1 for anomalies, 1 for inliers
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>>;

    /// Score above which a row is an anomaly
    fn threshold(&self) -> f64;
}

/// Numeric matrix over `numeric_cols`, missing cells as 0
pub fn numeric_matrix(dataset: &Dataset, numeric_cols: &[String]) -> Result<Array2<f64>> {
    let columns = numeric_cols
        .iter()
        .map(|name| dataset.require_column(name).map(DataColumn::values))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((dataset.n_rows(), columns.len()), |(row, col)| {
        columns[col].f64_at(row).unwrap_or(0.0)
    }))
}

/// Fit `detector` on `numeric_cols` and attach its verdicts as [`ANOMALY_COLUMN`].
///
/// Detector parameters are checked first. With no numeric columns the dataset is
/// then returned untouched, and with fewer than two rows every row is an inlier.
pub fn flag_anomalies<D: AnomalyDetector>(
    mut dataset: Dataset,
    numeric_cols: &[String],
    detector: &mut D,
) -> Result<Dataset> {
    detector.validate()?;
    if numeric_cols.is_empty() {
        debug!("No numeric columns, skipping anomaly detection");
        return Ok(dataset);
    }

    let start = Instant::now();
    let x = numeric_matrix(&dataset, numeric_cols)?;

    let flags: Vec<Option<bool>> = if x.nrows() < 2 {
        vec![Some(false); x.nrows()]
    } else {
        detector.fit(&x)?;
        detector.predict(&x)?.iter().map(|&label| Some(label == -1)).collect()
    };

    let n_anomalies = flags.iter().filter(|f| **f == Some(true)).count();
    dataset.with_column(DataColumn::boolean(ANOMALY_COLUMN, flags))?;

    info!(
        rows = dataset.n_rows(),
        features = numeric_cols.len(),
        anomalies = n_anomalies,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Anomaly detection complete"
    );

    Ok(dataset)
}

/// Flag anomalous rows with a seeded isolation forest.
///
/// The dataset is taken by value: callers pass their own copy, so a shared
/// canonical dataset can never pick up a flag column.
pub fn detect_anomalies(dataset: Dataset, numeric_cols: &[String], contamination: f64) -> Result<Dataset> {
    let mut detector = IsolationForest::new().with_contamination(contamination);
    flag_anomalies(dataset, numeric_cols, &mut detector)
}
