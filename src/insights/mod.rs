//! Rule-based insight generation
//!
//! Rules run in a fixed order (shape, data quality, correlation, anomalies, trend)
//! and each contributes at most one statement. A rule whose inputs are missing or
//! numerically degenerate is skipped rather than failing the batch.

use crate::anomaly::ANOMALY_COLUMN;
use crate::data::{ColumnValues, Dataset};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Insight rule thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightGenerator {
    /// Absolute Pearson correlation above which a pair counts as strongly correlated
    pub correlation_threshold: f64,
    /// Maximum number of correlated columns named in the statement
    pub max_correlated_columns: usize,
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self {
            correlation_threshold: 0.8,
            max_correlated_columns: 3,
        }
    }
}

impl InsightGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = threshold;
        self
    }

    /// Ordered insight statements for a cleaned dataset
    pub fn generate(&self, dataset: &Dataset, numeric_cols: &[String], date_cols: &[String]) -> Vec<String> {
        let mut insights = vec![format!(
            "Dataset Shape: {} rows, {} columns.",
            dataset.n_rows(),
            dataset.n_cols()
        )];

        let missing = dataset.missing_count();
        if missing > 0 {
            insights.push(format!("Data quality: {} missing values remaining.", missing));
        }

        insights.extend(self.correlation_insight(dataset, numeric_cols));
        insights.extend(anomaly_insight(dataset));
        insights.extend(trend_insight(dataset, numeric_cols, date_cols));

        debug!(count = insights.len(), "Insights generated");
        insights
    }

    fn correlation_insight(&self, dataset: &Dataset, numeric_cols: &[String]) -> Option<String> {
        let columns: Vec<(&str, &ColumnValues)> = numeric_cols
            .iter()
            .filter_map(|name| dataset.column(name).map(|c| (c.name(), c.values())))
            .filter(|(_, values)| values.is_numeric())
            .collect();

        if columns.len() < 2 {
            debug!(numeric = columns.len(), "Correlation rule skipped");
            return None;
        }

        // Column j is flagged by any earlier column i over the upper triangle
        let flagged: Vec<&str> = (1..columns.len())
            .filter(|&j| {
                (0..j).any(|i| {
                    pearson(columns[i].1, columns[j].1)
                        .map_or(false, |r| r.abs() > self.correlation_threshold)
                })
            })
            .map(|j| columns[j].0)
            .take(self.max_correlated_columns)
            .collect();

        if flagged.is_empty() {
            return None;
        }

        Some(format!(
            "High correlations: {} are strongly correlated with other variables.",
            flagged.join(", ")
        ))
    }
}

/// Insights with the default thresholds
pub fn generate_insights(dataset: &Dataset, numeric_cols: &[String], date_cols: &[String]) -> Vec<String> {
    InsightGenerator::default().generate(dataset, numeric_cols, date_cols)
}

/// Pearson correlation over rows where both values are present
pub fn pearson(a: &ColumnValues, b: &ColumnValues) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = (0..a.len().min(b.len()))
        .filter_map(|row| Some((a.f64_at(row)?, b.f64_at(row)?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(cov / denom)
}

fn anomaly_insight(dataset: &Dataset) -> Option<String> {
    let ColumnValues::Boolean(flags) = dataset.column(ANOMALY_COLUMN)?.values() else {
        debug!("Anomaly column is not boolean, rule skipped");
        return None;
    };

    let count = flags.iter().filter(|f| **f == Some(true)).count();
    if count == 0 || dataset.n_rows() == 0 {
        return None;
    }

    let pct = count as f64 / dataset.n_rows() as f64 * 100.0;
    Some(format!("Anomaly Alert: {} anomalies detected ({:.1}%).", count, pct))
}

fn trend_insight(dataset: &Dataset, numeric_cols: &[String], date_cols: &[String]) -> Option<String> {
    let (Some(date_col), Some(value_col)) = (date_cols.first(), numeric_cols.first()) else {
        return None;
    };

    let ColumnValues::Date(dates) = dataset.column(date_col)?.values() else {
        debug!(column = %date_col, "Trend rule skipped, not a date column");
        return None;
    };
    let values = dataset.column(value_col)?.values();

    // Stable sort, missing dates last
    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by(|&a, &b| match (dates[a], dates[b]) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let first = values.f64_at(*order.first()?)?;
    let last = values.f64_at(*order.last()?)?;
    if first == 0.0 {
        debug!(column = %value_col, "Trend rule skipped, first value is zero");
        return None;
    }

    let change = (last - first) / first.abs();
    let direction = if change > 0.0 { "increased" } else { "decreased" };
    Some(format!(
        "Trend: {} {} by {:.1}% over the time period.",
        value_col,
        direction,
        change.abs() * 100.0
    ))
}
