//! Descriptive statistics and pivot tables
//!
//! These are best-effort secondary aggregations: a pivot that cannot be built is
//! left out of the result instead of failing the whole batch.

use super::{ColumnTypeSets, ColumnValues, Dataset};
use crate::error::{DatalensError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Categorical pivots are only built for the first few categorical columns
const MAX_CATEGORICAL_PIVOTS: usize = 3;
/// Categorical columns with more distinct values than this are not pivoted
const MAX_PIVOT_CATEGORIES: usize = 50;

/// Quantile of already sorted data, linear interpolation between closest ranks
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Descriptive statistics for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub median: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    fn from_values(column: &str, values: &ColumnValues) -> Self {
        let mut present: Vec<f64> = (0..values.len()).filter_map(|i| values.f64_at(i)).collect();
        present.sort_by(|a, b| a.total_cmp(b));

        let count = present.len();
        if count == 0 {
            return Self {
                column: column.to_string(),
                count,
                mean: None,
                std: None,
                min: None,
                q25: None,
                median: None,
                q75: None,
                max: None,
            };
        }

        let mean = present.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let ss: f64 = present.iter().map(|x| (x - mean).powi(2)).sum();
            Some((ss / (count - 1) as f64).sqrt())
        } else {
            None
        };

        Self {
            column: column.to_string(),
            count,
            mean: Some(mean),
            std,
            min: present.first().copied(),
            q25: Some(quantile_sorted(&present, 0.25)),
            median: Some(quantile_sorted(&present, 0.5)),
            q75: Some(quantile_sorted(&present, 0.75)),
            max: present.last().copied(),
        }
    }
}

/// Per-column count, mean, std, min, quartiles and max for the given numeric columns.
///
/// Columns that are absent or not numeric are skipped.
pub fn summary_statistics(dataset: &Dataset, numeric_cols: &[String]) -> Vec<ColumnSummary> {
    numeric_cols
        .iter()
        .filter_map(|name| dataset.column(name))
        .filter(|column| column.values().is_numeric())
        .map(|column| ColumnSummary::from_values(column.name(), column.values()))
        .collect()
}

/// One grouped row of a pivot table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub key: String,
    /// Sums aligned with [`PivotTable::value_columns`]
    pub sums: Vec<f64>,
}

/// Sums of the numeric columns grouped by one index column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    /// `{column}_summary` for categorical pivots, `{column}_trend` for date pivots
    pub name: String,
    pub index_column: String,
    pub value_columns: Vec<String>,
    pub rows: Vec<PivotRow>,
}

/// Build the standard set of pivot tables for a cleaned dataset
pub fn pivot_tables(dataset: &Dataset, types: &ColumnTypeSets) -> Vec<PivotTable> {
    let mut pivots = Vec::new();

    for column in types.categorical.iter().take(MAX_CATEGORICAL_PIVOTS) {
        match categorical_pivot(dataset, column, &types.numeric) {
            Ok(Some(pivot)) => pivots.push(pivot),
            Ok(None) => debug!(column = %column, "Too many categories, pivot skipped"),
            Err(e) => debug!(column = %column, error = %e, "Pivot omitted"),
        }
    }

    for column in &types.date {
        match date_pivot(dataset, column, &types.numeric) {
            Ok(pivot) => pivots.push(pivot),
            Err(e) => debug!(column = %column, error = %e, "Pivot omitted"),
        }
    }

    pivots
}

fn value_columns<'a>(dataset: &'a Dataset, numeric_cols: &[String]) -> Result<Vec<(&'a str, &'a ColumnValues)>> {
    let columns: Vec<_> = numeric_cols
        .iter()
        .filter_map(|name| dataset.column(name))
        .filter(|c| c.values().is_numeric())
        .map(|c| (c.name(), c.values()))
        .collect();
    if columns.is_empty() {
        return Err(DatalensError::InsufficientData(
            "no numeric columns to aggregate".to_string(),
        ));
    }
    Ok(columns)
}

fn grouped_sums<K: Ord>(
    keys: impl Iterator<Item = (usize, K)>,
    values: &[(&str, &ColumnValues)],
) -> BTreeMap<K, Vec<f64>> {
    let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for (row, key) in keys {
        let sums = groups.entry(key).or_insert_with(|| vec![0.0; values.len()]);
        for (sum, (_, column)) in sums.iter_mut().zip(values) {
            *sum += column.f64_at(row).unwrap_or(0.0);
        }
    }
    groups
}

fn categorical_pivot(dataset: &Dataset, column: &str, numeric_cols: &[String]) -> Result<Option<PivotTable>> {
    let index = dataset.require_column(column)?;
    let labels = match index.values() {
        ColumnValues::Text(v) => v,
        other => {
            return Err(DatalensError::InvalidInput(format!(
                "'{}' is {} and cannot index a categorical pivot",
                column,
                other.dtype_name()
            )))
        }
    };

    let distinct: HashSet<&str> = labels.iter().flatten().map(String::as_str).collect();
    if distinct.len() > MAX_PIVOT_CATEGORIES {
        return Ok(None);
    }

    let values = value_columns(dataset, numeric_cols)?;
    let keys = labels
        .iter()
        .enumerate()
        .filter_map(|(row, label)| label.as_deref().map(|l| (row, l)));
    let groups = grouped_sums(keys, &values);

    Ok(Some(PivotTable {
        name: format!("{}_summary", column),
        index_column: column.to_string(),
        value_columns: values.iter().map(|(name, _)| name.to_string()).collect(),
        rows: groups
            .into_iter()
            .map(|(key, sums)| PivotRow {
                key: key.to_string(),
                sums,
            })
            .collect(),
    }))
}

fn date_pivot(dataset: &Dataset, column: &str, numeric_cols: &[String]) -> Result<PivotTable> {
    let index = dataset.require_column(column)?;
    let dates: &[Option<NaiveDateTime>] = match index.values() {
        ColumnValues::Date(v) => v,
        other => {
            return Err(DatalensError::InvalidInput(format!(
                "'{}' is {} and cannot index a date pivot",
                column,
                other.dtype_name()
            )))
        }
    };

    let values = value_columns(dataset, numeric_cols)?;
    let keys = dates
        .iter()
        .enumerate()
        .filter_map(|(row, date)| date.map(|d| (row, d)));
    let groups = grouped_sums(keys, &values);

    Ok(PivotTable {
        name: format!("{}_trend", column),
        index_column: column.to_string(),
        value_columns: values.iter().map(|(name, _)| name.to_string()).collect(),
        rows: groups
            .into_iter()
            .map(|(key, sums)| PivotRow {
                key: key.format("%Y-%m-%d %H:%M:%S").to_string(),
                sums,
            })
            .collect(),
    })
}
