//! Cleaning pipeline
//!
//! Steps, in order:
//! 1. Column-name normalization
//! 2. Semantic type inference (text columns that fully parse as dates become date columns)
//! 3. Exact duplicate row removal, first occurrence kept
//! 4. Missing-value imputation (median for numeric, mode for categorical)

use super::dates::parse_date_column;
use super::summary::quantile_sorted;
use super::{ColumnTypeSets, ColumnValues, Dataset};
use crate::error::{DatalensError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

/// Placeholder for categorical columns with no present value at all
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Normalize a single column name.
///
/// Trims, lowercases, turns spaces into underscores and strips anything outside `[A-Za-z0-9_]`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Normalize a full header row, keeping the result unique.
///
/// Collisions get `_1`, `_2`, ... suffixes and names that normalize to nothing
/// become `column_{index}`.
pub fn normalize_column_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(names.len());
    let mut result = Vec::with_capacity(names.len());

    for (idx, name) in names.iter().enumerate() {
        let mut base = normalize_column_name(name.as_ref());
        if base.is_empty() {
            base = format!("column_{}", idx);
        }

        let mut candidate = base.clone();
        let mut suffix = 1;
        while used.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        used.insert(candidate.clone());
        result.push(candidate);
    }

    result
}

/// Counts produced by one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub duplicates_removed: usize,
    pub missing_filled: usize,
}

/// Output of [`DataProcessor::process`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDataset {
    pub dataset: Dataset,
    pub types: ColumnTypeSets,
    pub stats: CleaningStats,
}

impl ProcessedDataset {
    pub fn numeric_columns(&self) -> &[String] {
        &self.types.numeric
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.types.categorical
    }

    pub fn date_columns(&self) -> &[String] {
        &self.types.date
    }
}

/// Runs the cleaning pipeline over a raw dataset
#[derive(Debug, Clone, Default)]
pub struct DataProcessor;

impl DataProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw dataset and infer its column types
    pub fn process(&self, raw: Dataset) -> Result<ProcessedDataset> {
        if raw.n_rows() == 0 {
            return Err(DatalensError::EmptyInput("dataset has no rows".to_string()));
        }

        let start = Instant::now();
        let mut dataset = raw;

        Self::normalize_names(&mut dataset);

        // Type inference runs exactly once, before any mutation that depends on it
        let retyped = Self::infer_types(&mut dataset);
        let types = ColumnTypeSets::from_dataset(&dataset);
        debug!(
            numeric = types.numeric.len(),
            categorical = types.categorical.len(),
            date = types.date.len(),
            retyped_as_date = retyped,
            "Column types inferred"
        );

        let (mut dataset, duplicates_removed) = Self::remove_duplicates(dataset);

        let missing_before = dataset.missing_count();
        Self::impute_missing(&mut dataset);
        let missing_after = dataset.missing_count();

        let stats = CleaningStats {
            duplicates_removed,
            missing_filled: missing_before - missing_after,
        };

        info!(
            rows = dataset.n_rows(),
            columns = dataset.n_cols(),
            duplicates_removed = stats.duplicates_removed,
            missing_filled = stats.missing_filled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset processed"
        );

        Ok(ProcessedDataset {
            dataset,
            types,
            stats,
        })
    }

    fn normalize_names(dataset: &mut Dataset) {
        let names = normalize_column_names(&dataset.column_names());
        for (column, name) in dataset.columns_mut().iter_mut().zip(names) {
            column.rename(name);
        }
    }

    /// Re-type text columns that parse as dates in full; returns how many were re-typed
    fn infer_types(dataset: &mut Dataset) -> usize {
        let mut retyped = 0;
        for column in dataset.columns_mut() {
            let parsed = match column.values() {
                ColumnValues::Text(values) => parse_date_column(values),
                _ => None,
            };
            if let Some(dates) = parsed {
                *column.values_mut() = ColumnValues::Date(dates);
                retyped += 1;
            }
        }
        retyped
    }

    fn remove_duplicates(dataset: Dataset) -> (Dataset, usize) {
        let n_rows = dataset.n_rows();
        let keep: Vec<usize> = {
            let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(n_rows);
            (0..n_rows)
                .filter(|&row| {
                    let key: Vec<CellKey<'_>> = dataset
                        .columns()
                        .iter()
                        .map(|c| CellKey::of(c.values(), row))
                        .collect();
                    seen.insert(key)
                })
                .collect()
        };

        let removed = n_rows - keep.len();
        if removed == 0 {
            return (dataset, 0);
        }
        (dataset.take_rows(&keep), removed)
    }

    fn impute_missing(dataset: &mut Dataset) {
        for column in dataset.columns_mut() {
            if column.null_count() == 0 {
                continue;
            }
            if let Some(filled) = impute_column(column.values()) {
                debug!(column = column.name(), "Imputed missing values");
                *column.values_mut() = filled;
            }
        }
    }
}

/// Fill missing cells of a numeric or categorical column; `None` leaves the column as is
fn impute_column(values: &ColumnValues) -> Option<ColumnValues> {
    match values {
        // An integer column with gaps is float storage, before and after filling
        ColumnValues::Integer(v) => {
            let median = median(v.iter().flatten().map(|&x| x as f64))?;
            Some(ColumnValues::Float(
                v.iter().map(|x| Some(x.map_or(median, |i| i as f64))).collect(),
            ))
        }
        ColumnValues::Float(v) => {
            let median = median(v.iter().flatten().copied())?;
            Some(ColumnValues::Float(
                v.iter().map(|x| Some(x.unwrap_or(median))).collect(),
            ))
        }
        ColumnValues::Text(v) => {
            let fill = mode(v).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
            Some(ColumnValues::Text(
                v.iter()
                    .map(|x| Some(x.clone().unwrap_or_else(|| fill.clone())))
                    .collect(),
            ))
        }
        // Booleans belong to no type set and dates are never imputed
        ColumnValues::Boolean(_) | ColumnValues::Date(_) => None,
    }
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(quantile_sorted(&sorted, 0.5))
}

/// Most frequent present value; ties go to the smallest value
fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        // BTreeMap iterates in ascending order, so only a strictly larger count wins
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Hashable view of one cell for duplicate detection
#[derive(Debug, PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Null,
    Integer(i64),
    Float(u64),
    Boolean(bool),
    Text(&'a str),
    Date(NaiveDateTime),
}

impl<'a> CellKey<'a> {
    fn of(values: &'a ColumnValues, row: usize) -> Self {
        match values {
            ColumnValues::Integer(v) => v[row].map_or(CellKey::Null, CellKey::Integer),
            ColumnValues::Float(v) => v[row].map_or(CellKey::Null, |x| {
                // -0.0 and 0.0 compare equal
                let x = if x == 0.0 { 0.0 } else { x };
                CellKey::Float(x.to_bits())
            }),
            ColumnValues::Boolean(v) => v[row].map_or(CellKey::Null, CellKey::Boolean),
            ColumnValues::Text(v) => v[row].as_deref().map_or(CellKey::Null, CellKey::Text),
            ColumnValues::Date(v) => v[row].map_or(CellKey::Null, CellKey::Date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataColumn, SemanticType, Value};

    fn raw() -> Dataset {
        Dataset::new(vec![
            DataColumn::text(
                "  Order Date ",
                vec![Some("2024-01-01"), Some("2024-01-02"), Some("2024-01-02"), Some("2024-01-03")],
            ),
            DataColumn::float("Sales ($)", vec![Some(10.0), Some(20.0), Some(20.0), None]),
            DataColumn::text("Region", vec![Some("north"), None, None, Some("south")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("  Order Date "), "order_date");
        assert_eq!(normalize_column_name("Sales ($)"), "sales_");
        assert_eq!(normalize_column_name("a-b.c"), "abc");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for name in ["  Mixed Case Name", "x%y", "already_clean", " spaced  out "] {
            let once = normalize_column_name(name);
            assert_eq!(normalize_column_name(&once), once);
        }
        let names = ["A b", "a_b", "", "a b"];
        let once = normalize_column_names(&names);
        assert_eq!(once, vec!["a_b", "a_b_1", "column_2", "a_b_2"]);
        assert_eq!(normalize_column_names(&once), once);
    }

    #[test]
    fn test_process_full_pipeline() {
        let processed = DataProcessor::new().process(raw()).unwrap();
        let ds = &processed.dataset;

        assert_eq!(ds.column_names(), vec!["order_date", "sales_", "region"]);
        assert_eq!(processed.types.type_of("order_date"), Some(SemanticType::Date));
        assert_eq!(processed.types.numeric, vec!["sales_"]);
        assert_eq!(processed.types.categorical, vec!["region"]);

        // rows 1 and 2 are identical, including the missing region
        assert_eq!(processed.stats.duplicates_removed, 1);
        assert_eq!(ds.n_rows(), 3);

        // one missing sale + one missing region remain after dedup
        assert_eq!(processed.stats.missing_filled, 2);
        assert_eq!(ds.missing_count(), 0);
        assert_eq!(ds.column("sales_").unwrap().values().value(2), Value::Float(15.0));
        // tie between north and south resolves to the smaller value
        assert_eq!(ds.column("region").unwrap().values().value(1), Value::Text("north".into()));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let ds = Dataset::new(vec![DataColumn::integer("a", vec![])]).unwrap();
        assert!(matches!(
            DataProcessor::new().process(ds),
            Err(DatalensError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_fully_missing_categorical_becomes_unknown() {
        let ds = Dataset::new(vec![
            DataColumn::integer("id", vec![Some(1), Some(2)]),
            DataColumn::text::<String>("note", vec![None, None]),
        ])
        .unwrap();
        let processed = DataProcessor::new().process(ds).unwrap();
        let note = processed.dataset.column("note").unwrap();
        assert_eq!(note.values().value(0), Value::Text(UNKNOWN_CATEGORY.into()));
        assert_eq!(processed.types.categorical, vec!["note"]);
    }

    #[test]
    fn test_imputed_integer_column_becomes_float() {
        let filled = impute_column(&ColumnValues::Integer(vec![Some(1), Some(2), None])).unwrap();
        assert_eq!(filled, ColumnValues::Float(vec![Some(1.0), Some(2.0), Some(1.5)]));

        let filled = impute_column(&ColumnValues::Integer(vec![Some(1), Some(3), Some(5), None])).unwrap();
        assert_eq!(filled, ColumnValues::Float(vec![Some(1.0), Some(3.0), Some(5.0), Some(3.0)]));
    }

    #[test]
    fn test_complete_integer_column_untouched() {
        let ds = Dataset::new(vec![DataColumn::integer("n", vec![Some(1), Some(2), Some(3)])]).unwrap();
        let processed = DataProcessor::new().process(ds).unwrap();
        assert!(matches!(
            processed.dataset.column("n").unwrap().values(),
            ColumnValues::Integer(_)
        ));
    }

    #[test]
    fn test_partial_date_column_stays_categorical() {
        let ds = Dataset::new(vec![DataColumn::text(
            "when",
            vec![Some("2024-01-01"), Some("soon"), Some("2024-01-03")],
        )])
        .unwrap();
        let processed = DataProcessor::new().process(ds).unwrap();
        assert_eq!(processed.types.categorical, vec!["when"]);
        assert!(processed.types.date.is_empty());
    }

    #[test]
    fn test_mode_prefers_frequency_then_order() {
        let values: Vec<Option<String>> = ["b", "a", "b", "c"].iter().map(|s| Some(s.to_string())).collect();
        assert_eq!(mode(&values), Some("b".to_string()));
        assert_eq!(mode(&[None, None]), None);
    }
}
