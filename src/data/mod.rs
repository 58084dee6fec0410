//! Tabular data model
//!
//! Provides the in-memory dataset every analytic component works on:
//! - Typed column storage with explicit missing cells
//! - Semantic column types (numeric / categorical / date)
//! - Loading from CSV and spreadsheet bytes
//! - The cleaning pipeline (name normalization, type inference, de-duplication, imputation)
//! - Descriptive statistics and pivot tables

pub mod cleaning;
pub mod dates;
pub mod loader;
pub mod summary;

pub use cleaning::{normalize_column_name, normalize_column_names, CleaningStats, DataProcessor, ProcessedDataset};
pub use loader::{DataLoader, FileFormat};
pub use summary::{pivot_tables, summary_statistics, ColumnSummary, PivotTable};

use crate::error::{DatalensError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Semantic type of a column as seen by the analytic components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticType {
    Numeric,
    Categorical,
    Date,
}

/// Mutually exclusive lists of column names per semantic type, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTypeSets {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub date: Vec<String>,
}

impl ColumnTypeSets {
    /// Classify every column of a dataset by its current storage
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut sets = Self::default();
        for column in dataset.columns() {
            match column.semantic_type() {
                Some(SemanticType::Numeric) => sets.numeric.push(column.name().to_string()),
                Some(SemanticType::Categorical) => sets.categorical.push(column.name().to_string()),
                Some(SemanticType::Date) => sets.date.push(column.name().to_string()),
                None => {}
            }
        }
        sets
    }

    /// Look up the semantic type of a column
    pub fn type_of(&self, name: &str) -> Option<SemanticType> {
        if self.numeric.iter().any(|c| c == name) {
            Some(SemanticType::Numeric)
        } else if self.categorical.iter().any(|c| c == name) {
            Some(SemanticType::Categorical)
        } else if self.date.iter().any(|c| c == name) {
            Some(SemanticType::Date)
        } else {
            None
        }
    }
}

/// Typed storage for one column; `None` marks a missing cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
    Date(Vec<Option<NaiveDateTime>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Integer(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Boolean(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
            ColumnValues::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of missing cells
    pub fn null_count(&self) -> usize {
        match self {
            ColumnValues::Integer(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Float(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Boolean(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Date(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        matches!(self.value(row), Value::Null)
    }

    /// Semantic type implied by the storage; booleans have none
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            ColumnValues::Integer(_) | ColumnValues::Float(_) => Some(SemanticType::Numeric),
            ColumnValues::Text(_) => Some(SemanticType::Categorical),
            ColumnValues::Date(_) => Some(SemanticType::Date),
            ColumnValues::Boolean(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnValues::Integer(_) | ColumnValues::Float(_))
    }

    /// Short storage name used in logs and profiles
    pub fn dtype_name(&self) -> &'static str {
        match self {
            ColumnValues::Integer(_) => "int64",
            ColumnValues::Float(_) => "float64",
            ColumnValues::Boolean(_) => "bool",
            ColumnValues::Text(_) => "string",
            ColumnValues::Date(_) => "datetime",
        }
    }

    /// Cell at `row` as an owned value (`Value::Null` when missing or out of range)
    pub fn value(&self, row: usize) -> Value {
        match self {
            ColumnValues::Integer(v) => v.get(row).copied().flatten().map_or(Value::Null, Value::Integer),
            ColumnValues::Float(v) => v.get(row).copied().flatten().map_or(Value::Null, Value::Float),
            ColumnValues::Boolean(v) => v.get(row).copied().flatten().map_or(Value::Null, Value::Boolean),
            ColumnValues::Text(v) => v
                .get(row)
                .and_then(|x| x.clone())
                .map_or(Value::Null, Value::Text),
            ColumnValues::Date(v) => v.get(row).copied().flatten().map_or(Value::Null, Value::Date),
        }
    }

    /// Numeric cell as f64 (numeric storage only)
    pub fn f64_at(&self, row: usize) -> Option<f64> {
        match self {
            ColumnValues::Integer(v) => v.get(row).copied().flatten().map(|x| x as f64),
            ColumnValues::Float(v) => v.get(row).copied().flatten(),
            _ => None,
        }
    }

    /// Gather the given rows, in the given order
    pub fn take(&self, rows: &[usize]) -> ColumnValues {
        fn gather<T: Clone>(v: &[Option<T>], rows: &[usize]) -> Vec<Option<T>> {
            rows.iter().map(|&i| v.get(i).cloned().flatten()).collect()
        }
        match self {
            ColumnValues::Integer(v) => ColumnValues::Integer(gather(v, rows)),
            ColumnValues::Float(v) => ColumnValues::Float(gather(v, rows)),
            ColumnValues::Boolean(v) => ColumnValues::Boolean(gather(v, rows)),
            ColumnValues::Text(v) => ColumnValues::Text(gather(v, rows)),
            ColumnValues::Date(v) => ColumnValues::Date(gather(v, rows)),
        }
    }
}

/// A single owned cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Date(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(v) => serde_json::Value::Bool(*v),
            Value::Text(v) => serde_json::Value::String(v.clone()),
            Value::Date(v) => serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataColumn {
    name: String,
    values: ColumnValues,
}

impl DataColumn {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn integer(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self::new(name, ColumnValues::Integer(values))
    }

    /// Float column; non-finite values are stored as missing
    pub fn float(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Self::new(name, ColumnValues::Float(values))
    }

    pub fn boolean(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Self::new(name, ColumnValues::Boolean(values))
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Self::new(
            name,
            ColumnValues::Text(values.into_iter().map(|v| v.map(Into::into)).collect()),
        )
    }

    pub fn date(name: impl Into<String>, values: Vec<Option<NaiveDateTime>>) -> Self {
        Self::new(name, ColumnValues::Date(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ColumnValues {
        &mut self.values
    }

    pub fn into_values(self) -> ColumnValues {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.null_count()
    }

    pub fn semantic_type(&self) -> Option<SemanticType> {
        self.values.semantic_type()
    }
}

/// An ordered sequence of rows over a fixed set of uniquely named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<DataColumn>,
}

impl Dataset {
    /// Build a dataset, checking column lengths and name uniqueness
    pub fn new(columns: Vec<DataColumn>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let n_rows = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
                return Err(DatalensError::ShapeError {
                    expected: format!("{} rows", n_rows),
                    actual: format!("{} rows in column '{}'", bad.len(), bad.name()),
                });
            }
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(DatalensError::DataError(format!(
                    "duplicate column name '{}'",
                    column.name()
                )));
            }
        }

        Ok(Self { columns })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, DataColumn::len)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [DataColumn] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(DataColumn::name).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&DataColumn> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Like [`Dataset::column`] but reports a missing column as an error
    pub fn require_column(&self, name: &str) -> Result<&DataColumn> {
        self.column(name)
            .ok_or_else(|| DatalensError::ColumnNotFound(name.to_string()))
    }

    /// Add a column, replacing any existing column with the same name
    pub fn with_column(&mut self, column: DataColumn) -> Result<&mut Self> {
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(DatalensError::ShapeError {
                expected: format!("{} rows", self.n_rows()),
                actual: format!("{} rows in column '{}'", column.len(), column.name()),
            });
        }

        match self.columns.iter_mut().find(|c| c.name() == column.name()) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }

    pub fn drop_column(&mut self, name: &str) -> Option<DataColumn> {
        let idx = self.columns.iter().position(|c| c.name() == name)?;
        Some(self.columns.remove(idx))
    }

    /// New dataset holding the given rows, in the given order
    pub fn take_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self
                .columns
                .iter()
                .map(|c| DataColumn::new(c.name(), c.values().take(rows)))
                .collect(),
        }
    }

    /// Total number of missing cells across all columns
    pub fn missing_count(&self) -> usize {
        self.columns.iter().map(DataColumn::null_count).sum()
    }

    pub fn row(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.values().value(row)).collect()
    }

    /// Rows as JSON objects keyed by column name
    pub fn records(&self, rows: impl IntoIterator<Item = usize>) -> Vec<serde_json::Value> {
        rows.into_iter()
            .filter(|&r| r < self.n_rows())
            .map(|r| {
                let object: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .map(|c| (c.name().to_string(), c.values().value(r).to_json()))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            DataColumn::integer("id", vec![Some(1), Some(2), None]),
            DataColumn::text("city", vec![Some("Oslo"), None, Some("Rome")]),
            DataColumn::float("price", vec![Some(1.5), Some(f64::NAN), Some(3.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_dataset_shape_and_missing() {
        let ds = sample();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_cols(), 3);
        // NaN is stored as missing
        assert_eq!(ds.missing_count(), 3);
    }

    #[test]
    fn test_dataset_rejects_ragged_columns() {
        let result = Dataset::new(vec![
            DataColumn::integer("a", vec![Some(1)]),
            DataColumn::integer("b", vec![Some(1), Some(2)]),
        ]);
        assert!(matches!(result, Err(DatalensError::ShapeError { .. })));
    }

    #[test]
    fn test_dataset_rejects_duplicate_names() {
        let result = Dataset::new(vec![
            DataColumn::integer("a", vec![Some(1)]),
            DataColumn::integer("a", vec![Some(2)]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_type_sets() {
        let mut ds = sample();
        ds.with_column(DataColumn::boolean("flag", vec![Some(true), None, Some(false)]))
            .unwrap();
        let sets = ColumnTypeSets::from_dataset(&ds);
        assert_eq!(sets.numeric, vec!["id", "price"]);
        assert_eq!(sets.categorical, vec!["city"]);
        assert!(sets.date.is_empty());
        assert_eq!(sets.type_of("flag"), None);
    }

    #[test]
    fn test_take_rows_and_records() {
        let ds = sample();
        let subset = ds.take_rows(&[2, 0]);
        assert_eq!(subset.row(0)[1], Value::Text("Rome".into()));

        let records = ds.records([0]);
        assert_eq!(records[0]["city"], serde_json::json!("Oslo"));
        assert_eq!(records[0]["price"], serde_json::json!(1.5));
    }

    #[test]
    fn test_require_column() {
        let ds = sample();
        assert!(matches!(
            ds.require_column("missing"),
            Err(DatalensError::ColumnNotFound(_))
        ));
    }
}
