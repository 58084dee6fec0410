//! Feature and label encoding for the predictor
//!
//! The encoder captures the full transformation recipe at fit time so it can be
//! replayed on new rows without re-deriving categories from different data.

use crate::data::{ColumnValues, Dataset, Value};
use crate::error::{DatalensError, Result};
use chrono::Datelike;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How one source column turns into model features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureRecipe {
    /// Numeric value as is, missing as 0
    Numeric { column: String },
    /// 0/1 indicator
    Boolean { column: String },
    /// Year, month and day parts
    DateParts { column: String },
    /// One indicator per category after the dropped reference category
    OneHot {
        column: String,
        reference: String,
        categories: Vec<String>,
    },
}

impl FeatureRecipe {
    fn column(&self) -> &str {
        match self {
            FeatureRecipe::Numeric { column }
            | FeatureRecipe::Boolean { column }
            | FeatureRecipe::DateParts { column }
            | FeatureRecipe::OneHot { column, .. } => column,
        }
    }

    fn output_names(&self) -> Vec<String> {
        match self {
            FeatureRecipe::Numeric { column } | FeatureRecipe::Boolean { column } => vec![column.clone()],
            FeatureRecipe::DateParts { column } => vec![
                format!("{}_year", column),
                format!("{}_month", column),
                format!("{}_day", column),
            ],
            FeatureRecipe::OneHot { column, categories, .. } => categories
                .iter()
                .map(|category| format!("{}_{}", column, category))
                .collect(),
        }
    }
}

/// Replayable mapping from dataset columns to a numeric feature matrix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    recipes: Vec<FeatureRecipe>,
    feature_names: Vec<String>,
}

impl FeatureEncoder {
    /// Derive the recipe from every column except `exclude`
    pub fn fit(dataset: &Dataset, exclude: &[&str]) -> Result<Self> {
        let recipes: Vec<FeatureRecipe> = dataset
            .columns()
            .iter()
            .filter(|c| !exclude.contains(&c.name()))
            .filter_map(|column| {
                let name = column.name().to_string();
                match column.values() {
                    ColumnValues::Integer(_) | ColumnValues::Float(_) => Some(FeatureRecipe::Numeric { column: name }),
                    ColumnValues::Boolean(_) => Some(FeatureRecipe::Boolean { column: name }),
                    ColumnValues::Date(_) => Some(FeatureRecipe::DateParts { column: name }),
                    ColumnValues::Text(values) => {
                        let distinct: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
                        let mut sorted = distinct.into_iter().map(str::to_string);
                        // A column with no present value contributes nothing
                        let reference = sorted.next()?;
                        Some(FeatureRecipe::OneHot {
                            column: name,
                            reference,
                            categories: sorted.collect(),
                        })
                    }
                }
            })
            .collect();

        let feature_names = recipes.iter().flat_map(FeatureRecipe::output_names).collect();

        Ok(Self {
            recipes,
            feature_names,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Source columns the recipe reads, in order
    pub fn source_columns(&self) -> Vec<&str> {
        self.recipes.iter().map(FeatureRecipe::column).collect()
    }

    /// Apply the recipe to a dataset with the same source columns
    pub fn transform(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        let n_rows = dataset.n_rows();
        let mut matrix = Array2::<f64>::zeros((n_rows, self.n_features()));
        let mut offset = 0;

        for recipe in &self.recipes {
            let values = dataset.require_column(recipe.column())?.values();

            match recipe {
                FeatureRecipe::Numeric { column } => {
                    if !values.is_numeric() {
                        return Err(type_mismatch(column, "numeric", values));
                    }
                    for row in 0..n_rows {
                        matrix[[row, offset]] = values.f64_at(row).unwrap_or(0.0);
                    }
                    offset += 1;
                }
                FeatureRecipe::Boolean { column } => {
                    let ColumnValues::Boolean(flags) = values else {
                        return Err(type_mismatch(column, "boolean", values));
                    };
                    for (row, flag) in flags.iter().enumerate() {
                        if *flag == Some(true) {
                            matrix[[row, offset]] = 1.0;
                        }
                    }
                    offset += 1;
                }
                FeatureRecipe::DateParts { column } => {
                    let ColumnValues::Date(dates) = values else {
                        return Err(type_mismatch(column, "date", values));
                    };
                    for (row, date) in dates.iter().enumerate() {
                        if let Some(date) = date {
                            matrix[[row, offset]] = date.year() as f64;
                            matrix[[row, offset + 1]] = date.month() as f64;
                            matrix[[row, offset + 2]] = date.day() as f64;
                        }
                    }
                    offset += 3;
                }
                FeatureRecipe::OneHot { column, categories, .. } => {
                    let ColumnValues::Text(labels) = values else {
                        return Err(type_mismatch(column, "text", values));
                    };
                    for (row, label) in labels.iter().enumerate() {
                        // Reference, unseen and missing categories stay all-zero
                        let position = label
                            .as_deref()
                            .and_then(|l| categories.binary_search_by(|c| c.as_str().cmp(l)).ok());
                        if let Some(pos) = position {
                            matrix[[row, offset + pos]] = 1.0;
                        }
                    }
                    offset += categories.len();
                }
            }
        }

        Ok(matrix)
    }
}

fn type_mismatch(column: &str, expected: &str, values: &ColumnValues) -> DatalensError {
    DatalensError::InvalidInput(format!(
        "column '{}' was encoded as {} but holds {}",
        column,
        expected,
        values.dtype_name()
    ))
}

/// Maps target labels to contiguous class codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the sorted set of labels; missing cells are ignored
    pub fn fit(values: &ColumnValues) -> Self {
        let classes: BTreeSet<String> = (0..values.len())
            .map(|row| values.value(row))
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    fn encode_value(&self, value: &Value) -> Result<f64> {
        if value.is_null() {
            return Err(DatalensError::InvalidInput("cannot encode a missing label".to_string()));
        }
        let label = value.to_string();
        self.classes
            .binary_search(&label)
            .map(|code| code as f64)
            .map_err(|_| DatalensError::InvalidInput(format!("unknown label '{}'", label)))
    }

    /// Encode every cell of a column
    pub fn transform(&self, values: &ColumnValues) -> Result<Array1<f64>> {
        (0..values.len())
            .map(|row| self.encode_value(&values.value(row)))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Map class codes back to labels
    pub fn inverse_transform(&self, codes: &Array1<f64>) -> Result<Vec<String>> {
        codes
            .iter()
            .map(|&code| {
                self.classes
                    .get(code.round() as usize)
                    .cloned()
                    .ok_or_else(|| DatalensError::InvalidInput(format!("unknown class code {}", code)))
            })
            .collect()
    }
}
