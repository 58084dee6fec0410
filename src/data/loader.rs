//! Raw file ingestion
//!
//! Turns uploaded bytes plus a file-name hint into a [`Dataset`]. Delimited
//! text goes through the polars CSV reader, spreadsheets through calamine.

use super::dates::parse_datetime;
use super::{DataColumn, Dataset};
use crate::error::{DatalensError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Accepted input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    /// Detect the format from a file name's extension
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xls" | "xlsx" => Ok(FileFormat::Excel),
            "" => Err(DatalensError::UnsupportedFormat(format!(
                "'{}' has no file extension",
                file_name
            ))),
            other => Err(DatalensError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Csv => write!(f, "csv"),
            FileFormat::Excel => write!(f, "excel"),
        }
    }
}

/// Loader for uploaded tabular files
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Upper bound on accepted input size
    max_bytes: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
        }
    }

    /// Set the maximum accepted input size in bytes
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Load a dataset from raw bytes; the file name only selects the format
    pub fn load_bytes(&self, bytes: &[u8], file_name: &str) -> Result<Dataset> {
        let format = FileFormat::from_file_name(file_name)?;

        if bytes.len() > self.max_bytes {
            return Err(DatalensError::InvalidInput(format!(
                "file is {} bytes, limit is {} bytes",
                bytes.len(),
                self.max_bytes
            )));
        }

        info!(file = %file_name, size_bytes = bytes.len(), format = %format, "Loading dataset");

        let dataset = match format {
            FileFormat::Csv => Self::read_csv(bytes)?,
            FileFormat::Excel => Self::read_excel(bytes)?,
        };

        if dataset.n_rows() == 0 {
            return Err(DatalensError::EmptyInput(format!("'{}' contains no rows", file_name)));
        }

        debug!(rows = dataset.n_rows(), columns = dataset.n_cols(), "Dataset parsed");
        Ok(dataset)
    }

    /// Load a dataset from a file on disk
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        // Reject unknown formats before touching the file
        FileFormat::from_file_name(&file_name)?;
        let bytes = std::fs::read(path)?;
        self.load_bytes(&bytes, &file_name)
    }

    fn read_csv(bytes: &[u8]) -> Result<Dataset> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DatalensError::EmptyInput("file is empty".to_string()));
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()?;

        let columns = df
            .get_columns()
            .iter()
            .map(|column| Self::column_from_series(column.name().as_str(), column.as_materialized_series()))
            .collect::<Result<Vec<_>>>()?;

        Dataset::new(columns)
    }

    fn column_from_series(name: &str, series: &Series) -> Result<DataColumn> {
        let column = match series.dtype() {
            DataType::Boolean => DataColumn::boolean(name, series.bool()?.into_iter().collect()),
            dt if dt.is_integer() => {
                let cast = series.cast(&DataType::Int64)?;
                DataColumn::integer(name, cast.i64()?.into_iter().collect())
            }
            dt if dt.is_float() => {
                let cast = series.cast(&DataType::Float64)?;
                DataColumn::float(name, cast.f64()?.into_iter().collect())
            }
            _ => {
                let cast = series.cast(&DataType::String)?;
                let values: Vec<Option<String>> = cast
                    .str()?
                    .into_iter()
                    .map(|v| v.filter(|s| !s.is_empty()).map(str::to_string))
                    .collect();
                DataColumn::text(name, values)
            }
        };
        Ok(column)
    }

    fn read_excel(bytes: &[u8]) -> Result<Dataset> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| DatalensError::EmptyInput("workbook has no worksheets".to_string()))??;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| DatalensError::EmptyInput("worksheet is empty".to_string()))?;
        let body: Vec<&[Data]> = rows.collect();

        let columns = header
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let name = match cell {
                    Data::Empty => format!("column_{}", idx),
                    other => other.to_string(),
                };
                let cells: Vec<Option<&Data>> = body
                    .iter()
                    .map(|row| row.get(idx).filter(|c| !is_empty_cell(c)))
                    .collect();
                spreadsheet_column(name, &cells)
            })
            .collect();

        Dataset::new(columns)
    }
}

fn is_empty_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

fn cell_datetime(cell: &Data) -> Option<NaiveDateTime> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime(),
        Data::DateTimeIso(s) => parse_datetime(s),
        _ => None,
    }
}

/// Pick the narrowest storage that holds every present cell of a spreadsheet column
fn spreadsheet_column(name: String, cells: &[Option<&Data>]) -> DataColumn {
    let present = || cells.iter().flatten();

    let all_integral = present().all(|c| match c {
        Data::Int(_) => true,
        Data::Float(f) => f.fract() == 0.0 && f.abs() < i64::MAX as f64,
        _ => false,
    });
    if all_integral {
        let values = cells
            .iter()
            .map(|c| match c {
                Some(Data::Int(i)) => Some(*i),
                Some(Data::Float(f)) => Some(*f as i64),
                _ => None,
            })
            .collect();
        return DataColumn::integer(name, values);
    }

    if present().all(|c| matches!(c, Data::Int(_) | Data::Float(_))) {
        let values = cells
            .iter()
            .map(|c| match c {
                Some(Data::Int(i)) => Some(*i as f64),
                Some(Data::Float(f)) => Some(*f),
                _ => None,
            })
            .collect();
        return DataColumn::float(name, values);
    }

    if present().all(|c| matches!(c, Data::Bool(_))) {
        let values = cells
            .iter()
            .map(|c| match c {
                Some(Data::Bool(b)) => Some(*b),
                _ => None,
            })
            .collect();
        return DataColumn::boolean(name, values);
    }

    if present().all(|c| cell_datetime(c).is_some()) {
        let values = cells.iter().map(|c| c.and_then(cell_datetime)).collect();
        return DataColumn::date(name, values);
    }

    let values: Vec<Option<String>> = cells.iter().map(|c| c.map(|d| d.to_string())).collect();
    DataColumn::text(name, values)
}
