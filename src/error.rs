//! Error types for the datalens engine

use thiserror::Error;

/// Result type alias for datalens operations
pub type Result<T> = std::result::Result<T, DatalensError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum DatalensError {
    #[error("Unsupported file format: {0}. Please upload .csv, .xls or .xlsx")]
    UnsupportedFormat(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DatalensError {
    /// Whether the caller can recover by changing the request (as opposed to an internal failure)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DatalensError::UnsupportedFormat(_)
                | DatalensError::EmptyInput(_)
                | DatalensError::ColumnNotFound(_)
                | DatalensError::InsufficientData(_)
                | DatalensError::InvalidInput(_)
                | DatalensError::InvalidParameter { .. }
        )
    }
}

impl From<polars::error::PolarsError> for DatalensError {
    fn from(err: polars::error::PolarsError) -> Self {
        DatalensError::DataError(err.to_string())
    }
}

impl From<calamine::Error> for DatalensError {
    fn from(err: calamine::Error) -> Self {
        DatalensError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for DatalensError {
    fn from(err: serde_json::Error) -> Self {
        DatalensError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DatalensError {
    fn from(err: ndarray::ShapeError) -> Self {
        DatalensError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
