//! Datalens - tabular data analysis engine
//!
//! This crate ingests a spreadsheet or CSV file, cleans it and offers automated
//! analytics over the cleaned table:
//! - Cleaning pipeline: name normalization, type inference, de-duplication, imputation
//! - Rule-based insight statements
//! - AutoML predictor with automatic classification/regression detection
//! - Recursive multi-step forecasting
//! - Isolation-forest anomaly flagging
//!
//! # Modules
//!
//! ## Core
//! - [`data`] - Dataset model, loading, cleaning, summaries and pivots
//! - [`insights`] - Ordered insight rules
//! - [`training`] - Random forests, encoders and the AutoML predictor
//! - [`timeseries`] - Lag features and the recursive forecaster
//! - [`anomaly`] - Anomaly detection (Isolation Forest)
//!
//! ## Infrastructure
//! - [`config`] - Engine configuration
//! - [`store`] - Bounded TTL store for uploaded datasets
//! - [`engine`] - Facade over every operation
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core analysis modules
pub mod data;
pub mod insights;
pub mod training;
pub mod timeseries;
pub mod anomaly;

// Infrastructure
pub mod store;
pub mod engine;

// Services
pub mod cli;

pub use error::{DatalensError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{DatalensError, Result};

    // Configuration and facade
    pub use crate::config::EngineConfig;
    pub use crate::engine::AnalysisEngine;
    pub use crate::store::DatasetStore;

    // Data
    pub use crate::data::{
        ColumnTypeSets, ColumnValues, DataColumn, DataLoader, DataProcessor, Dataset, FileFormat, ProcessedDataset,
        SemanticType, Value,
    };

    // Insights
    pub use crate::insights::{generate_insights, InsightGenerator};

    // Training
    pub use crate::training::{AutoMLPredictor, PredictorMetrics, RandomForest, TaskType, TrainedPredictor};

    // Time series
    pub use crate::timeseries::{Forecast, ForecastPoint, Frequency, RecursiveForecaster};

    // Anomaly detection
    pub use crate::anomaly::{detect_anomalies, AnomalyDetector, IsolationForest, ANOMALY_COLUMN};
}
