//! Time series module
//!
//! Provides lag feature construction and recursive multi-step forecasting:
//! - Lag features
//! - Per-timestamp aggregation
//! - Calendar-aware forecast dates

mod features;
mod forecaster;

pub use features::{LagConfig, LagWindow};
pub use forecaster::{Forecast, ForecastPoint, Frequency, RecursiveForecaster};
