//! Engine configuration

use crate::error::{DatalensError, Result};
use crate::timeseries::Frequency;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by every analytic operation of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
    /// Trees per random forest
    pub n_estimators: usize,
    pub random_seed: u64,
    /// Held-out fraction for predictor evaluation
    pub test_size: f64,
    /// Integer targets with fewer distinct values than this are classified
    pub classification_max_classes: usize,
    pub default_contamination: f64,
    pub isolation_max_samples: usize,
    pub default_forecast_periods: usize,
    pub default_frequency: Frequency,
    pub lag_order: usize,
    pub store_capacity: usize,
    pub store_ttl_secs: u64,
    /// Advisory wall-clock budget for a training call, enforced by callers
    pub model_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: env_or("DATALENS_MAX_UPLOAD_SIZE", 50 * 1024 * 1024), // 50MB
            n_estimators: 100,
            random_seed: env_or("DATALENS_RANDOM_SEED", 42),
            test_size: 0.2,
            classification_max_classes: 10,
            default_contamination: 0.05,
            isolation_max_samples: 256,
            default_forecast_periods: 30,
            default_frequency: Frequency::Daily,
            lag_order: 3,
            store_capacity: env_or("DATALENS_STORE_CAPACITY", 64),
            store_ttl_secs: env_or("DATALENS_STORE_TTL_SECS", 3600),
            model_timeout_secs: 300,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config file; absent fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_classification_max_classes(mut self, max_classes: usize) -> Self {
        self.classification_max_classes = max_classes;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.default_contamination = contamination;
        self
    }

    pub fn with_lag_order(mut self, order: usize) -> Self {
        self.lag_order = order;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_store(mut self, capacity: usize, ttl_secs: u64) -> Self {
        self.store_capacity = capacity;
        self.store_ttl_secs = ttl_secs;
        self
    }

    /// Reject settings no operation could run with
    pub fn validate(&self) -> Result<()> {
        fn invalid(name: &str, value: impl ToString, reason: &str) -> DatalensError {
            DatalensError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", self.n_estimators, "must be at least 1"));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(invalid("test_size", self.test_size, "must be strictly between 0 and 1"));
        }
        if !(0.0..=0.5).contains(&self.default_contamination) {
            return Err(invalid(
                "default_contamination",
                self.default_contamination,
                "must be within [0, 0.5]",
            ));
        }
        if self.lag_order == 0 {
            return Err(invalid("lag_order", self.lag_order, "must be at least 1"));
        }
        if self.isolation_max_samples == 0 {
            return Err(invalid("isolation_max_samples", self.isolation_max_samples, "must be at least 1"));
        }
        if self.max_upload_bytes == 0 {
            return Err(invalid("max_upload_bytes", self.max_upload_bytes, "must be positive"));
        }
        if self.store_capacity == 0 {
            return Err(invalid("store_capacity", self.store_capacity, "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.lag_order, 3);
        assert_eq!(config.default_frequency, Frequency::Daily);
    }

    #[test]
    fn test_validate_rejects() {
        assert!(EngineConfig::default().with_test_size(1.0).validate().is_err());
        assert!(EngineConfig::default().with_contamination(0.6).validate().is_err());
        assert!(EngineConfig::default().with_n_estimators(0).validate().is_err());
        assert!(EngineConfig::default().with_lag_order(0).validate().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"n_estimators": 25, "default_frequency": "Monthly"}}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.n_estimators, 25);
        assert_eq!(config.default_frequency, Frequency::Monthly);
        assert_eq!(config.lag_order, 3);
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"test_size": 2.0}}"#).unwrap();
        assert!(matches!(
            EngineConfig::from_file(file.path()),
            Err(DatalensError::InvalidParameter { .. })
        ));
    }
}
