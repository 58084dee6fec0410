//! Analysis engine facade
//!
//! Wires the loader, cleaning pipeline, analytic components and the dataset
//! store together behind one configuration. Every analytic call builds a fresh
//! model instance, so concurrent callers share nothing but the store.

use crate::anomaly::{flag_anomalies, IsolationForest};
use crate::config::EngineConfig;
use crate::data::{
    pivot_tables, summary_statistics, ColumnSummary, DataLoader, DataProcessor, Dataset, PivotTable,
    ProcessedDataset,
};
use crate::error::{DatalensError, Result};
use crate::insights::InsightGenerator;
use crate::store::DatasetStore;
use crate::timeseries::{Forecast, Frequency, RecursiveForecaster};
use crate::training::{AutoMLPredictor, PredictorMetrics, TrainedPredictor};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Entry point for every analytic operation
pub struct AnalysisEngine {
    config: EngineConfig,
    store: DatasetStore,
}

impl AnalysisEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = DatasetStore::new(config.store_capacity, config.store_ttl_secs);
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    fn loader(&self) -> DataLoader {
        DataLoader::new().with_max_bytes(self.config.max_upload_bytes)
    }

    /// Parse raw bytes and run the cleaning pipeline
    pub fn process_dataset(&self, bytes: &[u8], file_name: &str) -> Result<ProcessedDataset> {
        let start = Instant::now();
        let raw = self.loader().load_bytes(bytes, file_name)?;
        let processed = DataProcessor::new().process(raw)?;

        info!(
            file = %file_name,
            rows = processed.dataset.n_rows(),
            columns = processed.dataset.n_cols(),
            duplicates_removed = processed.stats.duplicates_removed,
            missing_filled = processed.stats.missing_filled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset processed"
        );
        Ok(processed)
    }

    /// Process an upload and keep the result in the store under a new id
    pub fn upload(&self, bytes: &[u8], file_name: &str) -> Result<(Uuid, Arc<ProcessedDataset>)> {
        let processed = self.process_dataset(bytes, file_name)?;
        let id = self.store.insert(processed);
        let stored = self.dataset(&id)?;
        Ok((id, stored))
    }

    /// A previously uploaded dataset
    pub fn dataset(&self, id: &Uuid) -> Result<Arc<ProcessedDataset>> {
        self.store
            .get(id)
            .ok_or_else(|| DatalensError::InvalidInput(format!("unknown or expired dataset {}", id)))
    }

    pub fn generate_insights(&self, dataset: &Dataset, numeric_cols: &[String], date_cols: &[String]) -> Vec<String> {
        InsightGenerator::default().generate(dataset, numeric_cols, date_cols)
    }

    pub fn train_predictor(&self, dataset: &Dataset, target: &str) -> Result<(TrainedPredictor, PredictorMetrics)> {
        AutoMLPredictor::new()
            .with_n_estimators(self.config.n_estimators)
            .with_random_seed(self.config.random_seed)
            .with_test_size(self.config.test_size)
            .with_max_classes(self.config.classification_max_classes)
            .train(dataset, target)
    }

    /// Forecast with explicit periods and frequency; `None` falls back to the configured defaults
    pub fn forecast_series(
        &self,
        dataset: &Dataset,
        date_col: &str,
        value_col: &str,
        periods: Option<usize>,
        frequency: Option<Frequency>,
    ) -> Result<Option<Forecast>> {
        RecursiveForecaster::new()
            .with_n_estimators(self.config.n_estimators)
            .with_random_seed(self.config.random_seed)
            .with_lag_order(self.config.lag_order)
            .forecast(
                dataset,
                date_col,
                value_col,
                periods.unwrap_or(self.config.default_forecast_periods),
                frequency.unwrap_or(self.config.default_frequency),
            )
    }

    /// Flag anomalous rows on the caller's own copy of a dataset
    pub fn detect_anomalies(
        &self,
        dataset: Dataset,
        numeric_cols: &[String],
        contamination: Option<f64>,
    ) -> Result<Dataset> {
        let mut detector = IsolationForest::new()
            .with_n_estimators(self.config.n_estimators)
            .with_max_samples(self.config.isolation_max_samples)
            .with_seed(self.config.random_seed)
            .with_contamination(contamination.unwrap_or(self.config.default_contamination));
        flag_anomalies(dataset, numeric_cols, &mut detector)
    }

    pub fn summary_statistics(&self, processed: &ProcessedDataset) -> Vec<ColumnSummary> {
        summary_statistics(&processed.dataset, processed.numeric_columns())
    }

    pub fn pivot_tables(&self, processed: &ProcessedDataset) -> Vec<PivotTable> {
        pivot_tables(&processed.dataset, &processed.types)
    }
}
