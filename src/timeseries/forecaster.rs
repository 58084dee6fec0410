//! Recursive multi-step forecaster
//!
//! The value column is summed per timestamp, a random forest learns
//! `(lag1, lag2, lag3) -> value` over the whole history, and future periods are
//! produced one at a time, each prediction feeding the lag window of the next.

use super::features::LagConfig;
use crate::data::{ColumnValues, DataColumn, Dataset};
use crate::error::{DatalensError, Result};
use crate::training::RandomForest;
use chrono::{Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

/// Spacing between forecast periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Daily
    }
}

impl Frequency {
    /// The `k`-th period after `start`; calendar months clamp to the last day of the month
    pub fn step(&self, start: NaiveDateTime, k: u32) -> Option<NaiveDateTime> {
        match self {
            Frequency::Hourly => start.checked_add_signed(Duration::hours(k as i64)),
            Frequency::Daily => start.checked_add_signed(Duration::days(k as i64)),
            Frequency::Weekly => start.checked_add_signed(Duration::weeks(k as i64)),
            Frequency::Monthly => start.checked_add_months(Months::new(k)),
            Frequency::Quarterly => start.checked_add_months(Months::new(k.checked_mul(3)?)),
            Frequency::Yearly => start.checked_add_months(Months::new(k.checked_mul(12)?)),
        }
    }

    pub fn alias(&self) -> &'static str {
        match self {
            Frequency::Hourly => "H",
            Frequency::Daily => "D",
            Frequency::Weekly => "W",
            Frequency::Monthly => "M",
            Frequency::Quarterly => "Q",
            Frequency::Yearly => "Y",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias())
    }
}

impl FromStr for Frequency {
    type Err = DatalensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "h" | "hour" | "hourly" => Ok(Frequency::Hourly),
            "d" | "day" | "daily" => Ok(Frequency::Daily),
            "w" | "week" | "weekly" => Ok(Frequency::Weekly),
            "m" | "ms" | "month" | "monthly" => Ok(Frequency::Monthly),
            "q" | "qs" | "quarter" | "quarterly" => Ok(Frequency::Quarterly),
            "y" | "a" | "year" | "yearly" | "annual" => Ok(Frequency::Yearly),
            other => Err(DatalensError::InvalidParameter {
                name: "frequency".to_string(),
                value: other.to_string(),
                reason: "expected one of H, D, W, M, Q, Y".to_string(),
            }),
        }
    }
}

/// One projected period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDateTime,
    pub forecast: f64,
}

/// Projected future periods in chronological order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub date_column: String,
    pub value_column: String,
    pub frequency: Frequency,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Two-column table (`date`, `forecast`)
    pub fn to_dataset(&self) -> Result<Dataset> {
        Dataset::new(vec![
            DataColumn::date("date", self.points.iter().map(|p| Some(p.date)).collect()),
            DataColumn::float("forecast", self.points.iter().map(|p| Some(p.forecast)).collect()),
        ])
    }
}

/// Lag-based recursive forecaster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecursiveForecaster {
    pub n_estimators: usize,
    pub random_seed: u64,
    pub lags: LagConfig,
}

impl Default for RecursiveForecaster {
    fn default() -> Self {
        Self::new()
    }
}

impl RecursiveForecaster {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            random_seed: 42,
            lags: LagConfig::default(),
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_lag_order(mut self, order: usize) -> Self {
        self.lags = LagConfig::new(order);
        self
    }

    /// Sum `value_col` per distinct timestamp, in chronological order
    pub fn aggregate(dataset: &Dataset, date_col: &str, value_col: &str) -> Result<BTreeMap<NaiveDateTime, f64>> {
        let dates = match dataset.require_column(date_col)?.values() {
            ColumnValues::Date(dates) => dates,
            other => {
                return Err(DatalensError::InvalidInput(format!(
                    "'{}' is {}, expected a date column",
                    date_col,
                    other.dtype_name()
                )))
            }
        };

        let values = dataset.require_column(value_col)?.values();
        if !values.is_numeric() {
            return Err(DatalensError::InvalidInput(format!(
                "'{}' is {}, expected a numeric column",
                value_col,
                values.dtype_name()
            )));
        }

        let mut series: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
        for (row, date) in dates.iter().enumerate() {
            if let Some(date) = date {
                *series.entry(*date).or_insert(0.0) += values.f64_at(row).unwrap_or(0.0);
            }
        }
        Ok(series)
    }

    /// Forecast `periods` future values of `value_col`.
    ///
    /// Returns `Ok(None)` when the aggregated series is too short to build a single
    /// full set of lags.
    pub fn forecast(
        &self,
        dataset: &Dataset,
        date_col: &str,
        value_col: &str,
        periods: usize,
        frequency: Frequency,
    ) -> Result<Option<Forecast>> {
        let start = Instant::now();
        let aggregated = Self::aggregate(dataset, date_col, value_col)?;

        let Some(&last_date) = aggregated.keys().next_back() else {
            info!(date_col = %date_col, "No dated rows, no forecast possible");
            return Ok(None);
        };
        let series: Vec<f64> = aggregated.into_values().collect();

        let Some((x, y)) = self.lags.build(&series) else {
            info!(
                points = series.len(),
                lag_order = self.lags.order,
                "Series too short, no forecast possible"
            );
            return Ok(None);
        };

        let mut model = RandomForest::new_regressor(self.n_estimators).with_random_state(self.random_seed);
        model.fit(&x, &y)?;

        let Some(mut window) = self.lags.seed_window(&series) else {
            return Ok(None);
        };

        // Sequential fold: every step depends on the predictions before it
        let mut points = Vec::with_capacity(periods);
        for k in 1..=periods {
            let next = model.predict(&window.features())?[0];
            let date = u32::try_from(k)
                .ok()
                .and_then(|k| frequency.step(last_date, k))
                .ok_or_else(|| {
                    DatalensError::ComputationError(format!("forecast date {} periods ahead is out of range", k))
                })?;
            points.push(ForecastPoint { date, forecast: next });
            window.push(next);
        }

        info!(
            date_col = %date_col,
            value_col = %value_col,
            history = series.len(),
            periods,
            frequency = %frequency,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Forecast generated"
        );

        Ok(Some(Forecast {
            date_column: date_col.to_string(),
            value_column: value_col.to_string(),
            frequency,
            points,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn daily(n: usize) -> Dataset {
        let dates = (0..n).map(|i| Some(at(2024, 1, 1) + Duration::days(i as i64))).collect();
        let values = (0..n).map(|i| Some(10.0 + i as f64)).collect();
        Dataset::new(vec![DataColumn::date("day", dates), DataColumn::float("sales", values)]).unwrap()
    }

    #[test]
    fn test_frequency_parse_and_step() {
        assert_eq!("D".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert_eq!("monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert!("fortnightly".parse::<Frequency>().is_err());

        let start = at(2024, 1, 31);
        assert_eq!(Frequency::Monthly.step(start, 1), Some(at(2024, 2, 29)));
        assert_eq!(Frequency::Quarterly.step(start, 1), Some(at(2024, 4, 30)));
        assert_eq!(Frequency::Weekly.step(start, 2), Some(at(2024, 2, 14)));
        assert_eq!(Frequency::Yearly.step(start, 1), Some(at(2025, 1, 31)));
    }

    #[test]
    fn test_aggregate_sums_per_date() {
        let ds = Dataset::new(vec![
            DataColumn::date("day", vec![Some(at(2024, 1, 2)), Some(at(2024, 1, 1)), Some(at(2024, 1, 2)), None]),
            DataColumn::integer("units", vec![Some(1), Some(5), Some(2), Some(100)]),
        ])
        .unwrap();
        let series = RecursiveForecaster::aggregate(&ds, "day", "units").unwrap();
        assert_eq!(series.values().copied().collect::<Vec<_>>(), vec![5.0, 3.0]);
    }

    #[test]
    fn test_forecast_shape() {
        let forecaster = RecursiveForecaster::new().with_n_estimators(10);
        let forecast = forecaster
            .forecast(&daily(20), "day", "sales", 30, Frequency::Daily)
            .unwrap()
            .unwrap();

        assert_eq!(forecast.len(), 30);
        assert_eq!(forecast.points[0].date, at(2024, 1, 21));
        for pair in forecast.points.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        }

        let table = forecast.to_dataset().unwrap();
        assert_eq!(table.column_names(), vec!["date", "forecast"]);
        assert_eq!(table.n_rows(), 30);
    }

    #[test]
    fn test_short_series_gives_no_forecast() {
        let forecaster = RecursiveForecaster::new().with_n_estimators(5);
        assert!(forecaster
            .forecast(&daily(3), "day", "sales", 5, Frequency::Daily)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_column_checks() {
        let forecaster = RecursiveForecaster::new();
        let ds = daily(10);
        assert!(matches!(
            forecaster.forecast(&ds, "missing", "sales", 5, Frequency::Daily),
            Err(DatalensError::ColumnNotFound(_))
        ));
        assert!(matches!(
            forecaster.forecast(&ds, "sales", "sales", 5, Frequency::Daily),
            Err(DatalensError::InvalidInput(_))
        ));
    }
}
