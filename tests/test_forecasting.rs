//! Integration test: recursive forecaster

use chrono::{Duration, NaiveDate, NaiveDateTime};
use datalens::prelude::*;
use datalens::timeseries::LagConfig;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
}

fn series(dates: Vec<NaiveDateTime>, values: Vec<f64>) -> Dataset {
    Dataset::new(vec![
        DataColumn::date("date", dates.into_iter().map(Some).collect()),
        DataColumn::float("value", values.into_iter().map(Some).collect()),
    ])
    .unwrap()
}

fn seasonal(n: usize) -> Dataset {
    let dates = (0..n).map(|i| start() + Duration::days(i as i64)).collect();
    let values = (0..n).map(|i| 100.0 + (i % 7) as f64 * 5.0 + i as f64 * 0.5).collect();
    series(dates, values)
}

#[test]
fn test_thirty_periods_strictly_increasing() {
    let forecaster = RecursiveForecaster::new().with_n_estimators(20);

    for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::Hourly] {
        let forecast = forecaster
            .forecast(&seasonal(60), "date", "value", 30, frequency)
            .unwrap()
            .unwrap();

        assert_eq!(forecast.len(), 30);
        let last_known = start() + Duration::days(59);
        assert_eq!(Some(forecast.points[0].date), frequency.step(last_known, 1));
        for pair in forecast.points.windows(2) {
            assert!(pair[1].date > pair[0].date);
            assert_eq!(Some(pair[1].date), frequency.step(pair[0].date, 1));
        }
    }
}

#[test]
fn test_monthly_dates_follow_calendar() {
    let dates: Vec<NaiveDateTime> = (0..12)
        .filter_map(|m| NaiveDate::from_ymd_opt(2022, m + 1, 1))
        .filter_map(|d| d.and_hms_opt(0, 0, 0))
        .collect();
    let values = (0..12).map(|i| 10.0 * i as f64).collect();

    let forecast = RecursiveForecaster::new()
        .with_n_estimators(10)
        .forecast(&series(dates, values), "date", "value", 3, Frequency::Monthly)
        .unwrap()
        .unwrap();

    let expected: Vec<NaiveDateTime> = [(2023, 1), (2023, 2), (2023, 3)]
        .iter()
        .filter_map(|&(y, m)| NaiveDate::from_ymd_opt(y, m, 1))
        .filter_map(|d| d.and_hms_opt(0, 0, 0))
        .collect();
    let actual: Vec<NaiveDateTime> = forecast.points.iter().map(|p| p.date).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_short_series_degrades_to_none() {
    let forecaster = RecursiveForecaster::new().with_n_estimators(5);

    // 3 distinct timestamps spread over 6 rows
    let dates = (0..6).map(|i| start() + Duration::days(i % 3)).collect();
    let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    assert!(forecaster
        .forecast(&series(dates, values), "date", "value", 10, Frequency::Daily)
        .unwrap()
        .is_none());

    // 4 distinct timestamps is enough for a single training row
    let dates = (0..4).map(|i| start() + Duration::days(i)).collect();
    let forecast = forecaster
        .forecast(&series(dates, vec![1.0, 2.0, 3.0, 4.0]), "date", "value", 2, Frequency::Daily)
        .unwrap()
        .unwrap();
    assert_eq!(forecast.len(), 2);
    // a single training row means every prediction is its target
    assert!(forecast.points.iter().all(|p| (p.forecast - 4.0).abs() < 1e-9));
}

#[test]
fn test_forecast_is_deterministic() {
    let forecaster = RecursiveForecaster::new().with_n_estimators(15);
    let a = forecaster.forecast(&seasonal(40), "date", "value", 10, Frequency::Daily).unwrap();
    let b = forecaster.forecast(&seasonal(40), "date", "value", 10, Frequency::Daily).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_forecast_table() {
    let forecast = RecursiveForecaster::new()
        .with_n_estimators(5)
        .forecast(&seasonal(20), "date", "value", 5, Frequency::Daily)
        .unwrap()
        .unwrap();

    let table = forecast.to_dataset().unwrap();
    assert_eq!(table.column_names(), vec!["date", "forecast"]);
    assert_eq!(table.n_rows(), 5);
    assert_eq!(table.missing_count(), 0);
}

#[test]
fn test_lag_rows_match_history() {
    let (x, y) = LagConfig::default().build(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    assert_eq!(x.nrows(), 3);
    assert_eq!(y.to_vec(), vec![4.0, 5.0, 6.0]);
    assert_eq!(x.row(0).to_vec(), vec![3.0, 2.0, 1.0]);
}

#[test]
fn test_frequency_aliases() {
    for (alias, expected) in [
        ("H", Frequency::Hourly),
        ("d", Frequency::Daily),
        ("W", Frequency::Weekly),
        ("MS", Frequency::Monthly),
        ("Q", Frequency::Quarterly),
        ("A", Frequency::Yearly),
    ] {
        assert_eq!(alias.parse::<Frequency>().unwrap(), expected);
    }
}
