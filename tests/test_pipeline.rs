//! Integration test: loading and cleaning pipeline

use datalens::data::{normalize_column_name, normalize_column_names, DataLoader, DataProcessor, SemanticType};
use datalens::prelude::*;

fn process_csv(csv: &str) -> Result<ProcessedDataset> {
    let raw = DataLoader::new().load_bytes(csv.as_bytes(), "upload.csv")?;
    DataProcessor::new().process(raw)
}

#[test]
fn test_normalization_is_idempotent() {
    let headers = [" Order Date ", "Total $ Amount", "customer-ID", "already_clean", "ÜMLAUT col"];
    let once = normalize_column_names(&headers);
    let twice = normalize_column_names(&once);
    assert_eq!(once, twice);

    for header in headers {
        let name = normalize_column_name(header);
        assert_eq!(normalize_column_name(&name), name);
    }
    assert_eq!(normalize_column_name(" Order Date "), "order_date");
}

#[test]
fn test_duplicates_removed_exactly() {
    let csv = "a,b\n1,x\n2,y\n1,x\n3,z\n2,y\n1,x\n";
    let processed = process_csv(csv).unwrap();

    assert_eq!(processed.dataset.n_rows(), 3);
    assert_eq!(processed.stats.duplicates_removed, 3);
    assert_eq!(processed.dataset.row(0), vec![Value::Integer(1), Value::Text("x".into())]);
}

#[test]
fn test_no_missing_after_imputation() {
    let csv = "num,cat,empty\n1.5,red,\n,red,\n3.5,,\n2.0,blue,\n";
    let processed = process_csv(csv).unwrap();
    let ds = &processed.dataset;

    for name in processed.numeric_columns().iter().chain(processed.categorical_columns()) {
        assert_eq!(ds.require_column(name).unwrap().null_count(), 0, "column {}", name);
    }

    let empty = ds.require_column("empty").unwrap().values();
    for row in 0..ds.n_rows() {
        assert_eq!(empty.value(row), Value::Text("Unknown".into()));
    }
    assert_eq!(ds.require_column("num").unwrap().values().value(1), Value::Float(2.0));
    assert_eq!(ds.require_column("cat").unwrap().values().value(2), Value::Text("red".into()));
}

#[test]
fn test_date_inference_is_all_or_nothing() {
    let csv = "good,bad\n2024-01-01,2024-01-01\n2024-01-02,not a date\n2024-01-03,2024-01-03\n";
    let processed = process_csv(csv).unwrap();

    assert_eq!(processed.date_columns(), &["good".to_string()]);
    assert_eq!(processed.categorical_columns(), &["bad".to_string()]);
    assert_eq!(processed.types.type_of("good"), Some(SemanticType::Date));
}

#[test]
fn test_error_taxonomy() {
    let loader = DataLoader::new();
    assert!(matches!(
        loader.load_bytes(b"a,b\n1,2\n", "data.txt"),
        Err(DatalensError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        loader.load_bytes(b"a,b\n", "data.csv"),
        Err(DatalensError::EmptyInput(_))
    ));
    assert!(matches!(
        DataLoader::new().with_max_bytes(4).load_bytes(b"a,b\n1,2\n", "data.csv"),
        Err(DatalensError::InvalidInput(_))
    ));
}

#[test]
fn test_end_to_end_profile_scenario() {
    let mut csv = String::from("Sale Date,Revenue,Region\n");
    for i in 0..100 {
        let day = chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Duration::days(i);
        let revenue = if i % 20 == 0 { String::new() } else { format!("{}.5", 100 + i) };
        let region = ["north", "south", "east", "west"][(i % 4) as usize];
        csv.push_str(&format!("{},{},{}\n", day, revenue, region));
    }

    let processed = process_csv(&csv).unwrap();

    assert_eq!(processed.stats.missing_filled, 5);
    assert_eq!(processed.stats.duplicates_removed, 0);
    assert_eq!(processed.numeric_columns().len(), 1);
    assert_eq!(processed.categorical_columns().len(), 1);
    assert_eq!(processed.date_columns().len(), 1);
    assert_eq!(processed.dataset.missing_count(), 0);
}

#[test]
fn test_year_month_column_is_date() {
    let mut csv = String::from("month,units\n");
    for m in 1..=12 {
        csv.push_str(&format!("2023-{:02},{}\n", m, 100 + m * 5));
    }
    let processed = process_csv(&csv).unwrap();

    assert_eq!(processed.date_columns(), &["month".to_string()]);
    assert!(processed.categorical_columns().is_empty());
    assert_eq!(processed.types.type_of("month"), Some(SemanticType::Date));

    let forecast = RecursiveForecaster::new()
        .with_n_estimators(10)
        .forecast(&processed.dataset, "month", "units", 3, Frequency::Monthly)
        .unwrap()
        .unwrap();
    let dates: Vec<String> = forecast
        .points
        .iter()
        .map(|p| p.date.format("%Y-%m-%d").to_string())
        .collect();
    assert_eq!(dates, vec!["2024-01-01", "2024-02-01", "2024-03-01"]);
}
