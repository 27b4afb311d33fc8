use chrono::NaiveDate;
use std::collections::HashSet;
use vitis_stress::config::{AnalysisConfig, ParcelFilter};
use vitis_stress::error::AppError;
use vitis_stress::integrator::integrate;
use vitis_stress::models::{Recommendation, StressLevel};
use vitis_stress::normalizer::{normalize_climate, normalize_ndvi, normalize_parcels};
use vitis_stress::pipeline::{run_pipeline, PipelineInputs};
use vitis_stress::table::{RawTable, Value};

fn date(day: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(2024, 7, day).unwrap())
}

/// Two parcels over two days, with matching daily climate
fn create_test_data() -> PipelineInputs {
    let ndvi = RawTable::new(["parcel_id", "date", "ndvi_mean"])
        .with_row(vec![Value::Int(1), date(1), Value::Float(0.7)])
        .with_row(vec![Value::Int(1), date(2), Value::Float(0.68)])
        .with_row(vec![Value::Int(2), date(1), Value::Float(0.45)])
        .with_row(vec![Value::Int(2), date(2), Value::Float(0.43)]);

    let climate = RawTable::new(["parcel_id", "date", "air_temperature_c", "precipitation_m"])
        .with_row(vec![Value::Int(1), date(1), Value::Int(25), Value::Float(0.0)])
        .with_row(vec![Value::Int(1), date(2), Value::Int(26), Value::Float(0.0)])
        .with_row(vec![Value::Int(2), date(1), Value::Int(32), Value::Float(0.0)])
        .with_row(vec![Value::Int(2), date(2), Value::Int(33), Value::Float(0.0)]);

    let parcels = RawTable::new(["id", "name"])
        .with_row(vec![Value::Int(1), Value::Text("Test Parcel A".into())])
        .with_row(vec![Value::Int(2), Value::Text("Test Parcel B".into())]);

    PipelineInputs {
        ndvi,
        climate,
        parcels,
    }
}

/// High-vigor parcel in mild heat scores low stress with no action
#[test]
fn test_low_stress_parcel_scenario() {
    let output = run_pipeline(&create_test_data(), &AnalysisConfig::default()).unwrap();
    let p1 = output.parcel(1).expect("parcel 1 scored");

    assert_eq!(p1.mean_ndvi, Some(0.69));
    assert_eq!(p1.water_stress, Some(0.264));
    assert_eq!(p1.stress_level, Some(StressLevel::Low));
    assert_eq!(p1.recommendation, Recommendation::NoAction);
    assert_eq!(p1.parcel_name.as_deref(), Some("Test Parcel A"));
    assert_eq!(p1.confidence, 1.0);
}

/// Low-vigor parcel in strong heat scores high stress and needs irrigation
#[test]
fn test_high_stress_parcel_scenario() {
    let output = run_pipeline(&create_test_data(), &AnalysisConfig::default()).unwrap();
    let p1 = output.parcel(1).unwrap();
    let p2 = output.parcel(2).unwrap();

    assert_eq!(p2.water_stress, Some(0.607));
    assert_eq!(p2.stress_level, Some(StressLevel::High));
    assert_eq!(p2.recommendation, Recommendation::ScheduleIrrigation);
    assert!(p2.water_stress > p1.water_stress);
}

/// Stress, forecast and tier are all present or all absent, with the forecast capped
#[test]
fn test_forecast_bounds_and_joint_presence() {
    let output = run_pipeline(&create_test_data(), &AnalysisConfig::default()).unwrap();

    for r in &output.results {
        let present = [
            r.water_stress.is_some(),
            r.forecast_7d.is_some(),
            r.stress_level.is_some(),
        ];
        assert!(present.iter().all(|p| *p) || present.iter().all(|p| !*p));

        if let (Some(ws), Some(fc)) = (r.water_stress, r.forecast_7d) {
            assert!(fc >= ws);
            assert!(fc <= 1.2);
        }
    }
}

/// Registered parcel with only null NDVI is emitted as insufficient data
#[test]
fn test_all_null_ndvi_parcel_still_reported() {
    let mut inputs = create_test_data();
    inputs.ndvi = inputs
        .ndvi
        .with_row(vec![Value::Int(3), date(1), Value::Null])
        .with_row(vec![Value::Int(3), date(2), Value::Null]);
    inputs.parcels = inputs
        .parcels
        .with_row(vec![Value::Int(3), Value::Text("Test Parcel C".into())]);

    let output = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap();
    let p3 = output.parcel(3).expect("parcel without NDVI still emitted");

    assert_eq!(p3.mean_ndvi, None);
    assert_eq!(p3.water_stress, None);
    assert_eq!(p3.forecast_7d, None);
    assert_eq!(p3.stress_level, None);
    assert_eq!(p3.recommendation, Recommendation::InsufficientData);

    assert_eq!(output.summary.parcel_count, 3);
    assert_eq!(output.summary.unclassified_count, 1);
}

/// Duplicate registry ids abort the run
#[test]
fn test_duplicate_parcel_id_rejected() {
    let mut inputs = create_test_data();
    inputs.parcels = RawTable::new(["id", "name"])
        .with_row(vec![Value::Int(1), Value::Text("A".into())])
        .with_row(vec![Value::Int(1), Value::Text("B".into())]);

    let err = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(err.to_string().contains("Duplicate parcel id"));
}

/// NDVI above 1.0 is a hard validation failure, never clamped
#[test]
fn test_ndvi_out_of_range_aborts_run() {
    let mut inputs = create_test_data();
    inputs.ndvi = inputs
        .ndvi
        .with_row(vec![Value::Int(1), date(3), Value::Float(1.01)]);

    let err = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

/// Climate table without a date or observation_time column is a schema error
#[test]
fn test_missing_date_column_is_schema_error() {
    let mut inputs = create_test_data();
    inputs.climate = RawTable::new(["parcel_id", "time", "air_temperature_c"]);

    let err = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, AppError::Schema(_)));
}

/// Implausible temperature and negative precipitation become missing readings
#[test]
fn test_out_of_range_temperature_is_soft() {
    let mut inputs = create_test_data();
    inputs.climate = RawTable::new(["parcel_id", "date", "air_temperature_c", "precipitation_m"])
        .with_row(vec![Value::Int(1), date(1), Value::Int(25), Value::Float(0.0)])
        .with_row(vec![Value::Int(1), date(2), Value::Int(75), Value::Float(-1.0)])
        .with_row(vec![Value::Int(2), date(1), Value::Int(95), Value::Float(0.0)]);

    let output = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap();

    // Parcel 1 keeps only the plausible 25 °C reading
    let p1 = output.parcel(1).unwrap();
    let expected = ((1.0 - 0.69) * (25.0 / 30.0) * 1000.0_f64).round() / 1000.0;
    assert_eq!(p1.water_stress, Some(expected));

    // Parcel 2 has no plausible temperature left
    let p2 = output.parcel(2).unwrap();
    assert_eq!(p2.water_stress, None);
    assert_eq!(p2.mean_ndvi, Some(0.44));
}

/// Join keeps every NDVI row of a known parcel and drops unregistered parcels
#[test]
fn test_integration_respects_registry_and_left_join() {
    let mut inputs = create_test_data();
    inputs.ndvi = inputs
        .ndvi
        .with_row(vec![Value::Int(9), date(1), Value::Float(0.2)])
        .with_row(vec![Value::Int(1), date(5), Value::Float(0.66)]);

    let ndvi = normalize_ndvi(&inputs.ndvi).unwrap();
    let climate = normalize_climate(&inputs.climate).unwrap();
    let parcels = normalize_parcels(&inputs.parcels).unwrap();
    let integrated = integrate(&ndvi, &climate, &parcels).unwrap();

    let known: HashSet<i64> = parcels.rows.iter().filter_map(|p| p.id).collect();
    assert!(integrated.iter().all(|r| known.contains(&r.parcel_id)));

    let expected_rows = ndvi
        .rows
        .iter()
        .filter(|o| o.parcel_id.is_some_and(|id| known.contains(&id)))
        .count();
    assert_eq!(integrated.len(), expected_rows);

    let day5 = integrated
        .iter()
        .find(|r| r.date == NaiveDate::from_ymd_opt(2024, 7, 5).unwrap())
        .unwrap();
    assert_eq!(day5.air_temperature_c, None);
}

/// Hourly ERA5 readings are reduced to daily means before joining
#[test]
fn test_sub_daily_climate_is_aggregated_before_join() {
    let mut inputs = create_test_data();
    let ts = |day: u32, hour: u32| {
        Value::Text(format!("2024-07-{:02} {:02}:00:00", day, hour))
    };
    inputs.climate = RawTable::new([
        "parcel_id",
        "observation_time",
        "air_temperature_c",
        "precipitation_m",
    ])
    .with_row(vec![Value::Int(1), ts(1, 0), Value::Int(20), Value::Float(0.001)])
    .with_row(vec![Value::Int(1), ts(1, 12), Value::Int(30), Value::Float(0.002)])
    .with_row(vec![Value::Int(1), ts(2, 12), Value::Int(26), Value::Float(0.0)]);

    let output = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap();

    // Day means 25 and 26 give the same stress as the daily scenario
    assert_eq!(output.parcel(1).unwrap().water_stress, Some(0.264));
    assert_eq!(output.parcel(2).unwrap().water_stress, None);
}

/// Name pattern filter keeps only matching parcels
#[test]
fn test_parcel_filter_restricts_results() {
    let analysis = AnalysisConfig {
        parcels: ParcelFilter {
            ids: vec![],
            patterns: vec!["*B".to_string()],
        },
    };

    let output = run_pipeline(&create_test_data(), &analysis).unwrap();
    assert_eq!(output.results.len(), 1);
    assert_eq!(output.results[0].parcel_id, 2);
}

/// Registry sharing no parcel with NDVI leaves nothing to score
#[test]
fn test_no_known_parcels_is_error() {
    let mut inputs = create_test_data();
    inputs.parcels = RawTable::new(["id", "name"]).with_row(vec![Value::Int(42), Value::Null]);

    let err = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap_err();
    assert!(err.to_string().contains("empty"));
}

/// Running twice on the same inputs gives identical output
#[test]
fn test_pipeline_is_idempotent() {
    let inputs = create_test_data();
    let first = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap();
    let second = run_pipeline(&inputs, &AnalysisConfig::default()).unwrap();
    assert_eq!(first, second);
}
