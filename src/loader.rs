use crate::error::{AppError, Result};
use crate::table::{parse_datetime_text, RawTable, Value, DATE_FORMAT};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, warn};

/// Default failure threshold - fail if more than 10% of records fail to load
const DEFAULT_FAILURE_THRESHOLD: f64 = 0.10;

/// Cell spellings treated as missing values
const NULL_MARKERS: [&str; 5] = ["", "NA", "NaN", "nan", "null"];

/// Columns kept as raw text; only an empty field becomes null
const TEXT_COLUMNS: [&str; 1] = ["name"];

#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub total_records: usize,
    pub loaded_successfully: usize,
    pub load_failures: usize,
    pub failure_rate: f64,
}

impl LoadStats {
    pub fn finalize(&mut self) {
        self.failure_rate = if self.total_records > 0 {
            self.load_failures as f64 / self.total_records as f64
        } else {
            0.0
        };
    }

    pub fn exceeds_threshold(&self, threshold: f64) -> bool {
        self.failure_rate > threshold
    }
}

/// Load a CSV file into a typed table.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<(RawTable, LoadStats)> {
    load_csv_with_threshold(path, DEFAULT_FAILURE_THRESHOLD)
}

pub fn load_csv_with_threshold<P: AsRef<Path>>(
    path: P,
    failure_threshold: f64,
) -> Result<(RawTable, LoadStats)> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {}", path.display(), e),
        ))
    })?;
    let (table, stats) = parse_csv_with_threshold(&content, failure_threshold)?;
    debug!(
        "Loaded {}: {} rows, {} columns",
        path.display(),
        table.len(),
        table.columns().len()
    );
    Ok((table, stats))
}

pub fn parse_csv(content: &str) -> Result<(RawTable, LoadStats)> {
    parse_csv_with_threshold(content, DEFAULT_FAILURE_THRESHOLD)
}

/// Parse CSV text with a custom failure threshold.
///
/// Records whose field count differs from the header are skipped and counted.
pub fn parse_csv_with_threshold(
    content: &str,
    failure_threshold: f64,
) -> Result<(RawTable, LoadStats)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let text_columns: Vec<bool> = headers
        .iter()
        .map(|h| TEXT_COLUMNS.contains(&h.as_str()))
        .collect();
    let mut table = RawTable::new(headers.clone());
    let mut stats = LoadStats::default();

    for (record_num, record) in reader.records().enumerate() {
        stats.total_records += 1;
        let record = match record {
            Ok(r) if r.len() == headers.len() => r,
            Ok(r) => {
                stats.load_failures += 1;
                warn!(
                    "Skipping record {}: expected {} fields, got {}",
                    record_num + 1,
                    headers.len(),
                    r.len()
                );
                continue;
            }
            Err(e) => {
                stats.load_failures += 1;
                warn!("Skipping record {}: {}", record_num + 1, e);
                continue;
            }
        };

        table.push_row(
            record
                .iter()
                .zip(&text_columns)
                .map(|(field, &is_text)| {
                    if is_text {
                        text_value(field)
                    } else {
                        infer_value(field)
                    }
                })
                .collect(),
        );
        stats.loaded_successfully += 1;
    }

    stats.finalize();

    if stats.exceeds_threshold(failure_threshold) {
        return Err(AppError::Parse(format!(
            "Load failure rate {:.1}% exceeds threshold {:.1}%: {} failures out of {} records",
            stats.failure_rate * 100.0,
            failure_threshold * 100.0,
            stats.load_failures,
            stats.total_records
        )));
    }

    Ok((table, stats))
}

fn text_value(field: &str) -> Value {
    match field.trim() {
        "" => Value::Null,
        text => Value::Text(text.to_string()),
    }
}

/// Type a raw CSV field: null, integer, real, date-time, date, then text.
pub fn infer_value(field: &str) -> Value {
    let field = field.trim();
    if NULL_MARKERS.contains(&field) {
        return Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        return Value::Float(f);
    }
    if let Some(dt) = parse_datetime_text(field) {
        return Value::DateTime(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(field, DATE_FORMAT) {
        return Value::Date(d);
    }
    Value::Text(field.to_string())
}
