//! Maps raw source tables onto the canonical NDVI, climate and parcel schemas.
//!
//! Each source names its columns a little differently. The normalizer picks
//! the first recognized variant for every canonical column, types the cells,
//! and reduces sub-daily climate readings to one row per parcel per day.
//! Inputs are borrowed and never modified.

use crate::error::{AppError, Result};
use crate::models::{
    ClimateObservation, ClimateTable, NdviObservation, NdviTable, Parcel, ParcelTable,
};
use crate::table::{RawTable, Value};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

pub const PARCEL_ID: &str = "parcel_id";
pub const DATE: &str = "date";
pub const NDVI_MEAN: &str = "ndvi_mean";
pub const AIR_TEMPERATURE_C: &str = "air_temperature_c";
pub const PRECIPITATION_M: &str = "precipitation_m";
pub const ID: &str = "id";
pub const NAME: &str = "name";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

const NDVI_DATE_VARIANTS: [&str; 2] = ["observation_date", "date"];
const CLIMATE_DAILY_DATE: &str = "date";
const CLIMATE_TIMESTAMP: &str = "observation_time";
const PRECIPITATION_VARIANTS: [&str; 2] = ["precipitation_m", "precipitation"];
const PARCEL_ID_VARIANTS: [&str; 2] = ["id", "parcel_id"];
const LATITUDE_VARIANTS: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_VARIANTS: [&str; 2] = ["longitude", "lon"];

pub fn normalize_ndvi(raw: &RawTable) -> Result<NdviTable> {
    let (date_idx, date_col) = raw.find_column(&NDVI_DATE_VARIANTS).ok_or_else(|| {
        AppError::Schema(format!(
            "NDVI table has no date column (expected one of: {})",
            NDVI_DATE_VARIANTS.join(", ")
        ))
    })?;
    let id_idx = raw.column_index(PARCEL_ID);
    let ndvi_idx = raw.column_index(NDVI_MEAN);

    let mut columns = vec![DATE];
    if id_idx.is_some() {
        columns.push(PARCEL_ID);
    }
    if ndvi_idx.is_some() {
        columns.push(NDVI_MEAN);
    }

    let mut rows = Vec::with_capacity(raw.len());
    for (row_num, row) in raw.rows().iter().enumerate() {
        let parcel_id = match id_idx {
            Some(i) => parse_key_id(&row[i], PARCEL_ID, row_num)?,
            None => None,
        };
        let date = parse_key_date(&row[date_idx], date_col, row_num)?;
        let ndvi_mean = match ndvi_idx {
            Some(i) => parse_strict_f64(&row[i], NDVI_MEAN, row_num)?,
            None => None,
        };
        rows.push(NdviObservation {
            parcel_id,
            date,
            ndvi_mean,
        });
    }

    debug!(
        "Normalized NDVI table: {} rows, date column '{}'",
        rows.len(),
        date_col
    );
    Ok(NdviTable { columns, rows })
}

pub fn normalize_climate(raw: &RawTable) -> Result<ClimateTable> {
    let (date_idx, sub_daily) = if let Some(i) = raw.column_index(CLIMATE_DAILY_DATE) {
        (i, false)
    } else if let Some(i) = raw.column_index(CLIMATE_TIMESTAMP) {
        (i, true)
    } else {
        return Err(AppError::Schema(format!(
            "Climate table has no date column (expected '{}' or '{}')",
            CLIMATE_DAILY_DATE, CLIMATE_TIMESTAMP
        )));
    };
    let id_idx = raw.column_index(PARCEL_ID);
    let temp_idx = raw.column_index(AIR_TEMPERATURE_C);
    let precip_idx = raw.find_column(&PRECIPITATION_VARIANTS).map(|(i, _)| i);

    let mut columns = vec![DATE];
    if id_idx.is_some() {
        columns.push(PARCEL_ID);
    }
    if temp_idx.is_some() {
        columns.push(AIR_TEMPERATURE_C);
    }
    if precip_idx.is_some() {
        columns.push(PRECIPITATION_M);
    }

    let date_col = if sub_daily {
        CLIMATE_TIMESTAMP
    } else {
        CLIMATE_DAILY_DATE
    };

    let mut readings = Vec::with_capacity(raw.len());
    for (row_num, row) in raw.rows().iter().enumerate() {
        let parcel_id = match id_idx {
            Some(i) => parse_key_id(&row[i], PARCEL_ID, row_num)?,
            None => None,
        };
        readings.push(ClimateObservation {
            parcel_id,
            date: parse_key_date(&row[date_idx], date_col, row_num)?,
            // Non-numeric climate readings are treated as missing
            air_temperature_c: temp_idx.and_then(|i| row[i].as_f64()),
            precipitation_m: precip_idx.and_then(|i| row[i].as_f64()),
        });
    }

    let rows = if sub_daily {
        let before = readings.len();
        let daily = aggregate_daily(readings);
        debug!(
            "Aggregated {} sub-daily climate readings into {} daily rows",
            before,
            daily.len()
        );
        daily
    } else {
        readings
    };

    Ok(ClimateTable { columns, rows })
}

pub fn normalize_parcels(raw: &RawTable) -> Result<ParcelTable> {
    let id_idx = raw.find_column(&PARCEL_ID_VARIANTS).map(|(i, _)| i);
    let name_idx = raw.column_index(NAME);
    let lat_idx = raw.find_column(&LATITUDE_VARIANTS).map(|(i, _)| i);
    let lon_idx = raw.find_column(&LONGITUDE_VARIANTS).map(|(i, _)| i);

    let mut columns = Vec::new();
    for (idx, name) in [
        (id_idx, ID),
        (name_idx, NAME),
        (lat_idx, LATITUDE),
        (lon_idx, LONGITUDE),
    ] {
        if idx.is_some() {
            columns.push(name);
        }
    }

    let mut rows = Vec::with_capacity(raw.len());
    for (row_num, row) in raw.rows().iter().enumerate() {
        let id = match id_idx {
            Some(i) => parse_key_id(&row[i], ID, row_num)?,
            None => None,
        };
        rows.push(Parcel {
            id,
            name: name_idx.and_then(|i| row[i].as_text()),
            latitude: lat_idx.and_then(|i| row[i].as_f64()),
            longitude: lon_idx.and_then(|i| row[i].as_f64()),
        });
    }

    Ok(ParcelTable { columns, rows })
}

/// Reduce readings to one row per (parcel, day): mean temperature and total
/// precipitation over the non-null readings. Groups keep first-seen order.
/// Readings with a null key pass through untouched so validation can reject them.
fn aggregate_daily(readings: Vec<ClimateObservation>) -> Vec<ClimateObservation> {
    #[derive(Default)]
    struct DayAccumulator {
        temp_sum: f64,
        temp_count: usize,
        precip_sum: f64,
        precip_count: usize,
    }

    let mut order: Vec<Option<(i64, NaiveDate)>> = Vec::new();
    let mut passthrough: Vec<ClimateObservation> = Vec::new();
    let mut groups: HashMap<(i64, NaiveDate), DayAccumulator> = HashMap::new();

    for reading in readings {
        let (Some(parcel_id), Some(date)) = (reading.parcel_id, reading.date) else {
            order.push(None);
            passthrough.push(reading);
            continue;
        };
        let acc = groups.entry((parcel_id, date)).or_insert_with(|| {
            order.push(Some((parcel_id, date)));
            DayAccumulator::default()
        });
        if let Some(t) = reading.air_temperature_c {
            acc.temp_sum += t;
            acc.temp_count += 1;
        }
        if let Some(p) = reading.precipitation_m {
            acc.precip_sum += p;
            acc.precip_count += 1;
        }
    }

    let mut passthrough = passthrough.into_iter();
    order
        .into_iter()
        .filter_map(|key| match key {
            Some((parcel_id, date)) => {
                let acc = groups.get(&(parcel_id, date))?;
                Some(ClimateObservation {
                    parcel_id: Some(parcel_id),
                    date: Some(date),
                    air_temperature_c: (acc.temp_count > 0)
                        .then(|| acc.temp_sum / acc.temp_count as f64),
                    precipitation_m: (acc.precip_count > 0).then_some(acc.precip_sum),
                })
            }
            None => passthrough.next(),
        })
        .collect()
}

fn parse_key_id(value: &Value, column: &str, row_num: usize) -> Result<Option<i64>> {
    if value.is_null() {
        return Ok(None);
    }
    value.as_i64().map(Some).ok_or_else(|| {
        AppError::Parse(format!(
            "Row {}: column '{}' is not an integer: '{}'",
            row_num + 1,
            column,
            value
        ))
    })
}

fn parse_key_date(value: &Value, column: &str, row_num: usize) -> Result<Option<NaiveDate>> {
    if value.is_null() {
        return Ok(None);
    }
    value.as_date().map(Some).ok_or_else(|| {
        AppError::Parse(format!(
            "Row {}: column '{}' is not a date: '{}'",
            row_num + 1,
            column,
            value
        ))
    })
}

fn parse_strict_f64(value: &Value, column: &str, row_num: usize) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Float(f) if f.is_nan() => Ok(None),
        other => other.as_f64().map(Some).ok_or_else(|| {
            AppError::Parse(format!(
                "Row {}: column '{}' is not numeric: '{}'",
                row_num + 1,
                column,
                other
            ))
        }),
    }
}
