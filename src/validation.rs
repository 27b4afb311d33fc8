use crate::error::{AppError, Result};
use crate::models::{ClimateTable, IntegratedTable, NdviTable, ParcelTable};
use crate::normalizer::{AIR_TEMPERATURE_C, DATE, ID, NDVI_MEAN, PARCEL_ID, PRECIPITATION_M};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const NDVI_MIN: f64 = -1.0;
pub const NDVI_MAX: f64 = 1.0;

/// Plausible air temperature range in °C; readings outside are treated as missing
pub const TEMPERATURE_MIN_C: f64 = -30.0;
pub const TEMPERATURE_MAX_C: f64 = 60.0;

pub const PRECIPITATION_MIN_M: f64 = 0.0;

/// Number of climate cells nulled by [`validate_climate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoercionStats {
    pub temperature_nulled: usize,
    pub precipitation_nulled: usize,
}

impl CoercionStats {
    pub fn total(&self) -> usize {
        self.temperature_nulled + self.precipitation_nulled
    }
}

fn require_columns(table_name: &str, present: &[&str], required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|c| !present.contains(*c))
        .copied()
        .collect();

    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "{} table is missing required column{}: {}",
            table_name,
            if missing.len() > 1 { "s" } else { "" },
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Check NDVI structure, keys and value range. The table is left untouched.
pub fn validate_ndvi(table: &NdviTable) -> Result<()> {
    require_columns("NDVI", &table.columns, &[PARCEL_ID, DATE, NDVI_MEAN])?;

    for (i, row) in table.rows.iter().enumerate() {
        if row.parcel_id.is_none() {
            return Err(AppError::Validation(format!(
                "NDVI row {} has a null parcel_id",
                i + 1
            )));
        }
        if row.date.is_none() {
            return Err(AppError::Validation(format!(
                "NDVI row {} has a null date",
                i + 1
            )));
        }
        if let Some(v) = row.ndvi_mean {
            if !(NDVI_MIN..=NDVI_MAX).contains(&v) {
                return Err(AppError::Validation(format!(
                    "NDVI row {} (parcel {}): ndvi_mean {} outside [{}, {}]",
                    i + 1,
                    row.parcel_id.unwrap_or_default(),
                    v,
                    NDVI_MIN,
                    NDVI_MAX
                )));
            }
        }
    }

    debug!("NDVI table valid: {} rows", table.len());
    Ok(())
}

/// Check climate structure and keys, then null implausible readings in place.
///
/// Out-of-range temperature and negative precipitation are not fatal: the
/// individual cell is set to `None` and the row is kept.
pub fn validate_climate(table: &mut ClimateTable) -> Result<CoercionStats> {
    require_columns(
        "Climate",
        &table.columns,
        &[PARCEL_ID, DATE, AIR_TEMPERATURE_C, PRECIPITATION_M],
    )?;

    for (i, row) in table.rows.iter().enumerate() {
        if row.parcel_id.is_none() || row.date.is_none() {
            return Err(AppError::Validation(format!(
                "Climate row {} has a null parcel_id or date",
                i + 1
            )));
        }
    }

    let mut stats = CoercionStats::default();
    for row in table.rows.iter_mut() {
        if row
            .air_temperature_c
            .is_some_and(|t| !(TEMPERATURE_MIN_C..=TEMPERATURE_MAX_C).contains(&t))
        {
            row.air_temperature_c = None;
            stats.temperature_nulled += 1;
        }
        if row.precipitation_m.is_some_and(|p| p < PRECIPITATION_MIN_M) {
            row.precipitation_m = None;
            stats.precipitation_nulled += 1;
        }
    }

    if stats.total() > 0 {
        warn!(
            "Climate readings out of range set to missing: {} temperature, {} precipitation",
            stats.temperature_nulled, stats.precipitation_nulled
        );
    }

    Ok(stats)
}

/// Parcel ids form the registry's primary key: present, non-null, unique.
pub fn validate_parcels(table: &ParcelTable) -> Result<()> {
    if !table.has_column(ID) {
        return Err(AppError::Validation(
            "Parcel table is missing the id column".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(table.len());
    for (i, parcel) in table.rows.iter().enumerate() {
        let id = parcel.id.ok_or_else(|| {
            AppError::Validation(format!("Parcel row {} has a null id", i + 1))
        })?;
        if !seen.insert(id) {
            return Err(AppError::Validation(format!(
                "Duplicate parcel id {} in parcel table",
                id
            )));
        }
    }

    debug!("Parcel table valid: {} parcels", table.len());
    Ok(())
}

/// The joined table must be non-empty with unique (parcel_id, date) keys.
pub fn validate_integrated(table: &IntegratedTable) -> Result<()> {
    if table.is_empty() {
        return Err(AppError::Validation(
            "Integrated dataset is empty: no NDVI observations for known parcels".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(table.len());
    for row in table {
        if !seen.insert((row.parcel_id, row.date)) {
            return Err(AppError::Validation(format!(
                "Duplicate observation for parcel {} on {}",
                row.parcel_id, row.date
            )));
        }
    }
    Ok(())
}
