//! Per-parcel vigor and water-stress scoring.
//!
//! Every function here is pure and looks only at a single parcel's slice.
//! Missing data is reported as `None` and propagates; no function substitutes
//! a placeholder number.

use crate::models::{ParcelSlice, Recommendation, StressLevel};

/// Temperature (°C) at which the heat factor equals 1
pub const TEMPERATURE_REFERENCE_C: f64 = 30.0;

pub const FORECAST_OFFSET: f64 = 0.05;
pub const FORECAST_CAP: f64 = 1.2;

/// Stress below this is "low"
pub const LOW_THRESHOLD: f64 = 0.3;
/// Stress at or above this is "high"
pub const HIGH_THRESHOLD: f64 = 0.6;

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Mean NDVI over the non-null observations.
pub fn vigor(slice: &ParcelSlice) -> Option<f64> {
    mean(slice.rows.iter().map(|r| r.ndvi_mean))
}

fn mean_temperature(slice: &ParcelSlice) -> Option<f64> {
    mean(slice.rows.iter().map(|r| r.air_temperature_c))
}

/// `(1 - mean NDVI) * (mean temperature / 30)`, unclamped.
///
/// The result may exceed 1 or be negative for extreme inputs.
pub fn water_stress(slice: &ParcelSlice) -> Option<f64> {
    let ndvi = vigor(slice)?;
    let temperature = mean_temperature(slice)?;
    Some((1.0 - ndvi) * (temperature / TEMPERATURE_REFERENCE_C))
}

/// Fixed-offset seven day outlook capped at [`FORECAST_CAP`].
pub fn forecast_7d(slice: &ParcelSlice) -> Option<f64> {
    water_stress(slice).map(forecast_from_stress)
}

pub(crate) fn forecast_from_stress(stress: f64) -> f64 {
    (stress + FORECAST_OFFSET).min(FORECAST_CAP)
}

pub fn classify(stress: Option<f64>) -> Option<StressLevel> {
    let stress = stress?;
    Some(if stress < LOW_THRESHOLD {
        StressLevel::Low
    } else if stress < HIGH_THRESHOLD {
        StressLevel::Medium
    } else {
        StressLevel::High
    })
}

/// Action for a stress tier; `None` when the tier is unknown.
pub fn recommendation(level: Option<StressLevel>) -> Option<Recommendation> {
    level.map(|level| match level {
        StressLevel::Low => Recommendation::NoAction,
        StressLevel::Medium => Recommendation::Monitor,
        StressLevel::High => Recommendation::ScheduleIrrigation,
    })
}
