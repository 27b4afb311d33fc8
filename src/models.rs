use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical NDVI observation. Key fields stay optional until validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NdviObservation {
    pub parcel_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub ndvi_mean: Option<f64>,
}

/// Canonical daily climate observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateObservation {
    pub parcel_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub air_temperature_c: Option<f64>,
    pub precipitation_m: Option<f64>,
}

/// Parcel registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Canonical rows together with the canonical columns the source provided.
#[derive(Debug, Clone, PartialEq)]
pub struct Canonical<R> {
    pub columns: Vec<&'static str>,
    pub rows: Vec<R>,
}

impl<R> Canonical<R> {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| *c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub type NdviTable = Canonical<NdviObservation>;
pub type ClimateTable = Canonical<ClimateObservation>;
pub type ParcelTable = Canonical<Parcel>;

impl ParcelTable {
    pub fn name_of(&self, parcel_id: i64) -> Option<&str> {
        self.rows
            .iter()
            .find(|p| p.id == Some(parcel_id))
            .and_then(|p| p.name.as_deref())
    }
}

/// One NDVI observation joined with its same-day climate aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedRow {
    pub parcel_id: i64,
    pub date: NaiveDate,
    pub ndvi_mean: Option<f64>,
    pub air_temperature_c: Option<f64>,
    pub precipitation_m: Option<f64>,
}

pub type IntegratedTable = Vec<IntegratedRow>;

/// All integrated rows of a single parcel.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelSlice {
    pub parcel_id: i64,
    pub rows: Vec<IntegratedRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressLevel {
    Low,
    Medium,
    High,
}

impl StressLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::Low => "low",
            StressLevel::Medium => "medium",
            StressLevel::High => "high",
        }
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "NO ACTION REQUIRED")]
    NoAction,
    #[serde(rename = "MONITOR CONDITIONS")]
    Monitor,
    #[serde(rename = "SCHEDULE IRRIGATION")]
    ScheduleIrrigation,
    #[serde(rename = "INSUFFICIENT DATA")]
    InsufficientData,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::NoAction => "NO ACTION REQUIRED",
            Recommendation::Monitor => "MONITOR CONDITIONS",
            Recommendation::ScheduleIrrigation => "SCHEDULE IRRIGATION",
            Recommendation::InsufficientData => "INSUFFICIENT DATA",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-parcel output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelResult {
    pub parcel_id: i64,
    pub mean_ndvi: Option<f64>,
    pub water_stress: Option<f64>,
    pub forecast_7d: Option<f64>,
    pub stress_level: Option<StressLevel>,
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub parcel_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub parcel_count: usize,
    /// Percentage (0-100) of parcels with a defined stress level.
    pub classified_pct: f64,
    pub mean_water_stress: Option<f64>,
    pub low_count: usize,
    pub medium_count: usize,
    pub high_count: usize,
    pub unclassified_count: usize,
}
