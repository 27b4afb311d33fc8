use crate::models::{
    GlobalSummary, ParcelResult, ParcelSlice, ParcelTable, Recommendation, StressLevel,
};
use crate::stress;
use tracing::warn;

/// Scores are reported with a fixed confidence until a model provides one
pub const CONFIDENCE: f64 = 1.0;

/// Round half away from zero to three decimals.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Score a single parcel slice.
///
/// Forecast and tier are derived from the unrounded stress value; only the
/// reported numbers are rounded.
pub fn score_parcel(slice: &ParcelSlice, parcel_name: Option<String>) -> ParcelResult {
    let mean_ndvi = stress::vigor(slice);
    let water_stress = stress::water_stress(slice);
    let forecast_7d = water_stress.map(stress::forecast_from_stress);
    let stress_level = stress::classify(water_stress);
    let recommendation =
        stress::recommendation(stress_level).unwrap_or(Recommendation::InsufficientData);

    ParcelResult {
        parcel_id: slice.parcel_id,
        mean_ndvi: mean_ndvi.map(round3),
        water_stress: water_stress.map(round3),
        forecast_7d: forecast_7d.map(round3),
        stress_level,
        confidence: CONFIDENCE,
        recommendation,
        parcel_name,
    }
}

/// One result per slice, in slice order.
pub fn build_results(slices: &[ParcelSlice], parcels: &ParcelTable) -> Vec<ParcelResult> {
    slices
        .iter()
        .map(|slice| {
            let name = parcels.name_of(slice.parcel_id).map(str::to_string);
            if name.is_none() {
                warn!("No name registered for parcel {}", slice.parcel_id);
            }
            score_parcel(slice, name)
        })
        .collect()
}

pub fn summarize(results: &[ParcelResult]) -> GlobalSummary {
    let parcel_count = results.len();
    let count_level = |level: StressLevel| {
        results
            .iter()
            .filter(|r| r.stress_level == Some(level))
            .count()
    };
    let low_count = count_level(StressLevel::Low);
    let medium_count = count_level(StressLevel::Medium);
    let high_count = count_level(StressLevel::High);
    let classified = low_count + medium_count + high_count;

    let stresses: Vec<f64> = results.iter().filter_map(|r| r.water_stress).collect();
    let mean_water_stress = (!stresses.is_empty())
        .then(|| round3(stresses.iter().sum::<f64>() / stresses.len() as f64));

    let classified_pct = if parcel_count > 0 {
        round3(classified as f64 / parcel_count as f64 * 100.0)
    } else {
        0.0
    };

    GlobalSummary {
        parcel_count,
        classified_pct,
        mean_water_stress,
        low_count,
        medium_count,
        high_count,
        unclassified_count: parcel_count - classified,
    }
}
