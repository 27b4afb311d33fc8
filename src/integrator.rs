use crate::error::{AppError, Result};
use crate::models::{ClimateTable, IntegratedRow, IntegratedTable, NdviTable, ParcelTable};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Left-join NDVI observations with same-day climate rows, restricted to
/// parcels present in the registry.
///
/// Every NDVI observation of a known parcel survives; climate fields are
/// `None` when no climate row matches. Observations of unknown parcels are
/// dropped. Dates must match exactly. A climate key with more than one row is
/// an error only when a kept NDVI observation joins against it.
pub fn integrate(
    ndvi: &NdviTable,
    climate: &ClimateTable,
    parcels: &ParcelTable,
) -> Result<IntegratedTable> {
    let known: HashSet<i64> = parcels.rows.iter().filter_map(|p| p.id).collect();

    let mut climate_by_key: HashMap<(i64, NaiveDate), Vec<(Option<f64>, Option<f64>)>> =
        HashMap::with_capacity(climate.len());
    for row in &climate.rows {
        let key = require_key(row.parcel_id, row.date, "climate")?;
        climate_by_key
            .entry(key)
            .or_default()
            .push((row.air_temperature_c, row.precipitation_m));
    }

    let mut integrated = Vec::with_capacity(ndvi.len());
    let mut unknown_dropped = 0usize;
    let mut without_climate = 0usize;

    for obs in &ndvi.rows {
        let (parcel_id, date) = require_key(obs.parcel_id, obs.date, "NDVI")?;
        if !known.contains(&parcel_id) {
            unknown_dropped += 1;
            continue;
        }

        let (air_temperature_c, precipitation_m) =
            match climate_by_key.get(&(parcel_id, date)).map(Vec::as_slice) {
                Some([values]) => *values,
                Some([]) | None => {
                    without_climate += 1;
                    (None, None)
                }
                Some(_) => {
                    return Err(AppError::Validation(format!(
                        "Climate table has more than one row for parcel {} on {}",
                        parcel_id, date
                    )));
                }
            };

        integrated.push(IntegratedRow {
            parcel_id,
            date,
            ndvi_mean: obs.ndvi_mean,
            air_temperature_c,
            precipitation_m,
        });
    }

    if unknown_dropped > 0 {
        debug!(
            "Dropped {} NDVI observations for parcels missing from the registry",
            unknown_dropped
        );
    }
    info!(
        "Integrated {} rows ({} without matching climate data)",
        integrated.len(),
        without_climate
    );

    Ok(integrated)
}

fn require_key(
    parcel_id: Option<i64>,
    date: Option<NaiveDate>,
    source: &str,
) -> Result<(i64, NaiveDate)> {
    match (parcel_id, date) {
        (Some(id), Some(date)) => Ok((id, date)),
        _ => Err(AppError::Validation(format!(
            "{} table contains a row with a null parcel_id or date",
            source
        ))),
    }
}
