use crate::aggregator::group_by_parcel;
use crate::config::{AnalysisConfig, Config};
use crate::error::{AppError, Result};
use crate::integrator::integrate;
use crate::loader::load_csv_with_threshold;
use crate::models::{GlobalSummary, ParcelResult};
use crate::normalizer::{normalize_climate, normalize_ndvi, normalize_parcels};
use crate::results::{build_results, summarize};
use crate::table::RawTable;
use crate::validation::{validate_climate, validate_integrated, validate_ndvi, validate_parcels};
use std::path::Path;
use tracing::info;

/// The three source tables, already decoded.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub ndvi: RawTable,
    pub climate: RawTable,
    pub parcels: RawTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub results: Vec<ParcelResult>,
    pub summary: GlobalSummary,
}

impl PipelineOutput {
    pub fn parcel(&self, parcel_id: i64) -> Option<&ParcelResult> {
        self.results.iter().find(|r| r.parcel_id == parcel_id)
    }
}

/// Run normalization, validation, integration and scoring.
///
/// The first schema or validation error aborts the run. Parcels without
/// usable observations still produce a result with absent scores.
pub fn run_pipeline(inputs: &PipelineInputs, analysis: &AnalysisConfig) -> Result<PipelineOutput> {
    let ndvi = normalize_ndvi(&inputs.ndvi)?;
    let mut climate = normalize_climate(&inputs.climate)?;
    let parcels = normalize_parcels(&inputs.parcels)?;

    validate_ndvi(&ndvi)?;
    validate_climate(&mut climate)?;
    validate_parcels(&parcels)?;

    let mut integrated = integrate(&ndvi, &climate, &parcels)?;
    validate_integrated(&integrated)?;

    let filter = &analysis.parcels;
    if !filter.is_empty() {
        integrated.retain(|row| filter.matches(row.parcel_id, parcels.name_of(row.parcel_id)));
        if integrated.is_empty() {
            return Err(AppError::Validation(
                "No integrated observations match the configured parcel filter".to_string(),
            ));
        }
    }

    let slices = group_by_parcel(&integrated);
    let results = build_results(&slices, &parcels);
    let summary = summarize(&results);

    info!(
        "Scored {} parcels: {} low, {} medium, {} high, {} without data",
        summary.parcel_count,
        summary.low_count,
        summary.medium_count,
        summary.high_count,
        summary.unclassified_count
    );

    Ok(PipelineOutput { results, summary })
}

/// The parcel registry tolerates no malformed rows
const REGISTRY_FAILURE_THRESHOLD: f64 = 0.0;

fn load_table(path: &Path, failure_threshold: f64) -> Result<RawTable> {
    let (table, stats) = load_csv_with_threshold(path, failure_threshold)?;
    info!(
        "Loaded {}: {} rows ({} skipped)",
        path.display(),
        stats.loaded_successfully,
        stats.load_failures
    );
    Ok(table)
}

/// Load the configured input files and run the pipeline over them.
pub fn run_from_config(config: &Config) -> Result<PipelineOutput> {
    let threshold = config.inputs.failure_threshold;
    let inputs = PipelineInputs {
        ndvi: load_table(&config.inputs.ndvi, threshold)?,
        climate: load_table(&config.inputs.climate, threshold)?,
        // A skipped registry row would silently drop that parcel from the run
        parcels: load_table(&config.inputs.parcels, REGISTRY_FAILURE_THRESHOLD)?,
    };
    run_pipeline(&inputs, &config.analysis)
}
