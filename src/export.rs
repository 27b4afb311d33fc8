use crate::error::Result;
use crate::models::{GlobalSummary, ParcelResult, StressLevel};
use crate::pipeline::PipelineOutput;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RESULTS_FILE: &str = "results.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const REPORT_FILE: &str = "report.md";

#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub results: PathBuf,
    pub summary: PathBuf,
    pub report: PathBuf,
}

/// Write the results table, summary and Markdown report into `output_dir`.
pub fn export_results(output: &PipelineOutput, output_dir: &Path) -> Result<ExportPaths> {
    std::fs::create_dir_all(output_dir)?;

    let paths = ExportPaths {
        results: output_dir.join(RESULTS_FILE),
        summary: output_dir.join(SUMMARY_FILE),
        report: output_dir.join(REPORT_FILE),
    };

    std::fs::write(&paths.results, results_to_csv(&output.results)?)?;
    std::fs::write(
        &paths.summary,
        serde_json::to_string_pretty(&output.summary)?,
    )?;
    std::fs::write(&paths.report, render_report(output))?;

    info!(
        "Exported {} parcel results to {}",
        output.results.len(),
        output_dir.display()
    );
    Ok(paths)
}

pub fn results_to_csv(results: &[ParcelResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in results {
        wtr.serialize(record)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn opt_num(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

pub fn render_summary(summary: &GlobalSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Parcels analysed:   {}", summary.parcel_count);
    let _ = writeln!(out, "Classified:         {:.1}%", summary.classified_pct);
    let _ = writeln!(
        out,
        "Mean water stress:  {}",
        opt_num(summary.mean_water_stress)
    );
    let _ = writeln!(
        out,
        "Stress levels:      {} low, {} medium, {} high, {} unclassified",
        summary.low_count, summary.medium_count, summary.high_count, summary.unclassified_count
    );
    out
}

pub fn render_parcel(result: &ParcelResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Parcel {} ({})",
        result.parcel_id,
        result.parcel_name.as_deref().unwrap_or("unnamed")
    );
    let _ = writeln!(out, "  Mean NDVI:       {}", opt_num(result.mean_ndvi));
    let _ = writeln!(out, "  Water stress:    {}", opt_num(result.water_stress));
    let _ = writeln!(out, "  7-day forecast:  {}", opt_num(result.forecast_7d));
    let _ = writeln!(
        out,
        "  Stress level:    {}",
        result.stress_level.map_or("-", |l| l.as_str())
    );
    let _ = writeln!(out, "  Confidence:      {:.1}", result.confidence);
    let _ = writeln!(out, "  Recommendation:  {}", result.recommendation);
    out
}

pub fn render_report(output: &PipelineOutput) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Vineyard Water Stress Report\n");
    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "```");
    out.push_str(&render_summary(&output.summary));
    let _ = writeln!(out, "```\n");

    let _ = writeln!(out, "## Parcels\n");
    let _ = writeln!(
        out,
        "| Parcel | Name | Mean NDVI | Water stress | Forecast 7d | Level | Recommendation |"
    );
    let _ = writeln!(out, "|---|---|---|---|---|---|---|");
    for r in &output.results {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            r.parcel_id,
            r.parcel_name.as_deref().unwrap_or("-"),
            opt_num(r.mean_ndvi),
            opt_num(r.water_stress),
            opt_num(r.forecast_7d),
            r.stress_level.map_or("-", |l| l.as_str()),
            r.recommendation
        );
    }

    let irrigate: Vec<&ParcelResult> = output
        .results
        .iter()
        .filter(|r| r.stress_level == Some(StressLevel::High))
        .collect();

    let _ = writeln!(out, "\n## Irrigation required\n");
    if irrigate.is_empty() {
        let _ = writeln!(out, "No parcel is in the high stress tier.");
    } else {
        for r in irrigate {
            let _ = writeln!(
                out,
                "- Parcel {} ({}): forecast {}",
                r.parcel_id,
                r.parcel_name.as_deref().unwrap_or("unnamed"),
                opt_num(r.forecast_7d)
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recommendation;

    fn result(parcel_id: i64, stress: Option<f64>, level: Option<StressLevel>) -> ParcelResult {
        ParcelResult {
            parcel_id,
            mean_ndvi: Some(0.5),
            water_stress: stress,
            forecast_7d: stress.map(|s| s + 0.05),
            stress_level: level,
            confidence: 1.0,
            recommendation: Recommendation::InsufficientData,
            parcel_name: Some(format!("P{}", parcel_id)),
        }
    }

    #[test]
    fn test_results_csv_leaves_absent_fields_empty() {
        let csv = results_to_csv(&[result(3, None, None)]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("parcel_id,mean_ndvi,water_stress,forecast_7d,stress_level,confidence,recommendation,parcel_name")
        );
        assert_eq!(lines.next(), Some("3,0.5,,,,1.0,INSUFFICIENT DATA,P3"));
    }

    #[test]
    fn test_report_lists_high_parcels() {
        let output = PipelineOutput {
            results: vec![
                result(1, Some(0.2), Some(StressLevel::Low)),
                result(2, Some(0.7), Some(StressLevel::High)),
            ],
            summary: crate::results::summarize(&[]),
        };
        let report = render_report(&output);
        assert!(report.contains("- Parcel 2 (P2): forecast 0.750"));
        assert!(!report.contains("- Parcel 1"));
    }
}
