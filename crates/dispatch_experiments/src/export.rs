//! Result export. Parquet/Arrow are dropped from the teacher's version —
//! there is no large columnar parameter grid here, just a short list of
//! named scenario outcomes, so CSV/JSON cover every real use case.

use std::fs::File;
use std::path::Path;

use crate::scenarios::ScenarioOutcome;

pub fn export_to_json(
    results: &[ScenarioOutcome],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

pub fn export_to_csv(
    results: &[ScenarioOutcome],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if results.is_empty() {
        return Err("no results to export".into());
    }

    let file = File::create(path)?;
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(["scenario", "passed", "detail", "elapsed_ms"])?;
    for result in results {
        wtr.write_record([
            result.scenario.clone(),
            result.passed.to_string(),
            result.detail.clone(),
            result.elapsed_ms.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Number of scenarios that failed, for a quick exit-code check by callers.
pub fn failure_count(results: &[ScenarioOutcome]) -> usize {
    results.iter().filter(|r| !r.passed).count()
}
