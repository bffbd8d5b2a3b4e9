//! Export results to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{ModelKind, Observation, ObservationResidual};
use crate::error::AppError;
use crate::savings::PeriodSavings;

/// Write per-observation fit results to a CSV file.
pub fn write_results_csv(path: &Path, residuals: &[ObservationResidual], kind: ModelKind) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(file, "label,temperature,actual,predicted,residual,model")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    let model = format!("{kind:?}");
    for r in residuals {
        let o = &r.observation;
        writeln!(
            file,
            "{},{:.4},{:.4},{:.4},{:.4},{}",
            o.label.as_deref().unwrap_or(""),
            o.temperature,
            o.energy,
            r.predicted,
            r.residual,
            model,
        )
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

/// Write per-period savings to a CSV file.
pub fn write_savings_csv(path: &Path, periods: &[PeriodSavings]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create savings CSV '{}': {e}", path.display())))?;
    for p in periods {
        writer
            .serialize(p)
            .map_err(|e| AppError::new(2, format!("Failed to write savings CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush savings CSV: {e}")))?;
    Ok(())
}

/// Write observations in the ingest format (`month,<temperature>,<energy>`).
pub fn write_observations_csv<W: Write>(
    sink: W,
    observations: &[Observation],
    temperature_column: &str,
    energy_column: &str,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(sink);
    writer
        .write_record(["month", temperature_column, energy_column])
        .map_err(|e| AppError::new(2, format!("Failed to write CSV header: {e}")))?;
    for (i, o) in observations.iter().enumerate() {
        let label = o.label.clone().unwrap_or_else(|| (i + 1).to_string());
        writer
            .write_record([label, format!("{:.2}", o.temperature), format!("{:.2}", o.energy)])
            .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}
