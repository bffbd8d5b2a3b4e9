//! Read/write model JSON files.
//!
//! Model JSON is the portable representation of a fitted baseline:
//! - model kind + parameters (tagged by `kind`)
//! - fit quality and Guideline 14 statistics
//! - a precomputed curve over the observed temperature range for quick plotting
//!
//! The schema is defined by `domain::ModelFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveGrid, Granularity, ModelFile, ModelParameters};
use crate::error::AppError;
use crate::fit::selection::BaselineFit;
use crate::io::ingest::DatasetStats;
use crate::models::predict;

const GRID_POINTS: usize = 101;

/// Assemble the JSON document for a fitted baseline.
pub fn build_model_file(baseline: &BaselineFit, stats: &DatasetStats, granularity: Granularity) -> ModelFile {
    let (temperature, energy) = build_grid(
        baseline.parameters(),
        stats.temperature_min,
        stats.temperature_max,
        GRID_POINTS,
    );
    ModelFile {
        tool: env!("CARGO_PKG_NAME").to_string(),
        generated_at: Utc::now(),
        granularity,
        parameters: *baseline.parameters(),
        quality: baseline.quality,
        validation: baseline.validation,
        grid: CurveGrid { temperature, energy },
    }
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, model: &ModelFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, model)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let model: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    Ok(model)
}

/// Evenly spaced predictions over `[t_min, t_max]`.
pub fn build_grid(params: &ModelParameters, t_min: f64, t_max: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
    let n = n.max(2);
    let mut t0 = t_min;
    let mut t1 = t_max;
    if !(t0.is_finite() && t1.is_finite()) || t1 < t0 {
        t0 = 0.0;
        t1 = 100.0;
    }
    if (t1 - t0).abs() < 1e-9 {
        t0 -= 0.5;
        t1 += 0.5;
    }

    let mut temps = Vec::with_capacity(n);
    let mut energy = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let t = t0 + u * (t1 - t0);
        temps.push(t);
        energy.push(predict(params, t));
    }
    (temps, energy)
}
