//! Reporting utilities: residuals and outlier rankings.

pub mod format;

use crate::domain::{ModelParameters, Observation, ObservationResidual};
use crate::error::AppError;
use crate::models::predict;

/// Largest residuals on each side (top-N each).
#[derive(Debug, Clone)]
pub struct Outliers {
    /// Actual above prediction (positive residual).
    pub over: Vec<ObservationResidual>,
    /// Actual below prediction (negative residual).
    pub under: Vec<ObservationResidual>,
}

/// Compute fitted values and residuals for each observation.
pub fn compute_residuals(
    observations: &[Observation],
    params: &ModelParameters,
) -> Result<Vec<ObservationResidual>, AppError> {
    let mut out = Vec::with_capacity(observations.len());
    for o in observations {
        let predicted = predict(params, o.temperature);
        if !predicted.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        out.push(ObservationResidual {
            observation: o.clone(),
            predicted,
            residual: o.energy - predicted,
        });
    }
    Ok(out)
}

/// Rank the periods the model fits worst, on each side of the curve.
pub fn rank_outliers(residuals: &[ObservationResidual], top_n: usize) -> Outliers {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| b.residual.total_cmp(&a.residual));

    let over = sorted
        .iter()
        .filter(|r| r.residual > 0.0)
        .take(top_n)
        .cloned()
        .collect();
    let under = sorted
        .iter()
        .rev()
        .filter(|r| r.residual < 0.0)
        .take(top_n)
        .cloned()
        .collect();

    Outliers { over, under }
}
