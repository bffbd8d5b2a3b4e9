//! Goodness-of-fit statistics (ASHRAE Guideline 14 conventions).
//!
//! - `NMBE    = 100 · Σ(a − p) / ((n − 1) · ā)`
//! - `CV(RMSE) = 100 · sqrt(Σ(a − p)² / (n − 2)) / ā`
//! - `R²      = 1 − SS_res / SS_tot`
//!
//! The `n − 1` / `n − 2` divisors are fixed regardless of how many parameters
//! the model actually has; acceptance limits are calibrated against exactly this
//! convention.
//!
//! A zero mean of the actual series makes NMBE and CV(RMSE) non-finite. That is a
//! precondition violation for metered energy and is not guarded.

use serde::{Deserialize, Serialize};

use crate::domain::Granularity;

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sum of squared residuals.
///
/// # Panics
/// Panics if the series lengths differ.
pub fn sse(actual: &[f64], predicted: &[f64]) -> f64 {
    assert_eq!(actual.len(), predicted.len(), "actual/predicted length mismatch");
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum()
}

/// Normalized mean bias error, in percent.
///
/// # Panics
/// Panics if the series lengths differ.
pub fn nmbe(actual: &[f64], predicted: &[f64]) -> f64 {
    assert_eq!(actual.len(), predicted.len(), "actual/predicted length mismatch");
    let n = actual.len() as f64;
    let sum_err: f64 = actual.iter().zip(predicted).map(|(a, p)| a - p).sum();
    sum_err / ((n - 1.0) * mean(actual)) * 100.0
}

/// Coefficient of variation of the RMSE, in percent.
///
/// # Panics
/// Panics if the series lengths differ.
pub fn cvrmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    let mse = sse(actual, predicted) / (n - 2.0);
    mse.sqrt() / mean(actual) * 100.0
}

/// Coefficient of determination.
///
/// # Panics
/// Panics if the series lengths differ.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let y_bar = mean(actual);
    let ss_tot: f64 = actual.iter().map(|a| (a - y_bar) * (a - y_bar)).sum();
    let ss_res = sse(actual, predicted);
    1.0 - ss_res / ss_tot
}

/// The three fit statistics for one (actual, predicted) pair of series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub nmbe: f64,
    pub cvrmse: f64,
    pub r_squared: f64,
}

impl ValidationReport {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            nmbe: nmbe(actual, predicted),
            cvrmse: cvrmse(actual, predicted),
            r_squared: r_squared(actual, predicted),
        }
    }

    pub fn assess(&self, criteria: &Criteria) -> Assessment {
        Assessment {
            nmbe_pass: self.nmbe.abs() <= criteria.max_abs_nmbe,
            cvrmse_pass: self.cvrmse <= criteria.max_cvrmse,
            r_squared_pass: self.r_squared >= criteria.min_r_squared,
        }
    }
}

/// Acceptance limits for a calibrated baseline model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criteria {
    /// Limit on `|NMBE|`, in percent.
    pub max_abs_nmbe: f64,
    /// Limit on CV(RMSE), in percent.
    pub max_cvrmse: f64,
    pub min_r_squared: f64,
}

impl Criteria {
    pub fn for_granularity(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Monthly => Self {
                max_abs_nmbe: 5.0,
                max_cvrmse: 15.0,
                min_r_squared: 0.75,
            },
            Granularity::Hourly => Self {
                max_abs_nmbe: 10.0,
                max_cvrmse: 30.0,
                min_r_squared: 0.75,
            },
        }
    }
}

/// Per-statistic pass/fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub nmbe_pass: bool,
    pub cvrmse_pass: bool,
    pub r_squared_pass: bool,
}

impl Assessment {
    pub fn passes(&self) -> bool {
        self.nmbe_pass && self.cvrmse_pass && self.r_squared_pass
    }
}
