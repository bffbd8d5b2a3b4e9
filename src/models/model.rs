//! Model evaluation for the 3P heating and 5P change-point families.
//!
//! The fitter relies on three primitive operations:
//! - build the ramp regressors for a temperature and candidate change points (for OLS)
//! - reassemble typed parameters from solved coefficients + change points
//! - predict E(T) given parameters (for SSE, residuals and plots)
//!
//! All of them are pure and total: any real temperature is valid input.

use crate::domain::{ModelKind, ModelParameters};
use crate::math::{cooling_ramp, heating_ramp};

/// Fill the ramp regressors for the given model kind (intercept excluded).
///
/// # Panics
/// Panics if `out` does not have length `kind.change_point_count()` or
/// `change_points` is shorter than that. Callers size these correctly.
pub fn fill_ramp_row(kind: ModelKind, t: f64, change_points: &[f64], out: &mut [f64]) {
    match kind {
        ModelKind::ThreeParamHeating => {
            out[0] = heating_ramp(t, change_points[0]);
        }
        ModelKind::FiveParam => {
            out[0] = heating_ramp(t, change_points[0]);
            out[1] = cooling_ramp(t, change_points[1]);
        }
    }
}

/// Build typed parameters from solved coefficients `[base, slope_heat, (slope_cool)]`.
///
/// Returns `None` if the slice lengths do not match the model kind.
pub fn assemble_parameters(
    kind: ModelKind,
    coefficients: &[f64],
    change_points: &[f64],
) -> Option<ModelParameters> {
    match (kind, coefficients, change_points) {
        (ModelKind::ThreeParamHeating, &[base, slope_heat], &[change_point]) => {
            Some(ModelParameters::ThreeParamHeating {
                base,
                slope_heat,
                change_point,
            })
        }
        (ModelKind::FiveParam, &[base, slope_heat, slope_cool], &[cp_heat, cp_cool]) => {
            Some(ModelParameters::FiveParam {
                base,
                slope_heat,
                cp_heat,
                slope_cool,
                cp_cool,
            })
        }
        _ => None,
    }
}

/// Predict energy use at temperature `t`.
#[inline]
pub fn predict(params: &ModelParameters, t: f64) -> f64 {
    match *params {
        ModelParameters::ThreeParamHeating {
            base,
            slope_heat,
            change_point,
        } => base + slope_heat * heating_ramp(t, change_point),
        ModelParameters::FiveParam {
            base,
            slope_heat,
            cp_heat,
            slope_cool,
            cp_cool,
        } => base + slope_heat * heating_ramp(t, cp_heat) + slope_cool * cooling_ramp(t, cp_cool),
    }
}

/// Predict one value per input temperature.
pub fn predict_series(params: &ModelParameters, temperatures: &[f64]) -> Vec<f64> {
    temperatures.iter().map(|&t| predict(params, t)).collect()
}
