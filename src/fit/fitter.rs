//! Low-level fitting routines for a single model kind.
//!
//! Given:
//! - temperatures `T_i`
//! - observed energy `E_i`
//! - a list of candidate change-point tuples
//!
//! we solve, for each tuple:
//! - the OLS problem for the intercept and ramp slopes
//! - the resulting SSE
//!
//! and return the best (lowest SSE) admissible candidate. Candidates are
//! rejected when the normal equations are singular or a slope is negative.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{FitResult, ModelKind, ModelParameters, Observation};
use crate::fit::grid::{GridConfig, change_point_grid};
use crate::math::solve_ramp_regression;
use crate::models::{assemble_parameters, fill_ramp_row, predict};

/// An admissible grid candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Position in the grid (used for deterministic tie-breaks).
    pub idx: usize,
    pub change_points: Vec<f64>,
    pub parameters: ModelParameters,
    pub sse: f64,
}

/// Outcome of scanning a whole grid.
#[derive(Debug, Clone)]
pub struct GridScan {
    pub grid_size: usize,
    /// Admissible candidates in grid order.
    pub candidates: Vec<Candidate>,
}

impl GridScan {
    /// Candidates dropped for singular systems or negative slopes.
    pub fn rejected(&self) -> usize {
        self.grid_size - self.candidates.len()
    }

    /// Minimum SSE; equal SSE resolves to the smallest grid index, i.e. the
    /// lexicographically smallest change-point tuple.
    pub fn best(&self) -> Option<&Candidate> {
        let mut iter = self.candidates.iter();
        let mut best = iter.next()?;
        for c in iter {
            if c.sse < best.sse || (c.sse == best.sse && c.idx < best.idx) {
                best = c;
            }
        }
        Some(best)
    }
}

/// Fit the 3-parameter heating model.
pub fn fit_3ph(observations: &[Observation], grid: &GridConfig) -> Option<FitResult> {
    fit_model(ModelKind::ThreeParamHeating, observations, grid)
}

/// Fit the 5-parameter heating + cooling model.
pub fn fit_5p(observations: &[Observation], grid: &GridConfig) -> Option<FitResult> {
    fit_model(ModelKind::FiveParam, observations, grid)
}

/// Fit a single model kind by grid search.
///
/// Returns `None` ("insufficient data") when there are fewer than
/// `kind.min_observations()` points, any value is non-finite, the grid is empty
/// or larger than [`crate::fit::grid::MAX_GRID_POINTS`],
/// or no candidate is admissible.
pub fn fit_model(kind: ModelKind, observations: &[Observation], grid: &GridConfig) -> Option<FitResult> {
    let scan = scan_model(kind, observations, grid)?;
    let best = scan.best()?;
    debug!(
        model = kind.display_name(),
        change_points = ?best.change_points,
        sse = best.sse,
        "selected grid candidate"
    );
    Some(FitResult {
        parameters: best.parameters,
        sse: best.sse,
    })
}

/// Evaluate every grid candidate for a model kind.
///
/// Returns `None` for the same input guards as [`fit_model`], except that an
/// all-rejected grid still returns a scan (with no candidates).
pub fn scan_model(kind: ModelKind, observations: &[Observation], grid: &GridConfig) -> Option<GridScan> {
    let n = observations.len();
    if n < kind.min_observations() {
        debug!(
            model = kind.display_name(),
            n,
            required = kind.min_observations(),
            "too few observations to fit"
        );
        return None;
    }

    let temps: Vec<f64> = observations.iter().map(|o| o.temperature).collect();
    let energy: Vec<f64> = observations.iter().map(|o| o.energy).collect();
    if temps.iter().chain(energy.iter()).any(|v| !v.is_finite()) {
        debug!(model = kind.display_name(), "non-finite observation; skipping fit");
        return None;
    }

    let (min_t, max_t) = temperature_range(&temps)?;
    let Some(tuples) = change_point_grid(kind, min_t, max_t, grid) else {
        debug!(model = kind.display_name(), min_t, max_t, "change-point grid too large");
        return None;
    };
    if tuples.is_empty() {
        debug!(model = kind.display_name(), min_t, max_t, "empty change-point grid");
        return None;
    }

    let scan = scan_grid(kind, &tuples, &temps, &energy);
    debug!(
        model = kind.display_name(),
        grid_size = scan.grid_size,
        admissible = scan.candidates.len(),
        rejected = scan.rejected(),
        "grid scan complete"
    );
    Some(scan)
}

/// Score each change-point tuple independently (parallel).
pub fn scan_grid(kind: ModelKind, tuples: &[Vec<f64>], temps: &[f64], energy: &[f64]) -> GridScan {
    let candidates: Vec<Candidate> = tuples
        .par_iter()
        .enumerate()
        .filter_map(|(idx, cps)| {
            evaluate_candidate(kind, cps, temps, energy).map(|(parameters, sse)| Candidate {
                idx,
                change_points: cps.clone(),
                parameters,
                sse,
            })
        })
        .collect();

    GridScan {
        grid_size: tuples.len(),
        candidates,
    }
}

fn evaluate_candidate(
    kind: ModelKind,
    change_points: &[f64],
    temps: &[f64],
    energy: &[f64],
) -> Option<(ModelParameters, f64)> {
    let p = kind.change_point_count();
    let mut ramps = vec![Vec::with_capacity(temps.len()); p];
    let mut row = vec![0.0; p];

    for &t in temps {
        fill_ramp_row(kind, t, change_points, &mut row);
        for (col, &v) in ramps.iter_mut().zip(row.iter()) {
            col.push(v);
        }
    }

    let coefficients = solve_ramp_regression(&ramps, energy)?;

    // Energy must not fall as the departure from the comfort band grows.
    if coefficients[1..].iter().any(|&slope| slope < 0.0) {
        return None;
    }

    let parameters = assemble_parameters(kind, &coefficients, change_points)?;

    let sse: f64 = temps
        .iter()
        .zip(energy)
        .map(|(&t, &e)| {
            let r = e - predict(&parameters, t);
            r * r
        })
        .sum();

    sse.is_finite().then_some((parameters, sse))
}

fn temperature_range(temps: &[f64]) -> Option<(f64, f64)> {
    let min_t = temps.iter().copied().fold(f64::INFINITY, f64::min);
    let max_t = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min_t.is_finite() && max_t.is_finite()).then_some((min_t, max_t))
}
