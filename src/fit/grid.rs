//! Change-point grid generation.
//!
//! We fit 3P / 5P models using a deterministic grid search over change points.
//! For any fixed change point the remaining regression is linear, so scanning the
//! grid and solving OLS at each point is globally optimal over the grid.
//!
//! Grid points are generated from an integer index (`start + i * step`) rather
//! than by repeated addition, so the same inputs always produce the same grid.

use crate::domain::ModelKind;
use crate::error::AppError;

/// Slack used when deciding whether the last step still lies inside the range.
const RANGE_EPS: f64 = 1e-9;

/// Smallest accepted grid step.
pub const MIN_STEP: f64 = 1e-6;

/// Most change-point tuples scanned for one model kind.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Search-range and resolution settings for the change-point grid.
///
/// Heating change points start `start_offset` above the coldest observation.
/// The 3P search ends `end_offset` below the warmest observation; the 5P heating
/// search ends `heat_end_offset_5p` below it, and the cooling search runs from
/// `cp_heat + min_separation` to `max_t - end_offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    pub start_offset: f64,
    pub end_offset: f64,
    pub heat_end_offset_5p: f64,
    /// Minimum dead-band width between the heating and cooling change points.
    pub min_separation: f64,
    pub step_3p: f64,
    pub step_5p: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            start_offset: 2.0,
            end_offset: 1.0,
            heat_end_offset_5p: 5.0,
            min_separation: 3.0,
            step_3p: 0.5,
            step_5p: 1.0,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, step) in [("step_3p", self.step_3p), ("step_5p", self.step_5p)] {
            if !(step.is_finite() && step >= MIN_STEP) {
                return Err(AppError::new(
                    2,
                    format!("Invalid grid {name}={step} (must be finite and >= {MIN_STEP})."),
                ));
            }
        }
        let offsets = [
            ("start_offset", self.start_offset),
            ("end_offset", self.end_offset),
            ("heat_end_offset_5p", self.heat_end_offset_5p),
            ("min_separation", self.min_separation),
        ];
        for (name, value) in offsets {
            if !(value.is_finite() && value >= 0.0) {
                return Err(AppError::new(
                    2,
                    format!("Invalid grid {name}={value} (must be finite and >= 0)."),
                ));
            }
        }
        if self.min_separation <= 0.0 {
            return Err(AppError::new(2, "Grid min_separation must be > 0."));
        }
        Ok(())
    }

    /// Reject a grid over `[min_t, max_t]` that would hold more than
    /// [`MAX_GRID_POINTS`] tuples (exit code 2), without building it.
    ///
    /// The 5P figure is an upper bound: every heating point is paired with the
    /// widest cooling range.
    pub fn check_size(&self, kind: ModelKind, min_t: f64, max_t: f64) -> Result<(), AppError> {
        let size = match kind {
            ModelKind::ThreeParamHeating => step_count(
                min_t + self.start_offset,
                max_t - self.end_offset,
                self.step_3p,
            ),
            ModelKind::FiveParam => {
                let heat = step_count(
                    min_t + self.start_offset,
                    max_t - self.heat_end_offset_5p,
                    self.step_5p,
                );
                let cool = step_count(
                    min_t + self.start_offset + self.min_separation,
                    max_t - self.end_offset,
                    self.step_5p,
                );
                heat * cool
            }
        };
        if size > MAX_GRID_POINTS as f64 {
            return Err(AppError::new(
                2,
                format!(
                    "{} grid over [{min_t}, {max_t}] would hold ~{size:.3e} change-point tuples \
                     (limit {MAX_GRID_POINTS}); increase the grid step.",
                    kind.display_name()
                ),
            ));
        }
        Ok(())
    }
}

/// Number of points `linear_steps` would produce, computed in `f64` so huge
/// ranges cannot overflow.
fn step_count(start: f64, end: f64, step: f64) -> f64 {
    if !(start.is_finite() && end.is_finite() && step.is_finite() && step > 0.0) || end < start {
        return 0.0;
    }
    ((end - start) / step + RANGE_EPS).floor() + 1.0
}

/// Evenly spaced points `start, start + step, ...` up to and including `end`.
///
/// Empty for an empty range or a non-positive step; `None` when the range holds
/// more than [`MAX_GRID_POINTS`] points.
pub fn linear_steps(start: f64, end: f64, step: f64) -> Option<Vec<f64>> {
    let count = step_count(start, end, step);
    if count > MAX_GRID_POINTS as f64 {
        return None;
    }
    Some((0..count as usize).map(|i| start + step * i as f64).collect())
}

/// 3P grid: `[cp]` for `cp ∈ [min_t + start_offset, max_t - end_offset]`.
pub fn grid_3ph(min_t: f64, max_t: f64, config: &GridConfig) -> Option<Vec<Vec<f64>>> {
    let points = linear_steps(
        min_t + config.start_offset,
        max_t - config.end_offset,
        config.step_3p,
    )?;
    Some(points.into_iter().map(|cp| vec![cp]).collect())
}

/// 5P grid: `[cp_heat, cp_cool]` with `cp_cool >= cp_heat + min_separation`.
///
/// Ordered lexicographically by `(cp_heat, cp_cool)`. `None` when
/// [`GridConfig::check_size`] refuses the range.
pub fn grid_5p(min_t: f64, max_t: f64, config: &GridConfig) -> Option<Vec<Vec<f64>>> {
    config.check_size(ModelKind::FiveParam, min_t, max_t).ok()?;
    let heat = linear_steps(
        min_t + config.start_offset,
        max_t - config.heat_end_offset_5p,
        config.step_5p,
    )?;
    let mut out = Vec::new();
    for cp_heat in heat {
        let cool = linear_steps(
            cp_heat + config.min_separation,
            max_t - config.end_offset,
            config.step_5p,
        )?;
        out.extend(cool.into_iter().map(|cp_cool| vec![cp_heat, cp_cool]));
    }
    Some(out)
}

/// Grid for a model kind.
pub fn change_point_grid(kind: ModelKind, min_t: f64, max_t: f64, config: &GridConfig) -> Option<Vec<Vec<f64>>> {
    match kind {
        ModelKind::ThreeParamHeating => grid_3ph(min_t, max_t, config),
        ModelKind::FiveParam => grid_5p(min_t, max_t, config),
    }
}
