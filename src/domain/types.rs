//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::fit::grid::GridConfig;
use crate::savings::{Meter, SavingsOptions};
use crate::stats::ValidationReport;

/// One metered period: outdoor air temperature and the energy used during it.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Optional period label (e.g. `Jan`, `2024-01`) carried through to reports.
    pub label: Option<String>,
    pub temperature: f64,
    pub energy: f64,
}

impl Observation {
    pub fn new(temperature: f64, energy: f64) -> Self {
        Self {
            label: None,
            temperature,
            energy,
        }
    }

    pub fn labeled(label: impl Into<String>, temperature: f64, energy: f64) -> Self {
        Self {
            label: Some(label.into()),
            temperature,
            energy,
        }
    }
}

/// Which model family (or families) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    /// 3-parameter heating-only model.
    #[value(name = "3ph")]
    #[serde(rename = "3ph")]
    ThreeParamHeating,
    /// 5-parameter heating + cooling model.
    #[value(name = "5p")]
    #[serde(rename = "5p")]
    FiveParam,
    /// Fit both and select by BIC (simpler model wins ties within 2 points).
    Auto,
}

impl ModelSpec {
    /// Model kinds to attempt, simplest first.
    pub fn kinds(self) -> &'static [ModelKind] {
        match self {
            ModelSpec::ThreeParamHeating => &[ModelKind::ThreeParamHeating],
            ModelSpec::FiveParam => &[ModelKind::FiveParam],
            ModelSpec::Auto => &[ModelKind::ThreeParamHeating, ModelKind::FiveParam],
        }
    }
}

/// Concrete change-point model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    ThreeParamHeating,
    FiveParam,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::ThreeParamHeating => "3P heating",
            ModelKind::FiveParam => "5P heating+cooling",
        }
    }

    /// Number of regression coefficients (intercept + ramp slopes).
    pub fn coefficient_count(self) -> usize {
        match self {
            ModelKind::ThreeParamHeating => 2,
            ModelKind::FiveParam => 3,
        }
    }

    /// Number of change points searched over the grid.
    pub fn change_point_count(self) -> usize {
        match self {
            ModelKind::ThreeParamHeating => 1,
            ModelKind::FiveParam => 2,
        }
    }

    /// Total parameter count for information criteria (coefficients + change points).
    pub fn param_count(self) -> usize {
        self.coefficient_count() + self.change_point_count()
    }

    /// Smallest data set the fitter will attempt.
    pub fn min_observations(self) -> usize {
        match self {
            ModelKind::ThreeParamHeating => 4,
            ModelKind::FiveParam => 6,
        }
    }
}

/// Fitted change-point parameters.
///
/// Slopes are non-negative for any fit produced by the grid search; for
/// `FiveParam`, `cp_cool > cp_heat` holds by construction of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParameters {
    /// `E = base + slope_heat * max(change_point - T, 0)`
    ThreeParamHeating {
        base: f64,
        slope_heat: f64,
        change_point: f64,
    },
    /// `E = base + slope_heat * max(cp_heat - T, 0) + slope_cool * max(T - cp_cool, 0)`
    FiveParam {
        base: f64,
        slope_heat: f64,
        cp_heat: f64,
        slope_cool: f64,
        cp_cool: f64,
    },
}

impl ModelParameters {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelParameters::ThreeParamHeating { .. } => ModelKind::ThreeParamHeating,
            ModelParameters::FiveParam { .. } => ModelKind::FiveParam,
        }
    }

    /// Change points in ascending order.
    pub fn change_points(&self) -> Vec<f64> {
        match *self {
            ModelParameters::ThreeParamHeating { change_point, .. } => vec![change_point],
            ModelParameters::FiveParam { cp_heat, cp_cool, .. } => vec![cp_heat, cp_cool],
        }
    }
}

/// Best candidate of a single grid search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub parameters: ModelParameters,
    pub sse: f64,
}

/// Metering interval of the data set; selects the acceptance limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Monthly,
    Hourly,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub bic: f64,
    pub n: usize,
}

/// Per-observation fitted result (used for plots and exports).
#[derive(Debug, Clone)]
pub struct ObservationResidual {
    pub observation: Observation,
    pub predicted: f64,
    pub residual: f64,
}

/// CSV column names for the temperature / energy / label fields.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub temperature: String,
    pub energy: String,
    /// Explicit label column; when `None`, `month`, `period` or `date` are used if present.
    pub label: Option<String>,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            temperature: "avg_oat_f".to_string(),
            energy: "total_kwh".to_string(),
            label: None,
        }
    }
}

/// A full `fit` run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub baseline_path: PathBuf,
    pub columns: ColumnSpec,
    pub model_spec: ModelSpec,
    pub grid: GridConfig,
    pub granularity: Granularity,
    /// Periods listed on each side of the outlier table.
    pub top_n: usize,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_results: Option<PathBuf>,
    pub export_model: Option<PathBuf>,
    /// Write a grid-surface debug bundle under `debug/`.
    pub debug: bool,
}

/// Configuration for a `savings` run, layered on top of a [`FitConfig`].
#[derive(Debug, Clone)]
pub struct SavingsConfig {
    pub reporting_path: PathBuf,
    pub options: SavingsOptions,
    /// Energy columns to evaluate one by one, each valued with its fuel preset.
    /// Empty means the single `FitConfig::columns.energy` column.
    pub meters: Vec<Meter>,
}

/// A saved model file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub granularity: Granularity,
    pub parameters: ModelParameters,
    pub quality: FitQuality,
    pub validation: ValidationReport,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub temperature: Vec<f64>,
    pub energy: Vec<f64>,
}
