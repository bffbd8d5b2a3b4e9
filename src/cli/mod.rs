//! Command-line parsing for the change-point baseline tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code. Conversions into typed configs live in `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{Granularity, ModelSpec};
use crate::savings::{Fuel, Meter};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "mvb",
    version,
    about = "Change-point baseline regression and savings verification"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a baseline model to a CSV, print diagnostics and validation, and optionally plot/export.
    Fit(FitArgs),
    /// Fit a baseline, then project it onto a reporting-period CSV to compute avoided energy.
    Savings(SavingsArgs),
    /// Plot a previously exported model JSON.
    Plot(PlotArgs),
    /// Write a synthetic CSV generated from known model parameters.
    Simulate(SimulateArgs),
}

/// CSV column selection shared by every command that reads data.
#[derive(Debug, Args, Clone)]
pub struct ColumnArgs {
    /// Outdoor air temperature column.
    #[arg(long, env = "MVB_TEMP_COLUMN", default_value = "avg_oat_f")]
    pub temp_column: String,

    /// Energy consumption column.
    #[arg(long, env = "MVB_ENERGY_COLUMN", default_value = "total_kwh")]
    pub energy_column: String,

    /// Period label column (defaults to `month`, `period` or `date` when present).
    #[arg(long)]
    pub label_column: Option<String>,
}

/// Options for fitting a baseline.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Baseline-period CSV.
    #[arg(value_name = "CSV")]
    pub baseline: PathBuf,

    #[command(flatten)]
    pub columns: ColumnArgs,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::Auto)]
    pub model: ModelSpec,

    /// Metering interval (selects the Guideline 14 acceptance limits).
    #[arg(long, value_enum, default_value_t = Granularity::Monthly)]
    pub granularity: Granularity,

    /// Change-point step for the 3P grid.
    #[arg(long, default_value_t = 0.5)]
    pub step_3p: f64,

    /// Change-point step for the 5P grid.
    #[arg(long, default_value_t = 1.0)]
    pub step_5p: f64,

    /// Distance above the coldest observation where the heating search starts.
    #[arg(long, default_value_t = 2.0)]
    pub start_offset: f64,

    /// Distance below the warmest observation where the search ends.
    #[arg(long, default_value_t = 1.0)]
    pub end_offset: f64,

    /// Distance below the warmest observation where the 5P heating search ends.
    #[arg(long, default_value_t = 5.0)]
    pub heat_end_offset: f64,

    /// Minimum dead-band width between 5P change points.
    #[arg(long, default_value_t = 3.0)]
    pub min_separation: f64,

    /// Show the top-N periods on each side of the residual table.
    #[arg(long, default_value_t = 3)]
    pub top: usize,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export per-observation results to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the model (parameters + statistics + curve grid) to JSON.
    #[arg(long = "export-model")]
    pub export_model: Option<PathBuf>,

    /// Write a grid-surface debug bundle under `debug/`.
    #[arg(long)]
    pub debug: bool,
}

/// Options for a savings run.
#[derive(Debug, Args, Clone)]
pub struct SavingsArgs {
    #[command(flatten)]
    pub fit: FitArgs,

    /// Reporting-period CSV (same columns as the baseline).
    #[arg(long, value_name = "CSV")]
    pub reporting: PathBuf,

    /// Non-routine adjustment: energy removed from each affected reporting period.
    #[arg(long)]
    pub nra_amount: Option<f64>,

    /// First reporting period (1-based) the non-routine adjustment applies to.
    #[arg(long, default_value_t = 1)]
    pub nra_start: usize,

    /// Value savings with utility presets.
    #[arg(long, value_enum)]
    pub fuel: Option<Fuel>,

    /// Price per energy unit (overrides the fuel preset).
    #[arg(long)]
    pub price: Option<f64>,

    /// Metric tons CO2 per energy unit (overrides the fuel preset).
    #[arg(long)]
    pub co2_factor: Option<f64>,

    /// Evaluate several energy columns, each valued with its fuel preset, and
    /// combine cost and CO2 (repeatable, e.g. `--meter total_therms=gas`).
    /// The non-routine adjustment applies to the first meter.
    #[arg(
        long = "meter",
        value_name = "COLUMN=FUEL",
        conflicts_with_all = ["fuel", "price", "co2_factor"]
    )]
    pub meters: Vec<Meter>,

    /// Confidence level for the savings uncertainty (0.80, 0.90, 0.95, 0.99).
    #[arg(long, env = "MVB_CONFIDENCE", default_value_t = 0.90)]
    pub confidence: f64,

    /// Add or replace a Student-t multiplier (repeatable, e.g. `--t-value 0.85=1.44`).
    #[arg(long = "t-value", value_name = "LEVEL=T", value_parser = parse_t_value)]
    pub t_values: Vec<(f64, f64)>,

    /// t multiplier for confidence levels missing from the table.
    #[arg(long)]
    pub t_fallback: Option<f64>,

    /// Export per-period savings to CSV.
    #[arg(long = "export-savings")]
    pub export_savings: Option<PathBuf>,
}

fn parse_t_value(s: &str) -> Result<(f64, f64), String> {
    let (level, t) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LEVEL=T, got '{s}'"))?;
    let level: f64 = level.trim().parse().map_err(|e| format!("bad level '{level}': {e}"))?;
    let t: f64 = t.trim().parse().map_err(|e| format!("bad t-value '{t}': {e}"))?;
    Ok((level, t))
}

/// Options for plotting a saved model.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Model JSON file produced by `mvb fit --export-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// CSV whose observations are drawn over the curve.
    #[arg(long, value_name = "CSV")]
    pub overlay: Option<PathBuf>,

    #[command(flatten)]
    pub columns: ColumnArgs,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Model family for synthetic data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimModel {
    #[value(name = "3ph")]
    ThreeParamHeating,
    #[value(name = "5p")]
    FiveParam,
}

/// Options for generating synthetic data.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[arg(long, value_enum, default_value_t = SimModel::ThreeParamHeating)]
    pub model: SimModel,

    /// Baseload energy.
    #[arg(long, default_value_t = 1000.0)]
    pub base: f64,

    /// Heating slope (energy per degree below the heating change point).
    #[arg(long, default_value_t = 50.0)]
    pub slope_heat: f64,

    /// Heating change point.
    #[arg(long, default_value_t = 55.0)]
    pub cp_heat: f64,

    /// Cooling slope (5P only).
    #[arg(long, default_value_t = 30.0)]
    pub slope_cool: f64,

    /// Cooling change point (5P only).
    #[arg(long, default_value_t = 70.0)]
    pub cp_cool: f64,

    /// Number of periods to generate.
    #[arg(short = 'n', long, default_value_t = 12)]
    pub count: usize,

    #[arg(long, default_value_t = 20.0)]
    pub temp_min: f64,

    #[arg(long, default_value_t = 85.0)]
    pub temp_max: f64,

    /// Gaussian noise as a fraction of the model level.
    #[arg(long, default_value_t = 0.03)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV (stdout when omitted).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub columns: ColumnArgs,
}
