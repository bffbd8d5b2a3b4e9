//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs baseline fitting + model selection (and savings, when asked)
//! - prints reports/plots
//! - writes optional exports

use std::fs::File;
use std::io::{self, Write};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, ColumnArgs, Command, FitArgs, PlotArgs, SavingsArgs, SimModel, SimulateArgs};
use crate::data::{SimulationConfig, generate_sample};
use crate::domain::{ColumnSpec, FitConfig, ModelParameters, SavingsConfig};
use crate::error::AppError;
use crate::fit::grid::GridConfig;
use crate::io::{build_model_file, load_observations, read_model_json, write_model_json};
use crate::report::format;
use crate::savings::{NonRoutineAdjustment, SavingsOptions, Valuation};
use crate::stats::TValueTable;

pub mod pipeline;

/// Entry point for the `mvb` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(&args),
        Command::Savings(args) => handle_savings(&args),
        Command::Plot(args) => handle_plot(&args),
        Command::Simulate(args) => handle_simulate(&args),
    }
}

/// Log to stderr so reports and CSV on stdout stay clean.
///
/// `MVB_LOG` takes precedence over `RUST_LOG`; the default level is `warn`.
fn init_tracing() {
    let filter = std::env::var("MVB_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    // Ignore a second initialisation (e.g. when embedded in another binary).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(args);
    let run = pipeline::run_fit(&config)?;
    let best = &run.selection.best;

    println!("{}", format::format_run_summary(&run.ingest, &run.selection, &config));
    println!("{}", format::format_validation(&best.validation, config.granularity));
    println!("{}", format::format_outliers(&run.outliers));

    if config.plot {
        let plot = crate::plot::render_ascii_plot(
            &run.residuals,
            best.parameters(),
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    write_fit_exports(&config, &run)?;
    Ok(())
}

fn handle_savings(args: &SavingsArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.fit);
    let savings = savings_config_from_args(args);
    if !savings.meters.is_empty() {
        return handle_fuel_savings(args, &config, &savings);
    }
    let out = pipeline::run_savings(&config, &savings)?;
    let best = &out.baseline.selection.best;

    println!(
        "{}",
        format::format_run_summary(&out.baseline.ingest, &out.baseline.selection, &config)
    );
    println!("{}", format::format_validation(&best.validation, config.granularity));
    println!(
        "Reporting: {} (n={}, skipped={})\n",
        savings.reporting_path.display(),
        out.reporting.rows_used,
        out.reporting.row_errors.len()
    );
    println!("{}", format::format_savings(&out.summary));

    if config.plot {
        let plot = crate::plot::render_ascii_plot(
            &out.baseline.residuals,
            best.parameters(),
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    write_fit_exports(&config, &out.baseline)?;
    if let Some(path) = &args.export_savings {
        crate::io::export::write_savings_csv(path, &out.summary.periods)?;
        info!(path = %path.display(), "wrote savings CSV");
    }
    Ok(())
}

fn handle_fuel_savings(args: &SavingsArgs, config: &FitConfig, savings: &SavingsConfig) -> Result<(), AppError> {
    let out = pipeline::run_fuel_savings(config, savings)?;

    for fuel in &out.fuels {
        let run = &fuel.output;
        let best = &run.baseline.selection.best;
        println!("=== {} ({}) ===\n", fuel.meter.column, fuel.meter.fuel.unit());
        println!(
            "{}",
            format::format_run_summary(&run.baseline.ingest, &run.baseline.selection, &fuel.fit)
        );
        println!("{}", format::format_validation(&best.validation, fuel.fit.granularity));
        println!("{}", format::format_savings(&run.summary));
        if fuel.fit.plot {
            let plot = crate::plot::render_ascii_plot(
                &run.baseline.residuals,
                best.parameters(),
                fuel.fit.plot_width,
                fuel.fit.plot_height,
            );
            println!("{plot}");
        }

        write_fit_exports(&fuel.fit, &run.baseline)?;
        if let Some(path) = &args.export_savings {
            let path = pipeline::path_for_meter(path, &fuel.meter.column);
            crate::io::export::write_savings_csv(&path, &run.summary.periods)?;
            info!(path = %path.display(), "wrote savings CSV");
        }
    }

    let rows: Vec<_> = out.fuels.iter().map(|f| (&f.meter, &f.output.summary)).collect();
    println!("{}", format::format_combined_savings(&rows, &out.combined));
    Ok(())
}

fn write_fit_exports(config: &FitConfig, run: &pipeline::RunOutput) -> Result<(), AppError> {
    let best = &run.selection.best;
    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.residuals, best.kind())?;
        info!(path = %path.display(), "wrote results CSV");
    }
    if let Some(path) = &config.export_model {
        let model = build_model_file(best, &run.ingest.stats, config.granularity);
        write_model_json(path, &model)?;
        info!(path = %path.display(), "wrote model JSON");
    }
    if config.debug {
        let path = crate::debug::write_debug_bundle(&run.ingest.observations, &run.selection, config)?;
        eprintln!("Debug bundle: {}", path.display());
    }
    Ok(())
}

fn handle_plot(args: &PlotArgs) -> Result<(), AppError> {
    let model = read_model_json(&args.model)?;
    let overlay = match &args.overlay {
        Some(path) => load_observations(path, &column_spec_from_args(&args.columns))?.observations,
        None => Vec::new(),
    };

    println!("{}", format::format_parameters(&model.parameters));
    let plot = crate::plot::render_ascii_plot_from_model_file(&model, &overlay, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    let config = simulation_config_from_args(args);
    let sample = generate_sample(&config)?;
    let columns = column_spec_from_args(&args.columns);

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
            crate::io::export::write_observations_csv(file, &sample.observations, &columns.temperature, &columns.energy)?;
            info!(path = %path.display(), n = sample.observations.len(), "wrote synthetic CSV");
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            crate::io::export::write_observations_csv(
                &mut lock,
                &sample.observations,
                &columns.temperature,
                &columns.energy,
            )?;
            lock.flush()
                .map_err(|e| AppError::new(4, format!("Failed to flush stdout: {e}")))?;
        }
    }
    Ok(())
}

pub fn column_spec_from_args(args: &ColumnArgs) -> ColumnSpec {
    ColumnSpec {
        temperature: args.temp_column.clone(),
        energy: args.energy_column.clone(),
        label: args.label_column.clone(),
    }
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        baseline_path: args.baseline.clone(),
        columns: column_spec_from_args(&args.columns),
        model_spec: args.model,
        grid: GridConfig {
            start_offset: args.start_offset,
            end_offset: args.end_offset,
            heat_end_offset_5p: args.heat_end_offset,
            min_separation: args.min_separation,
            step_3p: args.step_3p,
            step_5p: args.step_5p,
        },
        granularity: args.granularity,
        top_n: args.top,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_results: args.export.clone(),
        export_model: args.export_model.clone(),
        debug: args.debug,
    }
}

pub fn savings_config_from_args(args: &SavingsArgs) -> SavingsConfig {
    let nra = args.nra_amount.map(|amount| NonRoutineAdjustment {
        amount,
        start_period: args.nra_start,
    });

    // Explicit rates override the fuel preset field by field.
    let preset = args.fuel.map(|f| f.valuation());
    let valuation = if preset.is_some() || args.price.is_some() || args.co2_factor.is_some() {
        Some(Valuation {
            price_per_unit: args
                .price
                .or(preset.map(|v| v.price_per_unit))
                .unwrap_or(0.0),
            co2_per_unit: args
                .co2_factor
                .or(preset.map(|v| v.co2_per_unit))
                .unwrap_or(0.0),
        })
    } else {
        None
    };

    SavingsConfig {
        reporting_path: args.reporting.clone(),
        options: SavingsOptions {
            nra,
            valuation,
            confidence: args.confidence,
            t_table: t_table_from_args(args),
        },
        meters: args.meters.clone(),
    }
}

/// Default t-table with `--t-value` entries layered on and `--t-fallback` applied.
pub fn t_table_from_args(args: &SavingsArgs) -> TValueTable {
    let defaults = TValueTable::default();
    let fallback = args.t_fallback.unwrap_or(defaults.fallback());
    let table = TValueTable::new(defaults.entries().to_vec(), fallback);
    args.t_values
        .iter()
        .fold(table, |table, &(level, t)| table.with_entry(level, t))
}

pub fn simulation_config_from_args(args: &SimulateArgs) -> SimulationConfig {
    let parameters = match args.model {
        SimModel::ThreeParamHeating => ModelParameters::ThreeParamHeating {
            base: args.base,
            slope_heat: args.slope_heat,
            change_point: args.cp_heat,
        },
        SimModel::FiveParam => ModelParameters::FiveParam {
            base: args.base,
            slope_heat: args.slope_heat,
            cp_heat: args.cp_heat,
            slope_cool: args.slope_cool,
            cp_cool: args.cp_cool,
        },
    };
    SimulationConfig {
        parameters,
        count: args.count,
        temp_min: args.temp_min,
        temp_max: args.temp_max,
        noise: args.noise,
        seed: args.seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::savings::Fuel;

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn fit_args_map_onto_grid_config() {
        let Command::Fit(args) = parse(&["mvb", "fit", "b.csv", "--step-3p", "0.25", "--no-plot"]) else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert_eq!(config.grid.step_3p, 0.25);
        assert_eq!(config.grid.step_5p, GridConfig::default().step_5p);
        assert!(!config.plot);
        assert_eq!(config.columns.temperature, "avg_oat_f");
    }

    #[test]
    fn price_overrides_fuel_preset() {
        let Command::Savings(args) = parse(&[
            "mvb",
            "savings",
            "b.csv",
            "--reporting",
            "r.csv",
            "--fuel",
            "electric",
            "--price",
            "0.2",
        ]) else {
            panic!("expected savings");
        };
        let savings = savings_config_from_args(&args);
        let valuation = savings.options.valuation.unwrap();
        assert_eq!(valuation.price_per_unit, 0.2);
        assert_eq!(valuation.co2_per_unit, Fuel::Electric.valuation().co2_per_unit);
        assert!(savings.options.nra.is_none());
        assert_eq!(savings.options.t_table, TValueTable::default());
        assert!(savings.meters.is_empty());
    }

    #[test]
    fn t_value_flags_reach_the_savings_table() {
        let Command::Savings(args) = parse(&[
            "mvb",
            "savings",
            "b.csv",
            "--reporting",
            "r.csv",
            "--t-value",
            "0.85=1.44",
            "--t-value",
            "0.90=1.8",
            "--t-fallback",
            "2.5",
        ]) else {
            panic!("expected savings");
        };
        let table = savings_config_from_args(&args).options.t_table;
        assert_eq!(table.lookup(0.85), 1.44);
        assert_eq!(table.lookup(0.90), 1.8);
        assert_eq!(table.lookup(0.95), 2.201);
        assert_eq!(table.lookup(0.5), 2.5);
        assert_eq!(table.fallback(), 2.5);
    }

    #[test]
    fn simulate_args_build_five_param_model() {
        let Command::Simulate(args) = parse(&["mvb", "simulate", "--model", "5p", "-n", "24"]) else {
            panic!("expected simulate");
        };
        let config = simulation_config_from_args(&args);
        assert_eq!(config.count, 24);
        assert_eq!(config.parameters.change_points(), vec![55.0, 70.0]);
    }
}
