//! Shared "fit pipeline" logic used by the `fit` and `savings` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> fit/search -> selection -> residuals -> outliers
//!
//! The commands can then focus on presentation and exports.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::{FitConfig, ObservationResidual, SavingsConfig};
use crate::error::AppError;
use crate::fit::selection::{FitSelection, fit_and_select};
use crate::io::ingest::{IngestedData, load_observations};
use crate::report::{Outliers, compute_residuals, rank_outliers};
use crate::savings::{CombinedTotals, Meter, SavingsOptions, SavingsSummary, combine_fuel_savings, compute_savings};

/// All computed outputs of a single `mvb fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub selection: FitSelection,
    pub residuals: Vec<ObservationResidual>,
    pub outliers: Outliers,
}

/// Outputs of a `mvb savings` run.
#[derive(Debug, Clone)]
pub struct SavingsOutput {
    pub baseline: RunOutput,
    pub reporting: IngestedData,
    pub summary: SavingsSummary,
}

/// One fuel of a multi-meter savings run.
#[derive(Debug, Clone)]
pub struct FuelRun {
    pub meter: Meter,
    /// The fit configuration used for this meter (energy column and export paths).
    pub fit: FitConfig,
    pub output: SavingsOutput,
}

/// Outputs of a `mvb savings --meter ...` run.
#[derive(Debug, Clone)]
pub struct MultiFuelOutput {
    pub fuels: Vec<FuelRun>,
    pub combined: CombinedTotals,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let ingest = load_observations(&config.baseline_path, &config.columns)?;
    run_fit_on(config, ingest)
}

/// Fit already-ingested data.
pub fn run_fit_on(config: &FitConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    let selection = fit_and_select(&ingest.observations, config.model_spec, &config.grid)?;

    let residuals = compute_residuals(&ingest.observations, selection.best.parameters())?;
    let outliers = rank_outliers(&residuals, config.top_n);

    Ok(RunOutput {
        ingest,
        selection,
        residuals,
        outliers,
    })
}

/// Fit the baseline, then project it onto the reporting period.
pub fn run_savings(fit: &FitConfig, savings: &SavingsConfig) -> Result<SavingsOutput, AppError> {
    let options = &savings.options;
    validate_savings_options(options)?;

    let baseline = run_fit(fit)?;
    let reporting = load_observations(&savings.reporting_path, &fit.columns)?;

    let summary = compute_savings(&baseline.selection.best, &reporting.observations, options);
    info!(
        periods = summary.periods.len(),
        savings = summary.totals.savings,
        fraction = summary.savings_fraction,
        "savings computed"
    );

    Ok(SavingsOutput {
        baseline,
        reporting,
        summary,
    })
}

/// Run [`run_savings`] once per meter and combine cost and CO₂.
///
/// Each meter is valued with its fuel preset. The non-routine adjustment is
/// entered in the first meter's units and applies to that meter only.
pub fn run_fuel_savings(fit: &FitConfig, savings: &SavingsConfig) -> Result<MultiFuelOutput, AppError> {
    if savings.meters.is_empty() {
        return Err(AppError::new(2, "No meters configured for a multi-fuel savings run."));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = savings.meters.iter().find(|m| !seen.insert(m.column.to_lowercase())) {
        return Err(AppError::new(2, format!("Meter column '{}' is listed twice.", dup.column)));
    }

    let mut fuels = Vec::with_capacity(savings.meters.len());
    for (i, meter) in savings.meters.iter().enumerate() {
        let meter_fit = meter_fit_config(fit, meter);
        let meter_savings = SavingsConfig {
            reporting_path: savings.reporting_path.clone(),
            options: SavingsOptions {
                valuation: Some(meter.fuel.valuation()),
                nra: if i == 0 { savings.options.nra } else { None },
                ..savings.options.clone()
            },
            meters: Vec::new(),
        };
        let output = run_savings(&meter_fit, &meter_savings)?;
        fuels.push(FuelRun {
            meter: meter.clone(),
            fit: meter_fit,
            output,
        });
    }

    let combined = combine_fuel_savings(fuels.iter().map(|f| &f.output.summary));
    info!(meters = fuels.len(), cost = combined.cost, co2 = combined.co2, "combined fuel savings");
    Ok(MultiFuelOutput { fuels, combined })
}

/// `fit` retargeted at a meter's energy column, with export paths suffixed by
/// the column name so meters do not overwrite each other.
pub fn meter_fit_config(fit: &FitConfig, meter: &Meter) -> FitConfig {
    let mut config = fit.clone();
    config.columns.energy = meter.column.clone();
    config.export_results = fit.export_results.as_deref().map(|p| path_for_meter(p, &meter.column));
    config.export_model = fit.export_model.as_deref().map(|p| path_for_meter(p, &meter.column));
    config
}

/// `out/savings.csv` + `total_kwh` -> `out/savings_total_kwh.csv`.
pub fn path_for_meter(path: &Path, column: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{column}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{column}"),
    };
    path.with_file_name(name)
}

fn validate_savings_options(options: &SavingsOptions) -> Result<(), AppError> {
    if !(options.confidence.is_finite() && options.confidence > 0.0 && options.confidence < 1.0) {
        return Err(AppError::new(
            2,
            format!("Invalid confidence level {} (must be in (0, 1)).", options.confidence),
        ));
    }
    if let Some(nra) = options.nra {
        if nra.start_period == 0 || !nra.amount.is_finite() {
            return Err(AppError::new(
                2,
                "Non-routine adjustment needs a finite amount and a start period >= 1.",
            ));
        }
    }
    let table = &options.t_table;
    let mut t_values = table.entries().iter().map(|&(_, t)| t).chain([table.fallback()]);
    if let Some(bad) = t_values.find(|t| !(t.is_finite() && *t > 0.0)) {
        return Err(AppError::new(2, format!("Invalid t-value {bad} (must be finite and > 0).")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::domain::{ColumnSpec, Granularity, ModelParameters, ModelSpec, Observation};
    use crate::fit::grid::GridConfig;
    use crate::io::ingest::read_observations;
    use crate::io::export::write_observations_csv;
    use crate::models::predict;
    use crate::savings::{Fuel, NonRoutineAdjustment};
    use crate::stats::TValueTable;

    fn config() -> FitConfig {
        FitConfig {
            baseline_path: PathBuf::from("unused.csv"),
            columns: ColumnSpec::default(),
            model_spec: ModelSpec::Auto,
            grid: GridConfig::default(),
            granularity: Granularity::Monthly,
            top_n: 2,
            plot: false,
            plot_width: 60,
            plot_height: 20,
            export_results: None,
            export_model: None,
            debug: false,
        }
    }

    #[test]
    fn fit_pipeline_on_ingested_csv() {
        let truth = ModelParameters::ThreeParamHeating {
            base: 1000.0,
            slope_heat: 50.0,
            change_point: 55.0,
        };
        let obs: Vec<Observation> = [20.0, 26.0, 31.0, 37.0, 42.0, 48.0, 53.0, 59.0, 64.0, 70.0, 75.0, 80.0]
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let wobble = if i % 2 == 0 { 10.0 } else { -10.0 };
                Observation::labeled(format!("M{}", i + 1), t, predict(&truth, t) + wobble)
            })
            .collect();

        let mut buf = Vec::new();
        write_observations_csv(&mut buf, &obs, "avg_oat_f", "total_kwh").unwrap();
        let ingest = read_observations(buf.as_slice(), &ColumnSpec::default()).unwrap();

        let run = run_fit_on(&config(), ingest).unwrap();
        assert_eq!(run.residuals.len(), 12);
        assert!(run.outliers.over.len() <= 2);
        assert!(run.outliers.under.len() <= 2);
        assert!(run.selection.best.validation.r_squared > 0.99);
    }

    #[test]
    fn invalid_savings_options_are_config_errors() {
        let savings = SavingsConfig {
            reporting_path: PathBuf::from("unused.csv"),
            options: SavingsOptions {
                confidence: 1.5,
                ..SavingsOptions::default()
            },
            meters: Vec::new(),
        };
        assert_eq!(run_savings(&config(), &savings).unwrap_err().exit_code(), 2);

        let savings = SavingsConfig {
            reporting_path: PathBuf::from("unused.csv"),
            options: SavingsOptions {
                nra: Some(NonRoutineAdjustment {
                    amount: 100.0,
                    start_period: 0,
                }),
                ..SavingsOptions::default()
            },
            meters: Vec::new(),
        };
        assert_eq!(run_savings(&config(), &savings).unwrap_err().exit_code(), 2);

        let savings = SavingsConfig {
            reporting_path: PathBuf::from("unused.csv"),
            options: SavingsOptions {
                t_table: TValueTable::new(vec![(0.90, -1.0)], 1.796),
                ..SavingsOptions::default()
            },
            meters: Vec::new(),
        };
        assert_eq!(run_savings(&config(), &savings).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn meter_paths_get_the_column_suffix() {
        assert_eq!(
            path_for_meter(Path::new("out/savings.csv"), "total_kwh"),
            PathBuf::from("out/savings_total_kwh.csv")
        );
        assert_eq!(path_for_meter(Path::new("model"), "gas"), PathBuf::from("model_gas"));

        let mut fit = config();
        fit.export_model = Some(PathBuf::from("m.json"));
        let meter = Meter {
            column: "total_therms".to_string(),
            fuel: Fuel::Gas,
        };
        let retargeted = meter_fit_config(&fit, &meter);
        assert_eq!(retargeted.columns.energy, "total_therms");
        assert_eq!(retargeted.export_model, Some(PathBuf::from("m_total_therms.json")));
        assert_eq!(retargeted.export_results, None);
    }

    #[test]
    fn duplicate_meters_are_config_errors() {
        let meter = Meter {
            column: "total_kwh".to_string(),
            fuel: Fuel::Electric,
        };
        let savings = SavingsConfig {
            reporting_path: PathBuf::from("unused.csv"),
            options: SavingsOptions::default(),
            meters: vec![meter.clone(), meter],
        };
        assert_eq!(run_fuel_savings(&config(), &savings).unwrap_err().exit_code(), 2);

        let none = SavingsConfig {
            meters: Vec::new(),
            ..savings
        };
        assert_eq!(run_fuel_savings(&config(), &none).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn electric_and_gas_meters_combine_cost_and_co2() {
        let temps = [20.0, 26.0, 31.0, 37.0, 42.0, 48.0, 53.0, 59.0, 64.0, 70.0, 75.0, 80.0];
        let kwh = |t: f64| 1000.0 + 50.0 * (55.0 - t).max(0.0);
        let therms = |t: f64| 80.0 + 6.0 * (60.0 - t).max(0.0);

        let mut baseline = String::from("month,avg_oat_f,total_kwh,total_therms\n");
        let mut reporting = baseline.clone();
        for (i, &t) in temps.iter().enumerate() {
            let wobble = if i % 2 == 0 { 1.0 } else { -1.0 };
            baseline.push_str(&format!(
                "M{},{t},{},{}\n",
                i + 1,
                kwh(t) + 10.0 * wobble,
                therms(t) + wobble
            ));
            reporting.push_str(&format!("M{},{t},{},{}\n", i + 1, 0.8 * kwh(t), 0.9 * therms(t)));
        }

        let dir = std::env::temp_dir();
        let tag = std::process::id();
        let baseline_path = dir.join(format!("mvb_fuels_baseline_{tag}.csv"));
        let reporting_path = dir.join(format!("mvb_fuels_reporting_{tag}.csv"));
        std::fs::write(&baseline_path, baseline).unwrap();
        std::fs::write(&reporting_path, reporting).unwrap();

        let fit = FitConfig {
            baseline_path: baseline_path.clone(),
            ..config()
        };
        let savings = SavingsConfig {
            reporting_path: reporting_path.clone(),
            options: SavingsOptions {
                nra: Some(NonRoutineAdjustment {
                    amount: 50.0,
                    start_period: 1,
                }),
                ..SavingsOptions::default()
            },
            meters: vec!["total_kwh=electric".parse().unwrap(), "total_therms=gas".parse().unwrap()],
        };
        let out = run_fuel_savings(&fit, &savings);
        std::fs::remove_file(&baseline_path).ok();
        std::fs::remove_file(&reporting_path).ok();
        let out = out.unwrap();

        assert_eq!(out.fuels.len(), 2);
        assert_eq!(out.fuels[1].fit.columns.energy, "total_therms");
        // The adjustment is in kWh and stays on the electric meter.
        assert!(out.fuels[0].output.summary.periods.iter().all(|p| p.adjustment == 50.0));
        assert!(out.fuels[1].output.summary.periods.iter().all(|p| p.adjustment == 0.0));

        let elec = &out.fuels[0].output.summary;
        let gas = &out.fuels[1].output.summary;
        assert!(elec.savings_fraction > 0.2 && elec.savings_fraction < 0.27, "{}", elec.savings_fraction);
        assert!(gas.savings_fraction > 0.05 && gas.savings_fraction < 0.15, "{}", gas.savings_fraction);

        let elec_cost = elec.totals.cost.unwrap();
        let gas_cost = gas.totals.cost.unwrap();
        assert!((elec_cost - elec.totals.savings * 0.105).abs() < 1e-6);
        assert!((gas_cost - gas.totals.savings * 1.15).abs() < 1e-6);
        assert_eq!(out.combined.cost, elec_cost + gas_cost);
        assert_eq!(out.combined.co2, elec.totals.co2.unwrap() + gas.totals.co2.unwrap());
        assert!(out.combined.cost > 0.0);
    }
}
