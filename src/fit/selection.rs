//! Model selection (3P vs 5P) and packaging of fit results.
//!
//! For each requested model kind we:
//! - run the grid search
//! - regenerate predictions from the best parameters
//! - compute NMBE / CV(RMSE) / R² and BIC = n · ln(SSE/n) + k · ln(n)
//!
//! Selection rules for `ModelSpec::Auto`:
//! 1. Skip kinds with fewer than `min_observations()` points
//! 2. Choose the fit with minimum BIC
//! 3. If the simpler 3P fit is within 2 BIC points of the best, prefer it

use tracing::info;

use crate::domain::{FitQuality, FitResult, ModelKind, ModelParameters, ModelSpec, Observation};
use crate::error::AppError;
use crate::fit::fitter::fit_model;
use crate::fit::grid::GridConfig;
use crate::models::predict_series;
use crate::stats::{TValueTable, UncertaintyEstimate, ValidationReport, fractional_savings_uncertainty};

/// BIC difference within which the simpler model is preferred.
const BIC_SIMPLICITY_MARGIN: f64 = 2.0;

/// A fitted model evaluated against the data it was fitted on.
#[derive(Debug, Clone)]
pub struct BaselineFit {
    pub fit: FitResult,
    /// Observed energy, in input order.
    pub actual: Vec<f64>,
    /// Model predictions at the observed temperatures.
    pub predicted: Vec<f64>,
    pub validation: ValidationReport,
    pub quality: FitQuality,
}

impl BaselineFit {
    pub fn parameters(&self) -> &ModelParameters {
        &self.fit.parameters
    }

    pub fn kind(&self) -> ModelKind {
        self.fit.parameters.kind()
    }

    /// Savings uncertainty implied by this baseline's CV(RMSE).
    pub fn savings_uncertainty(
        &self,
        savings_fraction: f64,
        confidence: f64,
        table: &TValueTable,
    ) -> UncertaintyEstimate {
        fractional_savings_uncertainty(&self.actual, &self.predicted, savings_fraction, confidence, table)
    }
}

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: BaselineFit,
    /// Fits for all attempted models that produced an admissible result.
    pub fits: Vec<BaselineFit>,
    /// Any models that were skipped and why (for diagnostics).
    pub skipped: Vec<(ModelKind, String)>,
}

/// Evaluate a fit against its observations.
pub fn evaluate_fit(observations: &[Observation], fit: FitResult) -> BaselineFit {
    let temps: Vec<f64> = observations.iter().map(|o| o.temperature).collect();
    let actual: Vec<f64> = observations.iter().map(|o| o.energy).collect();
    let predicted = predict_series(&fit.parameters, &temps);
    let validation = ValidationReport::compute(&actual, &predicted);

    let n = observations.len();
    let quality = FitQuality {
        sse: fit.sse,
        rmse: (fit.sse / n as f64).sqrt(),
        bic: bic(n, fit.sse, fit.parameters.kind().param_count()),
        n,
    };

    BaselineFit {
        fit,
        actual,
        predicted,
        validation,
        quality,
    }
}

/// Fit and select the best model.
pub fn fit_and_select(
    observations: &[Observation],
    spec: ModelSpec,
    grid: &GridConfig,
) -> Result<FitSelection, AppError> {
    grid.validate()?;
    let n = observations.len();
    let (min_t, max_t) = observations
        .iter()
        .map(|o| o.temperature)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));

    let mut fits = Vec::new();
    let mut skipped = Vec::new();

    for &kind in spec.kinds() {
        if n < kind.min_observations() {
            skipped.push((
                kind,
                format!("Underdetermined: n={n} < {}", kind.min_observations()),
            ));
            continue;
        }
        if min_t.is_finite() && max_t.is_finite() {
            grid.check_size(kind, min_t, max_t)?;
        }
        match fit_model(kind, observations, grid) {
            Some(fit) => fits.push(evaluate_fit(observations, fit)),
            None => skipped.push((
                kind,
                "No admissible candidate (singular or negative slope everywhere on the grid)".to_string(),
            )),
        }
    }

    if fits.is_empty() {
        let reasons: Vec<String> = skipped
            .iter()
            .map(|(kind, reason)| format!("{}: {reason}", kind.display_name()))
            .collect();
        return Err(AppError::insufficient_data(format!(
            "Insufficient data to fit any model. {}",
            reasons.join("; ")
        )));
    }

    let best = select_by_bic(&fits);
    info!(
        model = best.kind().display_name(),
        sse = best.quality.sse,
        cvrmse = best.validation.cvrmse,
        "baseline model selected"
    );

    Ok(FitSelection { best, fits, skipped })
}

fn bic(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let sse_per = (sse / n_f).max(1e-12);
    n_f * sse_per.ln() + (k as f64) * n_f.ln()
}

fn select_by_bic(fits: &[BaselineFit]) -> BaselineFit {
    let mut best = &fits[0];
    for f in &fits[1..] {
        if f.quality.bic < best.quality.bic {
            best = f;
        }
    }

    let best_bic = best.quality.bic;

    // Iterate in order of increasing complexity and take the first fit that is
    // close enough to the best.
    for kind in [ModelKind::ThreeParamHeating, ModelKind::FiveParam] {
        if let Some(f) = fits.iter().find(|f| f.kind() == kind) {
            if f.quality.bic <= best_bic + BIC_SIMPLICITY_MARGIN {
                return f.clone();
            }
        }
    }

    best.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::predict;

    fn monthly(params: &ModelParameters) -> Vec<Observation> {
        [20.0, 26.0, 31.0, 37.0, 42.0, 48.0, 53.0, 59.0, 64.0, 70.0, 75.0, 80.0]
            .iter()
            .map(|&t| Observation::new(t, predict(params, t)))
            .collect()
    }

    #[test]
    fn end_to_end_three_param_scenario() {
        let truth = ModelParameters::ThreeParamHeating {
            base: 1000.0,
            slope_heat: 50.0,
            change_point: 55.0,
        };
        let obs = monthly(&truth);
        let selection =
            fit_and_select(&obs, ModelSpec::ThreeParamHeating, &GridConfig::default()).unwrap();

        let ModelParameters::ThreeParamHeating {
            base,
            slope_heat,
            change_point,
        } = *selection.best.parameters()
        else {
            panic!("expected 3P");
        };
        assert!((change_point - 55.0).abs() <= 0.5);
        assert!((slope_heat - 50.0).abs() < 0.5);
        assert!((base - 1000.0).abs() < 0.5);
        assert!(selection.best.validation.r_squared >= 0.999);
        assert!(selection.skipped.is_empty());
    }

    fn fit_with_bic(parameters: ModelParameters, bic: f64) -> BaselineFit {
        let series = [1.0, 2.0, 3.0, 4.0];
        BaselineFit {
            fit: FitResult { parameters, sse: 1.0 },
            actual: series.to_vec(),
            predicted: series.to_vec(),
            validation: ValidationReport::compute(&series, &series),
            quality: FitQuality {
                sse: 1.0,
                rmse: 0.5,
                bic,
                n: series.len(),
            },
        }
    }

    fn three_param(bic: f64) -> BaselineFit {
        fit_with_bic(
            ModelParameters::ThreeParamHeating {
                base: 1000.0,
                slope_heat: 50.0,
                change_point: 55.0,
            },
            bic,
        )
    }

    fn five_param(bic: f64) -> BaselineFit {
        fit_with_bic(
            ModelParameters::FiveParam {
                base: 500.0,
                slope_heat: 20.0,
                cp_heat: 45.0,
                slope_cool: 30.0,
                cp_cool: 70.0,
            },
            bic,
        )
    }

    #[test]
    fn simpler_model_wins_within_the_bic_margin() {
        // 5P is better by 1.5 BIC points.
        let chosen = select_by_bic(&[three_param(101.5), five_param(100.0)]);
        assert_eq!(chosen.kind(), ModelKind::ThreeParamHeating);

        // Exactly on the margin still favours 3P.
        let chosen = select_by_bic(&[three_param(102.0), five_param(100.0)]);
        assert_eq!(chosen.kind(), ModelKind::ThreeParamHeating);
    }

    #[test]
    fn complex_model_wins_beyond_the_bic_margin() {
        let chosen = select_by_bic(&[three_param(102.5), five_param(100.0)]);
        assert_eq!(chosen.kind(), ModelKind::FiveParam);

        // Input order does not matter.
        let chosen = select_by_bic(&[five_param(100.0), three_param(102.5)]);
        assert_eq!(chosen.kind(), ModelKind::FiveParam);
    }

    #[test]
    fn lower_bic_simple_model_is_kept() {
        let chosen = select_by_bic(&[three_param(90.0), five_param(100.0)]);
        assert_eq!(chosen.kind(), ModelKind::ThreeParamHeating);
        assert_eq!(chosen.quality.bic, 90.0);
    }

    #[test]
    fn oversized_grid_is_a_config_error() {
        let truth = ModelParameters::ThreeParamHeating {
            base: 1000.0,
            slope_heat: 50.0,
            change_point: 55.0,
        };
        let obs: Vec<Observation> = monthly(&truth).into_iter().take(7).collect();
        let grid = GridConfig {
            step_3p: 1e-300,
            ..GridConfig::default()
        };
        let err = fit_and_select(&obs, ModelSpec::ThreeParamHeating, &grid).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        // Passes validation but still spans too many points.
        let grid = GridConfig {
            step_3p: crate::fit::grid::MIN_STEP,
            ..GridConfig::default()
        };
        let err = fit_and_select(&obs, ModelSpec::ThreeParamHeating, &grid).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn auto_selects_five_param_for_heating_and_cooling_data() {
        let truth = ModelParameters::FiveParam {
            base: 500.0,
            slope_heat: 20.0,
            cp_heat: 45.0,
            slope_cool: 30.0,
            cp_cool: 70.0,
        };
        let obs: Vec<Observation> = (0..16)
            .map(|i| {
                let t = 20.0 + 5.0 * i as f64;
                let wobble = if i % 2 == 0 { 3.0 } else { -3.0 };
                Observation::new(t, predict(&truth, t) + wobble)
            })
            .collect();
        let selection = fit_and_select(&obs, ModelSpec::Auto, &GridConfig::default()).unwrap();
        assert_eq!(selection.best.kind(), ModelKind::FiveParam);
    }

    #[test]
    fn too_few_points_is_an_insufficient_data_error() {
        let obs = vec![
            Observation::new(20.0, 2000.0),
            Observation::new(50.0, 1000.0),
            Observation::new(85.0, 1800.0),
        ];
        let err = fit_and_select(&obs, ModelSpec::Auto, &GridConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn five_param_is_skipped_below_six_points() {
        let truth = ModelParameters::ThreeParamHeating {
            base: 1000.0,
            slope_heat: 50.0,
            change_point: 55.0,
        };
        let obs: Vec<Observation> = [20.0, 35.0, 50.0, 65.0, 80.0]
            .iter()
            .map(|&t| Observation::new(t, predict(&truth, t)))
            .collect();
        let selection = fit_and_select(&obs, ModelSpec::Auto, &GridConfig::default()).unwrap();
        assert_eq!(selection.best.kind(), ModelKind::ThreeParamHeating);
        assert_eq!(selection.skipped.len(), 1);
        assert_eq!(selection.skipped[0].0, ModelKind::FiveParam);
    }

    #[test]
    fn baseline_fit_exposes_savings_uncertainty() {
        let truth = ModelParameters::ThreeParamHeating {
            base: 1000.0,
            slope_heat: 50.0,
            change_point: 55.0,
        };
        let mut obs = monthly(&truth);
        obs[4].energy += 60.0;
        let fit = fit_model(ModelKind::ThreeParamHeating, &obs, &GridConfig::default()).unwrap();
        let baseline = evaluate_fit(&obs, fit);
        let table = TValueTable::default();
        assert!(!baseline.savings_uncertainty(0.0, 0.9, &table).is_bounded());
        assert!(baseline.savings_uncertainty(0.2, 0.9, &table).is_bounded());
    }
}
