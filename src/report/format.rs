//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (and covered by snapshot tests)

use crate::domain::{FitConfig, Granularity, ModelParameters, ObservationResidual};
use crate::fit::selection::FitSelection;
use crate::io::ingest::IngestedData;
use crate::report::Outliers;
use crate::savings::{CombinedTotals, Meter, SavingsSummary};
use crate::stats::{Criteria, ValidationReport};

/// Format the full run summary (dataset stats + fit diagnostics + chosen model).
pub fn format_run_summary(ingest: &IngestedData, selection: &FitSelection, config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str("=== mvb - change-point baseline ===\n");
    out.push_str(&format!("Baseline: {}\n", config.baseline_path.display()));
    out.push_str(&format!(
        "Columns: temperature=`{}` energy=`{}`\n",
        config.columns.temperature, config.columns.energy
    ));
    out.push_str(&format!("Granularity: {}\n", granularity_label(config.granularity)));
    out.push_str(&format!(
        "Points: n={} | temperature=[{:.2}, {:.2}] | energy=[{:.2}, {:.2}]\n",
        ingest.stats.n_points,
        ingest.stats.temperature_min,
        ingest.stats.temperature_max,
        ingest.stats.energy_min,
        ingest.stats.energy_max
    ));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    for e in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... and {} more\n", ingest.row_errors.len() - 5));
    }

    out.push_str("\nModel diagnostics:\n");
    for fit in &selection.fits {
        let chosen = if fit.kind() == selection.best.kind() { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<20} SSE={:.3} RMSE={:.3} BIC={:.3} CV(RMSE)={:.2}%\n",
            fit.kind().display_name(),
            fit.quality.sse,
            fit.quality.rmse,
            fit.quality.bic,
            fit.validation.cvrmse,
        ));
    }
    for (kind, reason) in &selection.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }

    out.push_str("\nChosen model:\n");
    out.push_str(&format_parameters(selection.best.parameters()));
    out.push('\n');

    out
}

/// One line per parameter, in model order.
pub fn format_parameters(params: &ModelParameters) -> String {
    let mut out = format!("- {}\n", params.kind().display_name());
    let fields: Vec<(&str, f64)> = match *params {
        ModelParameters::ThreeParamHeating {
            base,
            slope_heat,
            change_point,
        } => vec![("base", base), ("slope_heat", slope_heat), ("change_point", change_point)],
        ModelParameters::FiveParam {
            base,
            slope_heat,
            cp_heat,
            slope_cool,
            cp_cool,
        } => vec![
            ("base", base),
            ("slope_heat", slope_heat),
            ("cp_heat", cp_heat),
            ("slope_cool", slope_cool),
            ("cp_cool", cp_cool),
        ],
    };
    for (name, value) in fields {
        out.push_str(&format!("- {name:<12} {value:.4}\n"));
    }
    out
}

/// Guideline 14 acceptance table.
pub fn format_validation(report: &ValidationReport, granularity: Granularity) -> String {
    let criteria = Criteria::for_granularity(granularity);
    let assessment = report.assess(&criteria);

    let mut out = format!("Guideline 14 validation ({}):\n", granularity_label(granularity));
    out.push_str(&format!("{:<10} {:>10} {:>10} {}\n", "statistic", "value", "limit", "result"));
    out.push_str(&format!("{:-<10} {:-<10} {:-<10} {:-<6}\n", "", "", "", ""));

    let rows = [
        (
            "NMBE",
            format!("{:.2}%", report.nmbe),
            format!("±{:.2}%", criteria.max_abs_nmbe),
            assessment.nmbe_pass,
        ),
        (
            "CV(RMSE)",
            format!("{:.2}%", report.cvrmse),
            format!("≤{:.2}%", criteria.max_cvrmse),
            assessment.cvrmse_pass,
        ),
        (
            "R²",
            format!("{:.4}", report.r_squared),
            format!("≥{:.2}", criteria.min_r_squared),
            assessment.r_squared_pass,
        ),
    ];
    for (name, value, limit, pass) in rows {
        out.push_str(&format!("{name:<10} {value:>10} {limit:>10} {}\n", verdict(pass)));
    }
    out.push_str(&format!("Overall: {}\n", verdict(assessment.passes())));
    out
}

/// Periods the model over- and under-predicts the most.
pub fn format_outliers(outliers: &Outliers) -> String {
    let mut out = String::new();

    out.push_str("Largest positive residuals (actual above model):\n");
    out.push_str(&format_residual_table(&outliers.over));
    out.push('\n');

    out.push_str("Largest negative residuals (actual below model):\n");
    out.push_str(&format_residual_table(&outliers.under));

    out
}

fn format_residual_table(rows: &[ObservationResidual]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:>8} {:>12} {:>12} {:>12}\n",
        "period", "temp", "actual", "predicted", "residual"
    ));
    out.push_str(&format!("{:-<12} {:-<8} {:-<12} {:-<12} {:-<12}\n", "", "", "", "", ""));
    for r in rows {
        let o = &r.observation;
        out.push_str(&format!(
            "{:<12} {:>8.2} {:>12.2} {:>12.2} {:>12.2}\n",
            truncate(o.label.as_deref().unwrap_or("-"), 12),
            o.temperature,
            o.energy,
            r.predicted,
            r.residual,
        ));
    }
    out
}

/// Per-period savings, totals, fraction, and uncertainty.
pub fn format_savings(summary: &SavingsSummary) -> String {
    let mut out = String::from("Avoided energy (reporting period):\n");
    let valued = summary.totals.cost.is_some();

    let mut header = format!(
        "{:<12} {:>8} {:>12} {:>12} {:>10} {:>12}",
        "period", "temp", "predicted", "actual", "nra", "savings"
    );
    if valued {
        header.push_str(&format!(" {:>10} {:>10}", "cost", "tCO2"));
    }
    out.push_str(&header);
    out.push('\n');

    for (i, p) in summary.periods.iter().enumerate() {
        let fallback = (i + 1).to_string();
        let mut line = format!(
            "{:<12} {:>8.2} {:>12.2} {:>12.2} {:>10.2} {:>12.2}",
            truncate(p.label.as_deref().unwrap_or(&fallback), 12),
            p.temperature,
            p.predicted,
            p.actual,
            p.adjustment,
            p.savings,
        );
        if let (Some(cost), Some(co2)) = (p.cost, p.co2) {
            line.push_str(&format!(" {cost:>10.2} {co2:>10.4}"));
        }
        out.push_str(&line);
        out.push('\n');
    }

    let t = &summary.totals;
    let mut line = format!(
        "{:<12} {:>8} {:>12.2} {:>12.2} {:>10.2} {:>12.2}",
        "TOTAL", "", t.predicted, t.actual, t.adjustment, t.savings
    );
    if let (Some(cost), Some(co2)) = (t.cost, t.co2) {
        line.push_str(&format!(" {cost:>10.2} {co2:>10.4}"));
    }
    out.push_str(&line);
    out.push('\n');

    out.push_str(&format!("\nSavings fraction: {:.2}%\n", summary.savings_fraction * 100.0));
    out.push_str(&format!("Baseline CV(RMSE): {:.2}%\n", summary.baseline_cvrmse));
    let confidence = summary.uncertainty.confidence_level * 100.0;
    match summary.uncertainty.as_percent() {
        Some(fsu) => out.push_str(&format!(
            "Fractional savings uncertainty: ±{fsu:.1}% at {confidence:.0}% confidence\n"
        )),
        None => out.push_str(&format!(
            "Fractional savings uncertainty: unbounded at {confidence:.0}% confidence (no savings)\n"
        )),
    }
    out
}

/// One line per fuel plus the combined cost and CO₂.
pub fn format_combined_savings(fuels: &[(&Meter, &SavingsSummary)], combined: &CombinedTotals) -> String {
    let mut out = String::from("Combined savings:\n");
    out.push_str(&format!(
        "{:<16} {:<8} {:>14} {:>8} {:>12} {:>10}\n",
        "meter", "fuel", "savings", "pct", "cost", "tCO2"
    ));
    for (meter, summary) in fuels {
        let t = &summary.totals;
        out.push_str(&format!(
            "{:<16} {:<8} {:>14} {:>7.1}% {:>12.2} {:>10.4}\n",
            truncate(&meter.column, 16),
            meter.fuel.unit(),
            format!("{:.2}", t.savings),
            summary.savings_fraction * 100.0,
            t.cost.unwrap_or(0.0),
            t.co2.unwrap_or(0.0),
        ));
    }
    out.push_str(&format!(
        "{:<16} {:<8} {:>14} {:>8} {:>12.2} {:>10.4}\n",
        "TOTAL", "", "", "", combined.cost, combined.co2
    ));
    out
}

pub fn granularity_label(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Monthly => "monthly",
        Granularity::Hourly => "hourly",
    }
}

fn verdict(pass: bool) -> &'static str {
    if pass { "PASS" } else { "FAIL" }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::savings::{PeriodSavings, SavingsTotals};
    use crate::stats::UncertaintyEstimate;

    #[test]
    fn validation_table_snapshot() {
        let report = ValidationReport {
            nmbe: 0.5,
            cvrmse: 3.25,
            r_squared: 0.875,
        };
        let expected = "\
Guideline 14 validation (monthly):
statistic       value      limit result
---------- ---------- ---------- ------
NMBE            0.50%     ±5.00% PASS
CV(RMSE)        3.25%    ≤15.00% PASS
R²             0.8750      ≥0.75 PASS
Overall: PASS
";
        assert_eq!(format_validation(&report, Granularity::Monthly), expected);
    }

    #[test]
    fn validation_table_flags_failures() {
        let report = ValidationReport {
            nmbe: -6.0,
            cvrmse: 20.0,
            r_squared: 0.9,
        };
        let monthly = format_validation(&report, Granularity::Monthly);
        assert!(monthly.contains("NMBE           -6.00%     ±5.00% FAIL\n"));
        assert!(monthly.ends_with("Overall: FAIL\n"));

        let hourly = format_validation(&report, Granularity::Hourly);
        assert!(hourly.ends_with("Overall: PASS\n"), "{hourly}");
    }

    #[test]
    fn parameters_listing() {
        let params = ModelParameters::ThreeParamHeating {
            base: 1000.0,
            slope_heat: 50.0,
            change_point: 55.0,
        };
        assert_eq!(
            format_parameters(&params),
            "- 3P heating\n- base         1000.0000\n- slope_heat   50.0000\n- change_point 55.0000\n"
        );
    }

    #[test]
    fn savings_report_mentions_unbounded_uncertainty() {
        let summary = SavingsSummary {
            periods: vec![PeriodSavings {
                label: Some("Jan".to_string()),
                temperature: 30.0,
                predicted: 100.0,
                actual: 100.0,
                adjustment: 0.0,
                adjusted_actual: 100.0,
                savings: 0.0,
                cost: None,
                co2: None,
            }],
            totals: SavingsTotals {
                predicted: 100.0,
                actual: 100.0,
                adjusted_actual: 100.0,
                ..SavingsTotals::default()
            },
            savings_fraction: 0.0,
            baseline_cvrmse: 4.0,
            uncertainty: UncertaintyEstimate::unbounded(0.9),
        };
        let text = format_savings(&summary);
        assert!(text.contains("Savings fraction: 0.00%"));
        assert!(text.contains("unbounded at 90% confidence"));
        assert!(!text.contains("cost"));
    }

    #[test]
    fn combined_savings_snapshot() {
        let summary = |savings: f64, fraction: f64, cost: f64, co2: f64| SavingsSummary {
            periods: Vec::new(),
            totals: SavingsTotals {
                savings,
                cost: Some(cost),
                co2: Some(co2),
                ..SavingsTotals::default()
            },
            savings_fraction: fraction,
            baseline_cvrmse: 5.0,
            uncertainty: UncertaintyEstimate::unbounded(0.9),
        };
        let electric: Meter = "total_kwh=electric".parse().unwrap();
        let gas: Meter = "total_therms=gas".parse().unwrap();
        let elec = summary(4000.0, 0.2, 420.0, 1.668);
        let therms = summary(300.0, 0.1, 345.0, 1.5906);
        let combined = CombinedTotals {
            cost: 765.0,
            co2: 3.2586,
        };

        let text = format_combined_savings(&[(&electric, &elec), (&gas, &therms)], &combined);
        let expected = concat!(
            "Combined savings:\n",
            "meter            fuel            savings      pct         cost       tCO2\n",
            "total_kwh        kWh             4000.00    20.0%       420.00     1.6680\n",
            "total_therms     therm            300.00    10.0%       345.00     1.5906\n",
            "TOTAL                                                   765.00     3.2586\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn truncate_marks_cut_labels() {
        assert_eq!(truncate("2024-01-billing", 8), "2024-01.");
        assert_eq!(truncate("Jan", 8), "Jan");
    }
}
