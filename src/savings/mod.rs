//! Avoided-energy savings for a reporting period.
//!
//! The baseline model is applied to reporting-period temperatures to produce the
//! counterfactual ("adjusted baseline"). Savings per period are
//! `predicted - (actual - non_routine_adjustment)`.
//!
//! The savings fraction is `Σ savings / Σ predicted`, and its uncertainty comes
//! from the baseline model's CV(RMSE) (see [`crate::stats::uncertainty`]).
//!
//! A building metered for several fuels gets one summary per [`Meter`]. Energy
//! units differ between fuels, so only cost and CO₂ are combined
//! ([`combine_fuel_savings`]).

use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;

use crate::domain::Observation;
use crate::fit::selection::BaselineFit;
use crate::models::predict;
use crate::stats::{TValueTable, UncertaintyEstimate};

/// A step change in consumption unrelated to the efficiency measure
/// (e.g. added equipment), removed from actual reporting energy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NonRoutineAdjustment {
    /// Energy removed from each affected period.
    pub amount: f64,
    /// First affected period (1-based, in reporting order).
    pub start_period: usize,
}

impl NonRoutineAdjustment {
    fn amount_for(&self, index: usize) -> f64 {
        if index + 1 >= self.start_period {
            self.amount
        } else {
            0.0
        }
    }
}

/// Unit rates used to value energy savings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Valuation {
    /// Currency per energy unit.
    pub price_per_unit: f64,
    /// Metric tons CO₂ per energy unit.
    pub co2_per_unit: f64,
}

/// Utility presets for [`Valuation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Fuel {
    /// Electricity in kWh.
    Electric,
    /// Natural gas in therms.
    Gas,
}

impl Fuel {
    pub fn unit(self) -> &'static str {
        match self {
            Fuel::Electric => "kWh",
            Fuel::Gas => "therm",
        }
    }

    pub fn valuation(self) -> Valuation {
        match self {
            Fuel::Electric => Valuation {
                price_per_unit: 0.105,
                co2_per_unit: 0.000417,
            },
            Fuel::Gas => Valuation {
                price_per_unit: 1.15,
                co2_per_unit: 0.005302,
            },
        }
    }
}

/// An energy column of the input CSV and the fuel it meters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meter {
    pub column: String,
    pub fuel: Fuel,
}

impl FromStr for Meter {
    type Err = String;

    /// Parses `COLUMN=FUEL`, e.g. `total_therms=gas`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, fuel) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("expected COLUMN=FUEL, got '{s}'"))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(format!("missing column name in '{s}'"));
        }
        let fuel = <Fuel as ValueEnum>::from_str(fuel.trim(), true)?;
        Ok(Self {
            column: column.to_string(),
            fuel,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavingsOptions {
    pub nra: Option<NonRoutineAdjustment>,
    pub valuation: Option<Valuation>,
    pub confidence: f64,
    pub t_table: TValueTable,
}

impl Default for SavingsOptions {
    fn default() -> Self {
        Self {
            nra: None,
            valuation: None,
            confidence: 0.90,
            t_table: TValueTable::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSavings {
    pub label: Option<String>,
    pub temperature: f64,
    pub predicted: f64,
    pub actual: f64,
    pub adjustment: f64,
    pub adjusted_actual: f64,
    pub savings: f64,
    pub cost: Option<f64>,
    pub co2: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SavingsTotals {
    pub predicted: f64,
    pub actual: f64,
    pub adjustment: f64,
    pub adjusted_actual: f64,
    pub savings: f64,
    pub cost: Option<f64>,
    pub co2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsSummary {
    pub periods: Vec<PeriodSavings>,
    pub totals: SavingsTotals,
    /// `Σ savings / Σ predicted`; zero when the prediction total is not positive.
    pub savings_fraction: f64,
    /// CV(RMSE) of the baseline model, in percent.
    pub baseline_cvrmse: f64,
    pub uncertainty: UncertaintyEstimate,
}

/// Project the baseline onto the reporting period and total the savings.
pub fn compute_savings(baseline: &BaselineFit, reporting: &[Observation], options: &SavingsOptions) -> SavingsSummary {
    let params = baseline.parameters();

    let periods: Vec<PeriodSavings> = reporting
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            let predicted = predict(params, obs.temperature);
            let adjustment = options.nra.map(|nra| nra.amount_for(i)).unwrap_or(0.0);
            let adjusted_actual = obs.energy - adjustment;
            let savings = predicted - adjusted_actual;
            PeriodSavings {
                label: obs.label.clone(),
                temperature: obs.temperature,
                predicted,
                actual: obs.energy,
                adjustment,
                adjusted_actual,
                savings,
                cost: options.valuation.map(|v| savings * v.price_per_unit),
                co2: options.valuation.map(|v| savings * v.co2_per_unit),
            }
        })
        .collect();

    let mut totals = SavingsTotals::default();
    for p in &periods {
        totals.predicted += p.predicted;
        totals.actual += p.actual;
        totals.adjustment += p.adjustment;
        totals.adjusted_actual += p.adjusted_actual;
        totals.savings += p.savings;
    }
    if options.valuation.is_some() {
        totals.cost = Some(periods.iter().filter_map(|p| p.cost).sum());
        totals.co2 = Some(periods.iter().filter_map(|p| p.co2).sum());
    }

    let savings_fraction = if totals.predicted > 0.0 {
        totals.savings / totals.predicted
    } else {
        0.0
    };

    // Negative savings have no meaningful relative uncertainty either.
    let uncertainty = if savings_fraction > 0.0 {
        baseline.savings_uncertainty(savings_fraction, options.confidence, &options.t_table)
    } else {
        UncertaintyEstimate::unbounded(options.confidence)
    };

    SavingsSummary {
        periods,
        totals,
        savings_fraction,
        baseline_cvrmse: baseline.validation.cvrmse,
        uncertainty,
    }
}

/// Cost and CO₂ summed across fuels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CombinedTotals {
    pub cost: f64,
    pub co2: f64,
}

/// Sum valued totals across per-fuel summaries. Summaries without a valuation
/// contribute nothing.
pub fn combine_fuel_savings<'a>(summaries: impl IntoIterator<Item = &'a SavingsSummary>) -> CombinedTotals {
    summaries
        .into_iter()
        .fold(CombinedTotals::default(), |acc, s| CombinedTotals {
            cost: acc.cost + s.totals.cost.unwrap_or(0.0),
            co2: acc.co2 + s.totals.co2.unwrap_or(0.0),
        })
}
