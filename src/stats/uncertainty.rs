//! Fractional savings uncertainty (FSU).
//!
//! Simplified ASHRAE Guideline 14 form:
//!
//! ```text
//! FSU = t · (CV(RMSE) / 100) / (F · sqrt(n))
//! ```
//!
//! where `F` is the savings fraction and `n` the number of baseline periods.
//! `F == 0` has no bounded relative uncertainty; the estimate then carries
//! `f64::INFINITY`, which callers check with [`UncertaintyEstimate::is_bounded`]
//! before formatting a percentage.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::validation::cvrmse;

/// Tolerance when matching a requested confidence level against the table.
const CONFIDENCE_EPS: f64 = 1e-9;

/// Student-t multipliers by confidence level.
///
/// Unknown confidence levels resolve to `fallback` (the 90% value by default)
/// instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct TValueTable {
    entries: Vec<(f64, f64)>,
    fallback: f64,
}

impl Default for TValueTable {
    fn default() -> Self {
        Self {
            entries: vec![(0.80, 1.356), (0.90, 1.796), (0.95, 2.201), (0.99, 3.106)],
            fallback: 1.796,
        }
    }
}

impl TValueTable {
    pub fn new(entries: Vec<(f64, f64)>, fallback: f64) -> Self {
        Self { entries, fallback }
    }

    /// Add (or replace) a confidence level.
    pub fn with_entry(mut self, confidence: f64, t: f64) -> Self {
        match self
            .entries
            .iter_mut()
            .find(|(c, _)| (c - confidence).abs() < CONFIDENCE_EPS)
        {
            Some(entry) => entry.1 = t,
            None => self.entries.push((confidence, t)),
        }
        self
    }

    /// Exact table entry, if present.
    pub fn get(&self, confidence: f64) -> Option<f64> {
        self.entries
            .iter()
            .find(|(c, _)| (c - confidence).abs() < CONFIDENCE_EPS)
            .map(|&(_, t)| t)
    }

    /// Table entry or the fallback value.
    pub fn lookup(&self, confidence: f64) -> f64 {
        self.get(confidence).unwrap_or_else(|| {
            debug!(confidence, fallback = self.fallback, "unknown confidence level; using fallback t-value");
            self.fallback
        })
    }

    pub fn entries(&self) -> &[(f64, f64)] {
        &self.entries
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }
}

/// FSU at a confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyEstimate {
    /// Half-width of the confidence interval as a fraction of savings.
    /// `f64::INFINITY` when the savings fraction is zero.
    pub fractional_savings_uncertainty: f64,
    pub confidence_level: f64,
}

impl UncertaintyEstimate {
    pub fn unbounded(confidence_level: f64) -> Self {
        Self {
            fractional_savings_uncertainty: f64::INFINITY,
            confidence_level,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.fractional_savings_uncertainty.is_finite()
    }

    /// FSU in percent, or `None` when unbounded.
    pub fn as_percent(&self) -> Option<f64> {
        self.is_bounded()
            .then_some(self.fractional_savings_uncertainty * 100.0)
    }
}

/// Fractional savings uncertainty from a baseline model's fit.
///
/// `actual` / `predicted` are the baseline-period series the model was fitted on.
/// A negative `savings_fraction` is taken by magnitude, so the result is never negative.
pub fn fractional_savings_uncertainty(
    actual: &[f64],
    predicted: &[f64],
    savings_fraction: f64,
    confidence: f64,
    table: &TValueTable,
) -> UncertaintyEstimate {
    if savings_fraction == 0.0 {
        return UncertaintyEstimate::unbounded(confidence);
    }
    let n = actual.len() as f64;
    let t = table.lookup(confidence);
    let cv = cvrmse(actual, predicted);
    UncertaintyEstimate {
        fractional_savings_uncertainty: t * (cv / 100.0) / (savings_fraction.abs() * n.sqrt()),
        confidence_level: confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTUAL: [f64; 12] = [
        2400.0, 2200.0, 1900.0, 1500.0, 1200.0, 1050.0, 1000.0, 1010.0, 1100.0, 1450.0, 1800.0, 2300.0,
    ];

    fn predicted() -> Vec<f64> {
        ACTUAL
            .iter()
            .enumerate()
            .map(|(i, a)| if i % 2 == 0 { a + 40.0 } else { a - 35.0 })
            .collect()
    }

    #[test]
    fn zero_savings_is_unbounded() {
        let est = fractional_savings_uncertainty(&ACTUAL, &predicted(), 0.0, 0.9, &TValueTable::default());
        assert!(!est.is_bounded());
        assert!(est.fractional_savings_uncertainty.is_infinite());
        assert_eq!(est.as_percent(), None);
    }

    #[test]
    fn nonzero_savings_is_finite_and_positive() {
        let table = TValueTable::default();
        let est = fractional_savings_uncertainty(&ACTUAL, &predicted(), 0.15, 0.9, &table);
        assert!(est.is_bounded());
        assert!(est.fractional_savings_uncertainty > 0.0);

        let cv = cvrmse(&ACTUAL, &predicted());
        let expected = 1.796 * (cv / 100.0) / (0.15 * 12.0_f64.sqrt());
        assert!((est.fractional_savings_uncertainty - expected).abs() < 1e-12);
    }

    #[test]
    fn small_sample_is_finite_and_positive() {
        let est = fractional_savings_uncertainty(
            &[10.0, 12.0, 11.0],
            &[10.5, 11.0, 11.5],
            0.1,
            0.9,
            &TValueTable::default(),
        );
        assert!(est.is_bounded());
        assert!(est.fractional_savings_uncertainty > 0.0);
    }

    #[test]
    fn negative_fraction_uses_its_magnitude() {
        let table = TValueTable::default();
        let p = predicted();
        let up = fractional_savings_uncertainty(&ACTUAL, &p, 0.1, 0.9, &table);
        let down = fractional_savings_uncertainty(&ACTUAL, &p, -0.1, 0.9, &table);
        assert_eq!(up.fractional_savings_uncertainty, down.fractional_savings_uncertainty);
    }

    #[test]
    fn higher_confidence_widens_the_interval() {
        let table = TValueTable::default();
        let p = predicted();
        let f90 = fractional_savings_uncertainty(&ACTUAL, &p, 0.2, 0.90, &table);
        let f99 = fractional_savings_uncertainty(&ACTUAL, &p, 0.2, 0.99, &table);
        assert!(f99.fractional_savings_uncertainty > f90.fractional_savings_uncertainty);
    }

    #[test]
    fn unknown_confidence_falls_back_to_ninety_percent() {
        let table = TValueTable::default();
        assert_eq!(table.lookup(0.85), 1.796);
        assert_eq!(table.lookup(0.95), 2.201);
        assert_eq!(table.get(0.85), None);
    }

    #[test]
    fn table_accepts_extra_levels() {
        let table = TValueTable::default().with_entry(0.68, 1.0);
        assert_eq!(table.lookup(0.68), 1.0);
        let replaced = table.with_entry(0.90, 1.8);
        assert_eq!(replaced.lookup(0.90), 1.8);
    }
}
