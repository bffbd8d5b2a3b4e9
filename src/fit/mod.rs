//! Change-point fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate change-point grids for 3P / 5P
//! - evaluate each candidate tuple (parallel)
//! - select the best model using BIC + guardrails

pub mod fitter;
pub mod grid;
pub mod selection;

pub use fitter::*;
pub use grid::*;
pub use selection::*;
