//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations (`Observation`) and CSV column conventions (`ColumnSpec`)
//! - the change-point model family (`ModelKind`, `ModelParameters`, `ModelSpec`)
//! - fit outputs (`FitResult`, `FitQuality`, `ModelFile`)
//! - run configuration (`FitConfig`, `SavingsConfig`)

pub mod types;

pub use types::*;
