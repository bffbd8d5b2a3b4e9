//! Validation statistics for fitted baseline models.
//!
//! - NMBE / CV(RMSE) / R² and acceptance criteria (`validation`)
//! - fractional savings uncertainty (`uncertainty`)

pub mod uncertainty;
pub mod validation;

pub use uncertainty::*;
pub use validation::*;
