//! Mathematical utilities: ramp regressors and the small normal-equation solver.

pub mod ramp;
pub mod solve;

pub use ramp::*;
pub use solve::*;
