#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the warp solver.
pub mod error;

/// Radial basis kernel for 3D thin-plate splines.
pub mod kernel;

/// Solved warp coefficients and single point evaluation.
pub mod coefficients;

/// Coefficient solver for landmark pairings.
pub mod solver;

/// Batch evaluation over point buffers.
pub mod warp;

pub use crate::coefficients::{TpsCoefficients, TpsNonAffineTerm};
pub use crate::error::WarpError;
pub use crate::solver::{solve_coefficients, solve_coefficients_with, TpsSolverOptions};
