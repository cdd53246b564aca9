//! Parameter estimation.
//!
//! Responsibilities:
//!
//! - run bound-constrained Levenberg–Marquardt for one model (`lm`)
//! - collect samples and turn a solve into a [`FitReport`] (`fitter`)
//! - fit every candidate of a device and select by BIC (`selection`)

pub mod fitter;
pub mod lm;
pub mod selection;

pub use fitter::*;
pub use lm::{LinearSolverKind, LmOptions, Termination};
pub use selection::*;
