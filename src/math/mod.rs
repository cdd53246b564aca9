//! Mathematical utilities: triode transfer functions and linear solvers.

pub mod linear;
pub mod transfer;

pub use linear::*;
pub use transfer::*;
