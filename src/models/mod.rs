//! Triode equation families.
//!
//! - `params`: shared, index-addressed parameter storage and bounds
//! - `model`: forward equations and the [`TriodeModel`] wrapper
//! - `inverse`: anode voltage for a target current

pub mod inverse;
pub mod model;
pub mod params;

pub use inverse::{MAX_INVERSE_ITERATIONS, solve_anode_voltage};
pub use model::TriodeModel;
pub use params::{Bound, BoundSet, PARAM_COUNT, ParamIndex, Parameter, ParameterSet};
