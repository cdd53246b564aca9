//! Circuits built around a fitted device.
//!
//! Only the common-cathode triode stage exists today.

pub mod common_cathode;

pub use common_cathode::*;
