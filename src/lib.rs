//! `tube-fit` library crate.
//!
//! The binary (`tubefit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the model, device and circuit types can be embedded elsewhere
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod circuit;
pub mod cli;
pub mod data;
pub mod device;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
