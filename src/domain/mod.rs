//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - measurement samples (`Sample`)
//! - the closed set of triode equation families (`ModelKind`, `ModelSpec`)
//! - device envelopes and collaborator payloads (`DeviceLimits`, `Segment`, `ParameterRow`)
//! - per-command run configuration (`FitConfig`, `BiasConfig`, `SynthConfig`)

pub mod types;

pub use types::*;
