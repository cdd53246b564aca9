//! Measurement templates and synthetic sample generation.

pub mod sample;
pub mod template;

pub use sample::*;
pub use template::*;
