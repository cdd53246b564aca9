//! Error types.
//!
//! Two layers:
//! - [`ModelError`]: failures of the numerical core (inverse solve, model selection)
//! - [`AppError`]: what the binary reports, carrying a process exit code
//!
//! Fitter non-convergence is deliberately *not* an error; it is reported through
//! `FitStatus` so the caller decides whether the parameters are usable.

use thiserror::Error;

/// Errors raised by the model / device / circuit core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The inverse solver was asked for a target current it cannot divide by.
    #[error("Target anode current must be finite and > 0 (got {ia}).")]
    NonPositiveTarget { ia: f64 },

    /// The inverse solver hit its iteration cap.
    #[error(
        "Anode voltage search did not converge for ia={ia} mA, vg1={vg1} V after {iterations} iterations (last va={last_va:.3} V)."
    )]
    InverseDidNotConverge {
        ia: f64,
        vg1: f64,
        iterations: usize,
        last_va: f64,
    },

    /// Delegated operation on a device with no candidate model.
    #[error("Device has no model selected.")]
    NoModelSelected,

    /// A requested model family is not present on the device.
    #[error("Device '{device}' has no {model} model.")]
    ModelNotFound { device: String, model: String },

    /// Not enough samples to fit any candidate.
    #[error("Insufficient samples to fit any model: {0}")]
    InsufficientSamples(String),

    /// Every candidate failed to produce finite residuals.
    #[error("No candidate model produced a usable fit.")]
    NoUsableFit,
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::new(4, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
