//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - passed between the fitter, the device and the circuit code
//! - handed to the plotting/UI collaborators without conversion
//! - built from CLI flags in `app`

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One measured (or synthesized) operating point.
///
/// Currents are in mA, voltages in V relative to the cathode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub va: f64,
    pub vg1: f64,
    /// Screen-grid voltage. Always 0 for triodes.
    pub vg2: f64,
    pub ia: f64,
}

impl Sample {
    pub fn new(va: f64, vg1: f64, vg2: f64, ia: f64) -> Self {
        Self { va, vg1, vg2, ia }
    }

    pub fn triode(va: f64, vg1: f64, ia: f64) -> Self {
        Self::new(va, vg1, 0.0, ia)
    }
}

/// Triode equation family.
///
/// The set is closed: each variant refines the previous one and reuses its
/// parameter slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelKind {
    Simple,
    Koren,
    ImprovedKoren,
}

impl ModelKind {
    /// Order in which candidates are built from a device document
    /// (most refined first).
    pub const PRIORITY: [ModelKind; 3] = [ModelKind::ImprovedKoren, ModelKind::Koren, ModelKind::Simple];

    /// Human-readable label for terminal output / model pickers.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Simple => "Simple",
            ModelKind::Koren => "Koren",
            ModelKind::ImprovedKoren => "Improved Koren",
        }
    }
}

/// Which model(s) to fit from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSpec {
    /// Fit every candidate on the device and select by BIC.
    Auto,
    Simple,
    Koren,
    ImprovedKoren,
}

impl ModelSpec {
    pub fn to_kind(self) -> Option<ModelKind> {
        match self {
            ModelSpec::Auto => None,
            ModelSpec::Simple => Some(ModelKind::Simple),
            ModelSpec::Koren => Some(ModelKind::Koren),
            ModelSpec::ImprovedKoren => Some(ModelKind::ImprovedKoren),
        }
    }
}

/// Physical envelope of a device.
///
/// Units: V, mA, W.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLimits {
    pub va_max: f64,
    pub ia_max: f64,
    pub vg1_max: f64,
    pub vg2_max: f64,
    pub pa_max: f64,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            va_max: 400.0,
            ia_max: 6.0,
            vg1_max: 4.0,
            vg2_max: 400.0,
            pa_max: 1.25,
        }
    }
}

/// A straight line between two points in data coordinates.
///
/// This is the unit handed to the plotting collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Segment {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// A (label, value) pair handed to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    pub label: String,
    pub value: f64,
}

/// A `tubefit fit` run as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub device_path: PathBuf,
    pub samples_path: PathBuf,
    pub model_spec: ModelSpec,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub output_device: Option<PathBuf>,
    pub export_residuals: Option<PathBuf>,
    pub export_report: Option<PathBuf>,
}

/// A `tubefit bias` run.
#[derive(Debug, Clone)]
pub struct BiasConfig {
    pub device_path: PathBuf,
    /// Model override; `None` or `Auto` keeps the device's selection.
    pub model: Option<ModelSpec>,
    /// Supply voltage (V).
    pub vb: f64,
    /// Anode resistor (ohms).
    pub ra: f64,
    /// Cathode resistor (ohms).
    pub rk: f64,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

/// A `tubefit synth` run.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub template_path: PathBuf,
    pub model: ModelKind,
    /// Relative Gaussian noise on ia (0 disables noise).
    pub noise: f64,
    pub seed: u64,
    pub out: PathBuf,
}
