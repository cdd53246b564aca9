//! Read/write device JSON documents.
//!
//! A device document describes one tube: its name, physical envelope and one
//! parameter block per fitted triode family.
//!
//! ```json
//! {
//!   "name": "12AX7",
//!   "vaMax": 300.0, "iaMax": 3.0, "paMax": 1.0,
//!   "triode": {
//!     "vg1Max": 4.0,
//!     "improvedKoren": { "kg": 1.2, "mu": 96.0, "alpha": 1.4, "vct": 0.2, "kp": 600.0, "kvb": 300.0, "kvb2": 30.0 },
//!     "koren": { "...": 0.0 },
//!     "simple": { "...": 0.0 }
//!   }
//! }
//! ```
//!
//! Every field is optional on input; absent fields keep their defaults.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::AppError;
use crate::models::ParamIndex;

/// Parameter block of one triode family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kvb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kvb2: Option<f64>,
}

impl ModelFields {
    pub fn get(&self, index: ParamIndex) -> Option<f64> {
        match index {
            ParamIndex::Kg => self.kg,
            ParamIndex::Mu => self.mu,
            ParamIndex::Alpha => self.alpha,
            ParamIndex::Vct => self.vct,
            ParamIndex::Kp => self.kp,
            ParamIndex::Kvb => self.kvb,
            ParamIndex::Kvb2 => self.kvb2,
        }
    }

    pub fn set(&mut self, index: ParamIndex, value: f64) {
        let slot = match index {
            ParamIndex::Kg => &mut self.kg,
            ParamIndex::Mu => &mut self.mu,
            ParamIndex::Alpha => &mut self.alpha,
            ParamIndex::Vct => &mut self.vct,
            ParamIndex::Kp => &mut self.kp,
            ParamIndex::Kvb => &mut self.kvb,
            ParamIndex::Kvb2 => &mut self.kvb2,
        };
        *slot = Some(value);
    }
}

/// The `triode` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriodeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vg1_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_koren: Option<ModelFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub koren: Option<ModelFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple: Option<ModelFields>,
}

/// Root object of a device document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub va_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ia_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pa_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triode: Option<TriodeSection>,
}

/// Parse a device document from a JSON string.
pub fn parse_device_json(text: &str) -> Result<Device, AppError> {
    let doc: DeviceDocument =
        serde_json::from_str(text).map_err(|e| AppError::new(2, format!("Invalid device JSON: {e}")))?;
    Ok(Device::from_document(&doc))
}

/// Read a device JSON file.
pub fn read_device_json(path: &Path) -> Result<Device, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open device JSON '{}': {e}", path.display())))?;
    let doc: DeviceDocument = serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid device JSON '{}': {e}", path.display())))?;
    Ok(Device::from_document(&doc))
}

/// Render the device (selected model only) as pretty JSON.
pub fn device_json_string(device: &Device) -> Result<String, AppError> {
    serde_json::to_string_pretty(&device.to_document())
        .map_err(|e| AppError::new(2, format!("Failed to serialize device JSON: {e}")))
}

/// Write a device JSON file (selected model only).
pub fn write_device_json(path: &Path, device: &Device) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create device JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &device.to_document())
        .map_err(|e| AppError::new(2, format!("Failed to write device JSON: {e}")))?;
    Ok(())
}
