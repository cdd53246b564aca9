//! Common-cathode triode stage and its DC bias point.
//!
//! The stage is a triode with an anode resistor `Ra` to the supply `Vb` and a
//! cathode resistor `Rk` to ground. The bias point is where two curves meet:
//!
//! - the anode load line `ia = (Vb - va) / Ra`
//! - the cathode bias curve: for a grid bias `vg` the cathode resistor forces
//!   `ia = vg / Rk`, and the device then needs anode voltage
//!   `va = anode_voltage(ia, -vg)`
//!
//! The search samples the bias curve at 1000 evenly spaced grid voltages in
//! `(0, vg1_max]` and keeps the sample closest to the load line.
//!
//! Units: V, ohms, mA.

use tracing::{debug, info};

use crate::device::Device;
use crate::domain::{ParameterRow, Segment};
use crate::error::ModelError;

/// Number of bias-curve samples.
const BIAS_SAMPLES: usize = 1000;

/// Addressable circuit parameters, in UI order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonCathodeParam {
    SupplyVoltage,
    CathodeResistor,
    AnodeResistor,
    AnodeCurrent,
    BiasVk,
}

impl CommonCathodeParam {
    pub const ALL: [CommonCathodeParam; 5] = [
        CommonCathodeParam::SupplyVoltage,
        CommonCathodeParam::CathodeResistor,
        CommonCathodeParam::AnodeResistor,
        CommonCathodeParam::AnodeCurrent,
        CommonCathodeParam::BiasVk,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CommonCathodeParam::SupplyVoltage => "Supply Voltage",
            CommonCathodeParam::CathodeResistor => "Cathode Resistor",
            CommonCathodeParam::AnodeResistor => "Anode Resistor",
            CommonCathodeParam::AnodeCurrent => "Anode Current",
            CommonCathodeParam::BiasVk => "Bias Point (Vk)",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// The operating point found by [`TriodeCommonCathode::search_bias`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasPoint {
    /// Grid bias magnitude, equal to the cathode voltage `Vk`.
    pub vg: f64,
    pub va: f64,
    pub ia: f64,
    /// `|ia_load_line(va) - ia|` at this sample.
    pub deviation: f64,
}

/// Segments for the plotting collaborator plus the chosen bias point.
#[derive(Debug, Clone)]
pub struct BiasSearch {
    pub load_line: Vec<Segment>,
    pub bias_curve: Vec<Segment>,
    /// `None` if no sample came within the device's `ia_max` of the load line.
    pub bias: Option<BiasPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriodeCommonCathode {
    values: [f64; 5],
}

impl Default for TriodeCommonCathode {
    fn default() -> Self {
        Self {
            values: [300.0, 1000.0, 100_000.0, 0.0, 0.0],
        }
    }
}

impl TriodeCommonCathode {
    pub fn new(vb: f64, rk: f64, ra: f64) -> Self {
        Self {
            values: [vb, rk, ra, 0.0, 0.0],
        }
    }

    pub fn parameter(&self, param: CommonCathodeParam) -> f64 {
        self.values[param.slot()]
    }

    pub fn set_parameter(&mut self, param: CommonCathodeParam, value: f64) {
        self.values[param.slot()] = value;
    }

    pub fn vb(&self) -> f64 {
        self.parameter(CommonCathodeParam::SupplyVoltage)
    }

    pub fn rk(&self) -> f64 {
        self.parameter(CommonCathodeParam::CathodeResistor)
    }

    pub fn ra(&self) -> f64 {
        self.parameter(CommonCathodeParam::AnodeResistor)
    }

    pub fn parameter_rows(&self) -> Vec<ParameterRow> {
        CommonCathodeParam::ALL
            .iter()
            .map(|&p| ParameterRow {
                label: p.label().to_string(),
                value: self.parameter(p),
            })
            .collect()
    }

    /// Anode load line from `(0, Vb/Ra)` to `(Vb, 0)`.
    pub fn load_line(&self) -> Segment {
        Segment::new(0.0, self.vb() * 1000.0 / self.ra(), self.vb(), 0.0)
    }

    /// Find the bias point of this stage for `device`.
    ///
    /// On success with a bias point, `Anode Current` and `Bias Point (Vk)` are
    /// updated. Any failed inverse solve aborts the search and leaves the
    /// circuit unchanged.
    pub fn search_bias(&mut self, device: &Device) -> Result<BiasSearch, ModelError> {
        let vb = self.vb();
        let ra = self.ra();
        let rk = self.rk();
        let vg_max = device.limits().vg1_max;

        let mut samples = Vec::with_capacity(BIAS_SAMPLES);
        for j in 1..=BIAS_SAMPLES {
            let vg = vg_max * j as f64 / BIAS_SAMPLES as f64;
            let ia = vg * 1000.0 / rk;
            let va = device.anode_voltage(ia, -vg, 0.0)?;
            samples.push((vg, va, ia));
        }

        let bias_curve: Vec<Segment> = samples
            .windows(2)
            .map(|w| Segment::new(w[0].1, w[0].2, w[1].1, w[1].2))
            .collect();

        let mut cutoff = device.limits().ia_max;
        let mut bias = None;
        for &(vg, va, ia) in &samples {
            let deviation = ((vb - va) * 1000.0 / ra - ia).abs();
            if deviation < cutoff {
                cutoff = deviation;
                bias = Some(BiasPoint { vg, va, ia, deviation });
            }
        }

        match bias {
            Some(point) => {
                self.set_parameter(CommonCathodeParam::AnodeCurrent, point.ia);
                self.set_parameter(CommonCathodeParam::BiasVk, point.vg);
                info!(
                    vk = point.vg,
                    va = point.va,
                    ia = point.ia,
                    deviation = point.deviation,
                    "bias point found"
                );
            }
            None => debug!(vb, ra, rk, "no bias sample within ia_max of the load line"),
        }

        Ok(BiasSearch {
            load_line: vec![self.load_line()],
            bias_curve,
            bias,
        })
    }
}
