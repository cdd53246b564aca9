//! Measurement sweep templates.
//!
//! A template describes how a tube is measured (anode and grid sweeps plus the
//! safety envelope) and the parameter values it is expected to have. Keys are
//! snake_case; every key is optional.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::ModelKind;
use crate::error::AppError;
use crate::models::{ParamIndex, TriodeModel};

/// Number of sweep intervals used when a step is not positive.
const DEFAULT_SWEEP_INTERVALS: usize = 40;

/// Most points a single sweep may produce.
const MAX_SWEEP_POINTS: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepTemplate {
    pub name: String,

    #[serde(rename = "mu_exp")]
    pub mu: f64,
    #[serde(rename = "kg_exp")]
    pub kg: f64,
    #[serde(rename = "kp_exp")]
    pub kp: f64,
    #[serde(rename = "alpha_exp")]
    pub alpha: f64,
    #[serde(rename = "vct_exp")]
    pub vct: f64,
    #[serde(rename = "kvb_exp")]
    pub kvb: f64,
    #[serde(rename = "kvb2_exp")]
    pub kvb2: f64,

    pub va_start: f64,
    pub va_stop: f64,
    pub va_step: f64,
    /// Grid sweep as magnitudes; samples are taken at `-vg`.
    pub vg_start: f64,
    pub vg_stop: f64,
    pub vg_step: f64,

    /// mA
    pub ia_max: f64,
    /// W
    pub pa_max: f64,
}

impl Default for SweepTemplate {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            mu: 70.0,
            kg: 1.0,
            kp: 500.0,
            alpha: 1.5,
            vct: 0.5,
            kvb: 300.0,
            kvb2: 20.0,
            va_start: 0.0,
            va_stop: 200.0,
            va_step: 0.0,
            vg_start: 0.0,
            vg_stop: 2.0,
            vg_step: 1.0,
            ia_max: 1.0,
            pa_max: 1.0,
        }
    }
}

impl SweepTemplate {
    /// The template's expected value for a parameter slot.
    pub fn expected(&self, index: ParamIndex) -> f64 {
        match index {
            ParamIndex::Kg => self.kg,
            ParamIndex::Kp => self.kp,
            ParamIndex::Kvb => self.kvb,
            ParamIndex::Kvb2 => self.kvb2,
            ParamIndex::Vct => self.vct,
            ParamIndex::Alpha => self.alpha,
            ParamIndex::Mu => self.mu,
        }
    }

    /// A model of `kind` seeded with the expected values of the slots it reads.
    pub fn expected_model(&self, kind: ModelKind) -> TriodeModel {
        kind.fitted_parameters()
            .iter()
            .fold(TriodeModel::new(kind), |model, &idx| model.with_parameter(idx, self.expected(idx)))
    }

    pub fn va_points(&self) -> Vec<f64> {
        sweep(self.va_start, self.va_stop, self.va_step)
    }

    pub fn vg_points(&self) -> Vec<f64> {
        sweep(self.vg_start, self.vg_stop, self.vg_step)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let ranges = [
            ("va", self.va_start, self.va_stop, self.va_step),
            ("vg", self.vg_start, self.vg_stop, self.vg_step),
        ];
        for (name, start, stop, step) in ranges {
            if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
                return Err(AppError::new(2, format!("Template {name} sweep must be finite.")));
            }
            if stop < start {
                return Err(AppError::new(
                    2,
                    format!("Template {name}_stop ({stop}) is below {name}_start ({start})."),
                ));
            }
            if step > 0.0 && (stop - start) / step + 1.0 > MAX_SWEEP_POINTS {
                return Err(AppError::new(
                    2,
                    format!("Template {name}_step ({step}) gives more than {MAX_SWEEP_POINTS} points."),
                ));
            }
        }
        if !(self.ia_max > 0.0 && self.pa_max > 0.0) {
            return Err(AppError::new(2, "Template ia_max and pa_max must be > 0."));
        }
        Ok(())
    }
}

/// Inclusive sweep `start, start + step, ..., <= stop`.
///
/// A non-positive step splits the range into 40 intervals.
fn sweep(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if stop <= start {
        return vec![start];
    }
    let step = if step > 0.0 {
        step
    } else {
        (stop - start) / DEFAULT_SWEEP_INTERVALS as f64
    };
    let n = ((stop - start) / step + 1e-9).floor() as usize;
    (0..=n).map(|i| start + i as f64 * step).collect()
}

/// Read a template JSON file.
pub fn read_template_json(path: &Path) -> Result<SweepTemplate, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open template JSON '{}': {e}", path.display())))?;
    let template: SweepTemplate = serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid template JSON '{}': {e}", path.display())))?;
    template.validate()?;
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let t: SweepTemplate = serde_json::from_str(r#"{"name": "6SN7", "mu_exp": 20.0, "va_step": 25.0, "v_heater": 6.3}"#).unwrap();
        assert_eq!(t.name, "6SN7");
        assert_eq!(t.mu, 20.0);
        assert_eq!(t.kvb2, 20.0);
        assert_eq!(t.vct, 0.5);
        assert_eq!(t.va_points(), vec![0.0, 25.0, 50.0, 75.0, 100.0, 125.0, 150.0, 175.0, 200.0]);
        assert_eq!(t.vg_points(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn zero_step_uses_default_intervals() {
        let t = SweepTemplate::default();
        let va = t.va_points();
        assert_eq!(va.len(), 41);
        assert_eq!(va[0], 0.0);
        assert!((va[40] - 200.0).abs() < 1e-9);
    }

    #[test]
    fn expected_model_reads_template_values() {
        let t = SweepTemplate::default();
        let model = t.expected_model(ModelKind::ImprovedKoren);
        assert_eq!(model.parameter(ParamIndex::Mu), 70.0);
        assert_eq!(model.parameter(ParamIndex::Kvb2), 20.0);
        assert_eq!(model.parameter(ParamIndex::Vct), 0.5);

        // Koren does not read vct, so it keeps the family default.
        let koren = t.expected_model(ModelKind::Koren);
        assert_eq!(koren.parameter(ParamIndex::Vct), 0.1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let t = SweepTemplate {
            va_start: 300.0,
            va_stop: 100.0,
            ..SweepTemplate::default()
        };
        assert_eq!(t.validate().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn tiny_step_is_rejected_before_sweeping() {
        let t = SweepTemplate {
            va_step: 1e-12,
            ..SweepTemplate::default()
        };
        let err = t.validate().unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("va_step"));

        let ok = SweepTemplate {
            va_step: 0.05,
            ..SweepTemplate::default()
        };
        assert!(ok.validate().is_ok());
    }
}
