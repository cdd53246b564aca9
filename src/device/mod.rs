//! A tube device: candidate models plus its physical envelope.
//!
//! The device owns one [`TriodeModel`] per family found in its document (most
//! refined first) and delegates forward, inverse and fitting calls to the
//! selected one.

use tracing::debug;

use crate::domain::{DeviceLimits, ModelKind, ModelSpec, Sample, Segment};
use crate::error::ModelError;
use crate::fit::{FitReport, FitSelection, fit_candidates};
use crate::io::device_file::{DeviceDocument, ModelFields, TriodeSection};
use crate::models::TriodeModel;
use crate::plot::Axes;

/// Number of segments per anode characteristic curve.
const CURVE_SEGMENTS: usize = 100;

/// One anode characteristic: `ia(va)` at a fixed grid voltage.
#[derive(Debug, Clone, PartialEq)]
pub struct Characteristic {
    /// Grid voltage magnitude; the curve is evaluated at `-vg1`.
    pub vg1: f64,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
pub struct Device {
    name: String,
    limits: DeviceLimits,
    models: Vec<TriodeModel>,
    selected: Option<usize>,
}

impl Device {
    /// A device with no candidate models.
    pub fn new(name: impl Into<String>, limits: DeviceLimits) -> Self {
        Self {
            name: name.into(),
            limits,
            models: Vec::new(),
            selected: None,
        }
    }

    /// Append a candidate. The first candidate added becomes the selection.
    pub fn with_model(mut self, model: TriodeModel) -> Self {
        self.models.push(model);
        if self.selected.is_none() {
            self.selected = Some(0);
        }
        self
    }

    /// Build a device from a parsed document.
    ///
    /// Candidates are created in [`ModelKind::PRIORITY`] order for every family
    /// block present; fields absent from a block keep the family defaults.
    pub fn from_document(doc: &DeviceDocument) -> Self {
        let defaults = DeviceLimits::default();
        let va_max = doc.va_max.unwrap_or(defaults.va_max);
        let triode = doc.triode.clone().unwrap_or_default();

        let limits = DeviceLimits {
            va_max,
            ia_max: doc.ia_max.unwrap_or(defaults.ia_max),
            vg1_max: triode.vg1_max.unwrap_or(defaults.vg1_max),
            vg2_max: va_max,
            pa_max: doc.pa_max.unwrap_or(defaults.pa_max),
        };

        let mut device = Device::new(doc.name.clone().unwrap_or_default(), limits);
        for kind in ModelKind::PRIORITY {
            let block = match kind {
                ModelKind::ImprovedKoren => triode.improved_koren.as_ref(),
                ModelKind::Koren => triode.koren.as_ref(),
                ModelKind::Simple => triode.simple.as_ref(),
            };
            if let Some(fields) = block {
                device = device.with_model(model_from_fields(kind, fields));
            }
        }

        debug!(device = %device.name, candidates = device.models.len(), "device loaded");
        device
    }

    /// Document for the selected model only.
    ///
    /// With nothing selected the `triode` section carries only `vg1Max`.
    pub fn to_document(&self) -> DeviceDocument {
        let mut triode = TriodeSection {
            vg1_max: Some(self.limits.vg1_max),
            ..TriodeSection::default()
        };

        if let Some(model) = self.selected_model() {
            let mut fields = ModelFields::default();
            for &idx in model.kind().document_fields() {
                fields.set(idx, model.parameter(idx));
            }
            match model.kind() {
                ModelKind::ImprovedKoren => triode.improved_koren = Some(fields),
                ModelKind::Koren => triode.koren = Some(fields),
                ModelKind::Simple => triode.simple = Some(fields),
            }
        }

        DeviceDocument {
            name: Some(self.name.clone()),
            va_max: Some(self.limits.va_max),
            ia_max: Some(self.limits.ia_max),
            pa_max: Some(self.limits.pa_max),
            triode: Some(triode),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    pub fn models(&self) -> &[TriodeModel] {
        &self.models
    }

    /// Display names of the candidates, in candidate order.
    pub fn model_names(&self) -> Vec<&'static str> {
        self.models.iter().map(TriodeModel::name).collect()
    }

    /// Select a candidate by position.
    ///
    /// # Panics
    /// If `index` is not a valid candidate position.
    pub fn select_model(&mut self, index: usize) {
        assert!(
            index < self.models.len(),
            "model index {index} out of range for device '{}' ({} candidates)",
            self.name,
            self.models.len()
        );
        self.selected = Some(index);
    }

    /// Select the candidate of the given family.
    pub fn select_kind(&mut self, kind: ModelKind) -> Result<(), ModelError> {
        let index = self
            .models
            .iter()
            .position(|m| m.kind() == kind)
            .ok_or_else(|| ModelError::ModelNotFound {
                device: self.name.clone(),
                model: kind.display_name().to_string(),
            })?;
        self.selected = Some(index);
        Ok(())
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_model(&self) -> Option<&TriodeModel> {
        self.selected.map(|i| &self.models[i])
    }

    pub fn selected_model_mut(&mut self) -> Option<&mut TriodeModel> {
        self.selected.map(|i| &mut self.models[i])
    }

    /// Anode current (mA) of the selected model; 0 with nothing selected.
    pub fn anode_current(&self, va: f64, vg1: f64, vg2: f64) -> f64 {
        self.selected_model()
            .map_or(0.0, |model| model.anode_current(va, vg1, vg2))
    }

    pub fn anode_voltage(&self, ia: f64, vg1: f64, vg2: f64) -> Result<f64, ModelError> {
        self.selected_model()
            .ok_or(ModelError::NoModelSelected)?
            .anode_voltage(ia, vg1, vg2)
    }

    pub fn add_sample(&mut self, va: f64, ia: f64, vg1: f64, vg2: f64) -> Result<(), ModelError> {
        self.selected_model_mut()
            .ok_or(ModelError::NoModelSelected)?
            .add_sample(va, ia, vg1, vg2);
        Ok(())
    }

    /// Fit the selected model to its queued samples.
    pub fn solve(&mut self) -> Result<FitReport, ModelError> {
        Ok(self.selected_model_mut().ok_or(ModelError::NoModelSelected)?.solve())
    }

    /// Fit candidates matching `spec` to `samples` and select the best one.
    pub fn fit(&mut self, samples: &[Sample], spec: ModelSpec) -> Result<FitSelection, ModelError> {
        let selection = fit_candidates(&self.name, &mut self.models, samples, spec)?;
        self.selected = Some(selection.best);
        Ok(selection)
    }

    /// Axes for anode characteristic plots: `0..va_max` by `0..ia_max`.
    pub fn anode_axes(&self) -> Axes {
        Axes {
            x_min: 0.0,
            x_max: self.limits.va_max,
            x_interval: axis_interval(self.limits.va_max),
            y_min: 0.0,
            y_max: self.limits.ia_max,
            y_interval: axis_interval(self.limits.ia_max),
        }
    }

    /// One curve per grid step from 0 up to (excluding) `vg1_max`.
    ///
    /// Each curve spans `0..=va_max` in 100 segments. Empty with nothing selected.
    pub fn anode_characteristics(&self) -> Vec<Characteristic> {
        let Some(model) = self.selected_model() else {
            return Vec::new();
        };

        let step = axis_interval(self.limits.vg1_max);
        let mut curves = Vec::new();

        let mut k = 0usize;
        loop {
            let vg1 = k as f64 * step;
            if vg1 >= self.limits.vg1_max {
                break;
            }

            let mut va = 0.0;
            let mut ia = model.anode_current(va, -vg1, 0.0);
            let mut segments = Vec::with_capacity(CURVE_SEGMENTS);
            for j in 1..=CURVE_SEGMENTS {
                let va_next = self.limits.va_max * j as f64 / CURVE_SEGMENTS as f64;
                let ia_next = model.anode_current(va_next, -vg1, 0.0);
                segments.push(Segment::new(va, ia, va_next, ia_next));
                va = va_next;
                ia = ia_next;
            }
            curves.push(Characteristic { vg1, segments });
            k += 1;
        }

        curves
    }
}

fn model_from_fields(kind: ModelKind, fields: &ModelFields) -> TriodeModel {
    let mut model = TriodeModel::new(kind);
    for &idx in kind.document_fields() {
        if let Some(value) = fields.get(idx) {
            model.set_parameter(idx, value);
        }
    }
    model
}

/// Tick spacing for an axis running from 0 to `max`.
pub fn axis_interval(max: f64) -> f64 {
    const STEPS: [(f64, f64); 7] = [
        (500.0, 100.0),
        (200.0, 50.0),
        (100.0, 20.0),
        (50.0, 10.0),
        (20.0, 5.0),
        (10.0, 2.0),
        (5.0, 1.0),
    ];
    STEPS
        .iter()
        .find(|(threshold, _)| max > *threshold)
        .map_or(0.5, |&(_, interval)| interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn koren_device() -> Device {
        Device::new("test", DeviceLimits::default())
            .with_model(TriodeModel::new(ModelKind::Koren))
            .with_model(TriodeModel::new(ModelKind::Simple))
    }

    #[test]
    fn axis_interval_thresholds() {
        assert_eq!(axis_interval(4.0), 0.5);
        assert_eq!(axis_interval(5.0), 0.5);
        assert_eq!(axis_interval(6.0), 1.0);
        assert_eq!(axis_interval(15.0), 2.0);
        assert_eq!(axis_interval(50.0), 5.0);
        assert_eq!(axis_interval(51.0), 10.0);
        assert_eq!(axis_interval(150.0), 20.0);
        assert_eq!(axis_interval(400.0), 50.0);
        assert_eq!(axis_interval(1000.0), 100.0);
    }

    #[test]
    fn delegates_to_selected_model() {
        let mut device = koren_device();
        let koren = TriodeModel::new(ModelKind::Koren);
        let simple = TriodeModel::new(ModelKind::Simple);

        assert_eq!(device.anode_current(200.0, -1.0, 0.0), koren.anode_current(200.0, -1.0, 0.0));
        device.select_model(1);
        assert_eq!(device.anode_current(200.0, -1.0, 0.0), simple.anode_current(200.0, -1.0, 0.0));
        assert_eq!(device.model_names(), vec!["Koren", "Simple"]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn selecting_missing_index_panics() {
        koren_device().select_model(2);
    }

    #[test]
    fn empty_device_has_no_model_selected() {
        let mut device = Device::new("empty", DeviceLimits::default());
        assert_eq!(device.anode_current(100.0, -1.0, 0.0), 0.0);
        assert_eq!(device.anode_voltage(1.0, -1.0, 0.0), Err(ModelError::NoModelSelected));
        assert_eq!(device.solve().unwrap_err(), ModelError::NoModelSelected);
        assert!(device.add_sample(100.0, 1.0, -1.0, 0.0).is_err());
        assert!(device.anode_characteristics().is_empty());
    }

    #[test]
    fn select_kind_reports_missing_family() {
        let mut device = koren_device();
        device.select_kind(ModelKind::Simple).unwrap();
        assert_eq!(device.selected_index(), Some(1));
        assert!(matches!(
            device.select_kind(ModelKind::ImprovedKoren),
            Err(ModelError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn anode_characteristics_cover_grid_steps() {
        let device = koren_device();
        let curves = device.anode_characteristics();

        // vg1_max = 4 -> step 0.5 -> 0.0, 0.5, ..., 3.5
        assert_eq!(curves.len(), 8);
        assert_eq!(curves[1].vg1, 0.5);
        for curve in &curves {
            assert_eq!(curve.segments.len(), 100);
            assert_eq!(curve.segments[0].x1, 0.0);
            assert_eq!(curve.segments[99].x2, 400.0);
            for pair in curve.segments.windows(2) {
                assert_eq!(pair[0].x2, pair[1].x1);
                assert_eq!(pair[0].y2, pair[1].y1);
            }
        }
    }

    #[test]
    fn added_samples_go_to_selected_model() {
        let mut device = koren_device();
        device.select_model(1);
        device.add_sample(100.0, 1.0, -0.5, 0.0).unwrap();
        assert!(device.models()[0].samples().is_empty());
        assert_eq!(device.models()[1].samples().len(), 1);
    }
}
