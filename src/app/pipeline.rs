//! Shared command pipelines.
//!
//! Each `run_*` function does the work of one subcommand and returns what the
//! front-end prints, so `app` only deals with presentation:
//! device load -> compute -> optional exports -> optional plot.

use std::path::Path;

use tracing::info;

use crate::circuit::{BiasSearch, TriodeCommonCathode};
use crate::device::{Device, axis_interval};
use crate::domain::{BiasConfig, FitConfig, ModelSpec, SynthConfig};
use crate::error::AppError;
use crate::fit::FitSelection;
use crate::io::ingest::IngestedSamples;
use crate::plot::{AsciiPlot, Axes, SegmentSink};
use crate::report::SampleResidual;

/// All computed outputs of a single `tubefit fit` run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub device: Device,
    pub ingest: IngestedSamples,
    pub selection: FitSelection,
    pub residuals: Vec<SampleResidual>,
    pub plot: Option<String>,
}

/// Outputs of a `tubefit bias` run.
#[derive(Debug, Clone)]
pub struct BiasRun {
    pub device: Device,
    pub circuit: TriodeCommonCathode,
    pub search: BiasSearch,
    pub plot: Option<String>,
}

/// Load a device and optionally switch its selected model.
pub fn load_device(path: &Path, model: Option<ModelSpec>) -> Result<Device, AppError> {
    let mut device = crate::io::read_device_json(path)?;
    if let Some(kind) = super::model_override(model) {
        device.select_kind(kind)?;
    }
    Ok(device)
}

/// Fit, select, compute residuals and write whatever exports were asked for.
pub fn run_fit(config: &FitConfig) -> Result<FitRun, AppError> {
    let mut device = crate::io::read_device_json(&config.device_path)?;
    let ingest = crate::io::load_samples(&config.samples_path)?;
    info!(
        device = device.name(),
        samples = ingest.rows_used(),
        skipped = ingest.row_errors.len(),
        "samples loaded"
    );

    let selection = device.fit(&ingest.samples, config.model_spec)?;
    let model = device
        .selected_model()
        .ok_or_else(|| AppError::new(4, "Fit finished without a selected model."))?;
    let residuals = crate::report::compute_residuals(&ingest.samples, model)?;

    if let Some(path) = &config.output_device {
        crate::io::write_device_json(path, &device)?;
    }
    if let Some(path) = &config.export_residuals {
        crate::io::write_residuals_csv(path, &residuals)?;
    }
    if let Some(path) = &config.export_report {
        crate::io::write_fit_report_json(path, &device, &selection)?;
    }

    let plot = config
        .plot
        .then(|| render_fit_plot(&device, &ingest, config.plot_width, config.plot_height));

    Ok(FitRun {
        device,
        ingest,
        selection,
        residuals,
        plot,
    })
}

pub fn run_current(path: &Path, model: Option<ModelSpec>, va: f64, vg1: f64, vg2: f64) -> Result<f64, AppError> {
    let device = load_device(path, model)?;
    if device.selected_model().is_none() {
        return Err(crate::error::ModelError::NoModelSelected.into());
    }
    Ok(device.anode_current(va, vg1, vg2))
}

pub fn run_voltage(path: &Path, model: Option<ModelSpec>, ia: f64, vg1: f64, vg2: f64) -> Result<f64, AppError> {
    let device = load_device(path, model)?;
    Ok(device.anode_voltage(ia, vg1, vg2)?)
}

pub fn run_bias(config: &BiasConfig) -> Result<BiasRun, AppError> {
    if !(config.vb > 0.0 && config.ra > 0.0 && config.rk > 0.0) {
        return Err(AppError::new(2, "Vb, Ra and Rk must all be > 0."));
    }
    let device = load_device(&config.device_path, config.model)?;
    let mut circuit = TriodeCommonCathode::new(config.vb, config.rk, config.ra);
    let search = circuit.search_bias(&device)?;

    let plot = config
        .plot
        .then(|| render_bias_plot(&device, &circuit, &search, config.plot_width, config.plot_height));

    Ok(BiasRun {
        device,
        circuit,
        search,
        plot,
    })
}

/// Generate synthetic samples and write them; returns the sample count.
pub fn run_synth(config: &SynthConfig) -> Result<usize, AppError> {
    let template = crate::data::read_template_json(&config.template_path)?;
    let model = template.expected_model(config.model);
    let samples = crate::data::generate_samples(&model, &template, config.noise, config.seed)?;
    crate::io::write_samples_csv(&config.out, &samples)?;
    info!(
        template = template.name.as_str(),
        model = model.name(),
        samples = samples.len(),
        "synthetic samples written"
    );
    Ok(samples.len())
}

pub fn run_plot(path: &Path, model: Option<ModelSpec>, width: usize, height: usize) -> Result<String, AppError> {
    let device = load_device(path, model)?;
    if device.selected_model().is_none() {
        return Err(crate::error::ModelError::NoModelSelected.into());
    }
    let mut plot = AsciiPlot::new(device.anode_axes(), width, height);
    draw_characteristics(&mut plot, &device);
    Ok(plot.render())
}

/// Anode characteristics, one digit per grid step (`0` is vg1 = 0).
fn draw_characteristics(plot: &mut AsciiPlot, device: &Device) {
    for (k, curve) in device.anode_characteristics().iter().enumerate() {
        let glyph = char::from_digit((k % 10) as u32, 10).unwrap_or('*');
        plot.draw_segments(&curve.segments, glyph);
    }
}

fn render_fit_plot(device: &Device, ingest: &IngestedSamples, width: usize, height: usize) -> String {
    let mut plot = AsciiPlot::new(device.anode_axes(), width, height);
    for s in &ingest.samples {
        plot.mark(s.va, s.ia, 'o');
    }
    draw_characteristics(&mut plot, device);
    plot.render()
}

fn render_bias_plot(
    device: &Device,
    circuit: &TriodeCommonCathode,
    search: &BiasSearch,
    width: usize,
    height: usize,
) -> String {
    // Widen the device axes so the whole load line fits.
    let limits = device.limits();
    let x_max = limits.va_max.max(circuit.vb());
    let y_max = limits.ia_max.max(circuit.vb() * 1000.0 / circuit.ra());
    let axes = Axes {
        x_min: 0.0,
        x_max,
        x_interval: axis_interval(x_max),
        y_min: 0.0,
        y_max,
        y_interval: axis_interval(y_max),
    };

    let mut plot = AsciiPlot::new(axes, width, height);
    if let Some(point) = &search.bias {
        plot.mark(point.va, point.ia, 'B');
    }
    plot.draw_segments(&search.load_line, '-');
    plot.draw_segments(&search.bias_curve, '.');
    plot.render()
}
