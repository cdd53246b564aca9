//! Fit report JSON.
//!
//! A portable record of one `tubefit fit` run: which model was chosen, its
//! parameters, how the solve went and the device envelope it was fitted for.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::domain::{DeviceLimits, ParameterRow};
use crate::error::AppError;
use crate::fit::FitSelection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReportFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub device: String,
    pub model: String,
    pub parameters: Vec<ParameterRow>,
    pub fit: FitQuality,
    pub candidates: Vec<CandidateSummary>,
    pub limits: DeviceLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub status: String,
    pub termination: String,
    pub linear_solver: String,
    pub samples: usize,
    pub parameters: usize,
    pub iterations: usize,
    pub successful_steps: usize,
    pub rejected_steps: usize,
    pub divergent_steps: usize,
    pub cg_fallbacks: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub sse: f64,
    pub rmse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub model: String,
    pub sse: f64,
    pub bic: f64,
    pub usable: bool,
}

impl FitReportFile {
    /// Build the report for `device` after `selection` has been applied to it.
    pub fn new(device: &Device, selection: &FitSelection, generated_at: DateTime<Utc>) -> Result<Self, AppError> {
        let best = selection
            .best_fit()
            .ok_or_else(|| AppError::new(4, "Fit selection has no chosen candidate."))?;
        let model = device
            .models()
            .get(selection.best)
            .ok_or_else(|| AppError::new(4, "Chosen model is not on the device."))?;
        let r = &best.report;

        Ok(Self {
            tool: "tubefit".to_string(),
            generated_at,
            device: device.name().to_string(),
            model: model.name().to_string(),
            parameters: model.parameter_rows(),
            fit: FitQuality {
                status: format!("{:?}", r.status),
                termination: r.termination.display_name().to_string(),
                linear_solver: r.linear_solver.display_name().to_string(),
                samples: r.samples,
                parameters: r.parameters,
                iterations: r.iterations,
                successful_steps: r.successful_steps,
                rejected_steps: r.rejected_steps,
                divergent_steps: r.divergent_steps,
                cg_fallbacks: r.cg_fallbacks,
                initial_cost: r.initial_cost,
                final_cost: r.final_cost,
                sse: r.sse(),
                rmse: r.rmse(),
            },
            candidates: selection
                .fits
                .iter()
                .map(|c| CandidateSummary {
                    model: c.report.model.display_name().to_string(),
                    sse: c.report.sse(),
                    bic: c.bic,
                    usable: c.report.is_usable(),
                })
                .collect(),
            limits: *device.limits(),
        })
    }
}

/// Write a fit report JSON file stamped with the current time.
pub fn write_fit_report_json(path: &Path, device: &Device, selection: &FitSelection) -> Result<(), AppError> {
    let report = FitReportFile::new(device, selection, Utc::now())?;
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &report)
        .map_err(|e| AppError::new(2, format!("Failed to write report JSON: {e}")))?;
    Ok(())
}
