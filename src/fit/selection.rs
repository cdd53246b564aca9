//! Model selection (Simple vs Koren vs Improved Koren) using BIC with guardrails.
//!
//! Every requested candidate of a device is fitted to the same samples and we
//! compute:
//! - SSE / RMSE
//! - BIC = n * ln(SSE/n) + k * ln(n)
//!
//! Selection rules:
//! 1. Exclude underdetermined models: require `n >= k + 5`
//! 2. Ignore fits that failed outright
//! 3. Choose the model with minimum BIC
//! 4. If ΔBIC < 2 between the best and a simpler model, pick the simpler model

use rayon::prelude::*;
use tracing::info;

use crate::domain::{ModelKind, ModelSpec, Sample};
use crate::error::ModelError;
use crate::fit::fitter::{FitReport, FitStatus};
use crate::models::TriodeModel;

/// Minimum number of extra observations beyond parameter count.
const MIN_N_BUFFER: usize = 5;

/// BIC margin within which a simpler model is preferred.
const SIMPLICITY_MARGIN: f64 = 2.0;

/// One fitted candidate.
#[derive(Debug, Clone)]
pub struct CandidateFit {
    /// Position of the model in the slice handed to [`fit_candidates`].
    pub index: usize,
    pub report: FitReport,
    pub bic: f64,
}

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    /// Position of the selected model in the slice handed to [`fit_candidates`].
    pub best: usize,
    /// Fits for all attempted models (after guardrails), in slice order.
    pub fits: Vec<CandidateFit>,
    /// Models that were skipped and why.
    pub skipped: Vec<(ModelKind, String)>,
}

impl FitSelection {
    pub fn best_fit(&self) -> Option<&CandidateFit> {
        self.fits.iter().find(|f| f.index == self.best)
    }
}

/// Fit the requested candidates in parallel and select the best one.
///
/// Each model's queued samples are replaced by `samples` before solving. With a
/// single-model `spec` that model is selected as long as it was fitted.
pub fn fit_candidates(
    device: &str,
    models: &mut [TriodeModel],
    samples: &[Sample],
    spec: ModelSpec,
) -> Result<FitSelection, ModelError> {
    let n = samples.len();
    let wanted = spec.to_kind();

    if let Some(kind) = wanted {
        if !models.iter().any(|m| m.kind() == kind) {
            return Err(ModelError::ModelNotFound {
                device: device.to_string(),
                model: kind.display_name().to_string(),
            });
        }
    }

    let mut skipped = Vec::new();
    let mut targets = vec![false; models.len()];
    for (i, model) in models.iter().enumerate() {
        if wanted.is_some_and(|kind| kind != model.kind()) {
            continue;
        }
        let k = model.kind().fitted_parameters().len();
        if n < k + MIN_N_BUFFER {
            skipped.push((
                model.kind(),
                format!("Underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
            ));
            continue;
        }
        targets[i] = true;
    }

    if !targets.iter().any(|&t| t) {
        return Err(ModelError::InsufficientSamples(format!(
            "{n} samples for device '{device}'"
        )));
    }

    let fits: Vec<CandidateFit> = models
        .par_iter_mut()
        .enumerate()
        .filter(|(i, _)| targets[*i])
        .map(|(i, model)| {
            model.clear_samples();
            for s in samples {
                model.add_sample(s.va, s.ia, s.vg1, s.vg2);
            }
            let report = model.solve();
            let bic = bic(n, report.sse(), report.parameters);
            CandidateFit { index: i, report, bic }
        })
        .collect();

    for fit in &fits {
        info!(
            model = fit.report.model.display_name(),
            sse = fit.report.sse(),
            bic = fit.bic,
            usable = fit.report.is_usable(),
            "candidate fitted"
        );
    }

    let best = select_by_bic(&fits).ok_or(ModelError::NoUsableFit)?;

    Ok(FitSelection {
        best: fits[best].index,
        fits,
        skipped,
    })
}

fn bic(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let sse_per = (sse / n_f).max(1e-12);
    n_f * sse_per.ln() + (k as f64) * n_f.ln()
}

/// Position in `fits` of the selected candidate.
///
/// Converged fits are preferred; if none converged, any fit with finite cost
/// is considered.
fn select_by_bic(fits: &[CandidateFit]) -> Option<usize> {
    let usable: Vec<usize> = (0..fits.len()).filter(|&i| fits[i].report.is_usable()).collect();
    let pool: Vec<usize> = if usable.is_empty() {
        (0..fits.len())
            .filter(|&i| fits[i].report.status != FitStatus::Failed && fits[i].bic.is_finite())
            .collect()
    } else {
        usable
    };

    let best = pool
        .iter()
        .copied()
        .min_by(|&a, &b| fits[a].bic.total_cmp(&fits[b].bic))?;
    let best_bic = fits[best].bic;

    // Iterate in order of increasing complexity and pick the first fit that
    // is close enough to the best.
    let mut by_complexity = pool.clone();
    by_complexity.sort_by_key(|&i| fits[i].report.parameters);
    by_complexity
        .into_iter()
        .find(|&i| fits[i].bic <= best_bic + SIMPLICITY_MARGIN)
        .or(Some(best))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::lm::{LinearSolverKind, Termination};
    use crate::models::ParamIndex;

    fn fake_fit(index: usize, model: ModelKind, bic: f64, status: FitStatus) -> CandidateFit {
        CandidateFit {
            index,
            report: FitReport {
                model,
                status,
                termination: Termination::FunctionTolerance,
                samples: 100,
                parameters: model.fitted_parameters().len(),
                iterations: 10,
                successful_steps: 8,
                rejected_steps: 2,
                divergent_steps: 0,
                linear_solver: LinearSolverKind::Dense,
                cg_fallbacks: 0,
                initial_cost: 1.0,
                final_cost: 0.1,
            },
            bic,
        }
    }

    #[test]
    fn bic_prefers_simpler_when_close() {
        let fits = vec![
            fake_fit(0, ModelKind::ImprovedKoren, 10.0, FitStatus::Converged),
            fake_fit(1, ModelKind::Koren, 11.5, FitStatus::Converged),
            fake_fit(2, ModelKind::Simple, 40.0, FitStatus::Converged),
        ];
        assert_eq!(select_by_bic(&fits), Some(1));
    }

    #[test]
    fn unusable_fits_are_ignored_when_a_usable_one_exists() {
        let fits = vec![
            fake_fit(0, ModelKind::ImprovedKoren, -50.0, FitStatus::IterationLimit),
            fake_fit(1, ModelKind::Koren, 10.0, FitStatus::Converged),
        ];
        assert_eq!(select_by_bic(&fits), Some(1));
    }

    #[test]
    fn failed_fits_are_never_selected() {
        let fits = vec![fake_fit(0, ModelKind::Simple, 1.0, FitStatus::Failed)];
        assert_eq!(select_by_bic(&fits), None);
    }

    fn simple_samples() -> Vec<Sample> {
        let truth = TriodeModel::new(ModelKind::Simple)
            .with_parameter(ParamIndex::Kg, 1.1)
            .with_parameter(ParamIndex::Vct, 0.3)
            .with_parameter(ParamIndex::Alpha, 1.35)
            .with_parameter(ParamIndex::Mu, 80.0);
        let mut out = Vec::new();
        for &vg in &[0.0, -0.5, -1.0, -1.5, -2.0, -3.0] {
            for step in 1..=16 {
                let va = 25.0 * step as f64;
                out.push(Sample::triode(va, vg, truth.anode_current(va, vg, 0.0)));
            }
        }
        out
    }

    fn all_candidates() -> Vec<TriodeModel> {
        ModelKind::PRIORITY.iter().map(|&k| TriodeModel::new(k)).collect()
    }

    #[test]
    fn auto_selects_generating_model() {
        let mut models = all_candidates();
        let selection = fit_candidates("test", &mut models, &simple_samples(), ModelSpec::Auto).unwrap();

        assert_eq!(selection.fits.len(), 3);
        assert!(selection.skipped.is_empty());
        assert_eq!(models[selection.best].kind(), ModelKind::Simple);
        assert!(selection.best_fit().unwrap().report.is_usable());
    }

    #[test]
    fn single_model_spec_fits_only_that_model() {
        let mut models = all_candidates();
        let selection = fit_candidates("test", &mut models, &simple_samples(), ModelSpec::Koren).unwrap();

        assert_eq!(selection.fits.len(), 1);
        assert_eq!(models[selection.best].kind(), ModelKind::Koren);
        assert!(models[0].samples().is_empty(), "improved koren should not be touched");
    }

    #[test]
    fn missing_model_is_reported() {
        let mut models = vec![TriodeModel::new(ModelKind::Simple)];
        let err = fit_candidates("12AX7", &mut models, &simple_samples(), ModelSpec::Koren).unwrap_err();
        assert_eq!(
            err,
            ModelError::ModelNotFound {
                device: "12AX7".to_string(),
                model: "Koren".to_string()
            }
        );
    }

    #[test]
    fn underdetermined_models_are_skipped() {
        let mut models = all_candidates();
        // 9 samples: enough for Simple (4 + 5), not for Koren (5 + 5) or Improved Koren (7 + 5).
        let samples: Vec<Sample> = simple_samples().into_iter().take(9).collect();
        let selection = fit_candidates("test", &mut models, &samples, ModelSpec::Auto).unwrap();

        assert_eq!(selection.skipped.len(), 2);
        assert_eq!(selection.fits.len(), 1);
        assert_eq!(models[selection.best].kind(), ModelKind::Simple);
    }

    #[test]
    fn too_few_samples_for_any_model_is_an_error() {
        let mut models = all_candidates();
        let samples: Vec<Sample> = simple_samples().into_iter().take(3).collect();
        let err = fit_candidates("test", &mut models, &samples, ModelSpec::Auto).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientSamples(_)));
    }
}
