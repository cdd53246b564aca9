//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::Sample;
use crate::error::AppError;
use crate::models::TriodeModel;

/// One sample with the model's prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResidual {
    pub sample: Sample,
    pub ia_fit: f64,
    /// `ia_obs - ia_fit` (measured minus predicted).
    pub residual: f64,
}

/// Compute fitted currents and residuals for each sample.
pub fn compute_residuals(samples: &[Sample], model: &TriodeModel) -> Result<Vec<SampleResidual>, AppError> {
    let mut out = Vec::with_capacity(samples.len());
    for s in samples {
        let ia_fit = model.anode_current(s.va, s.vg1, s.vg2);
        if !ia_fit.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        out.push(SampleResidual {
            sample: *s,
            ia_fit,
            residual: s.ia - ia_fit,
        });
    }
    Ok(out)
}

/// The `top_n` samples with the largest absolute residual, largest first.
pub fn largest_residuals(residuals: &[SampleResidual], top_n: usize) -> Vec<SampleResidual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| b.residual.abs().total_cmp(&a.residual.abs()));
    sorted.truncate(top_n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    #[test]
    fn compute_residuals_basic() {
        let model = TriodeModel::new(ModelKind::Simple);
        let exact = model.anode_current(200.0, -1.0, 0.0);
        let samples = vec![Sample::triode(200.0, -1.0, exact), Sample::triode(200.0, -1.0, exact + 0.5)];

        let residuals = compute_residuals(&samples, &model).unwrap();
        assert_eq!(residuals.len(), 2);
        assert_eq!(residuals[0].residual, 0.0);
        assert!((residuals[1].residual - 0.5).abs() < 1e-12);
    }

    #[test]
    fn largest_residuals_sorted_by_magnitude() {
        let mk = |ia: f64, residual: f64| SampleResidual {
            sample: Sample::triode(100.0, -1.0, ia),
            ia_fit: ia - residual,
            residual,
        };
        let residuals = vec![mk(1.0, 0.1), mk(2.0, -0.4), mk(3.0, 0.2)];
        let top = largest_residuals(&residuals, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].residual, -0.4);
        assert_eq!(top[1].residual, 0.2);
    }
}
