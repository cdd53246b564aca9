//! Synthetic anode-characteristic samples.
//!
//! Sweeps a template's grid with a model and returns what a tube tester would
//! have measured: points outside the template's current / dissipation envelope
//! are dropped and the remaining currents get relative Gaussian noise.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::data::template::SweepTemplate;
use crate::domain::Sample;
use crate::error::AppError;
use crate::models::TriodeModel;

/// Generate samples for `model` over `template`'s sweep.
///
/// `noise` is the relative standard deviation applied to `ia` (0 disables it).
/// Output order is grid-major (each grid voltage, then every anode voltage).
pub fn generate_samples(
    model: &TriodeModel,
    template: &SweepTemplate,
    noise: f64,
    seed: u64,
) -> Result<Vec<Sample>, AppError> {
    if !(noise.is_finite() && noise >= 0.0) {
        return Err(AppError::new(2, "Noise must be finite and >= 0."));
    }
    template.validate()?;

    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let va_points = template.va_points();
    let mut samples = Vec::new();

    for vg in template.vg_points() {
        for &va in &va_points {
            let ia = model.anode_current(va, -vg, 0.0);
            if ia > template.ia_max || ia * va / 1000.0 > template.pa_max {
                continue;
            }

            let measured = if noise > 0.0 {
                let z: f64 = normal.sample(&mut rng);
                (ia * (1.0 + noise * z)).max(0.0)
            } else {
                ia
            };
            samples.push(Sample::triode(va, -vg, measured));
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    fn template() -> SweepTemplate {
        SweepTemplate {
            va_start: 0.0,
            va_stop: 300.0,
            va_step: 10.0,
            vg_start: 0.0,
            vg_stop: 3.0,
            vg_step: 0.5,
            ia_max: 2.0,
            pa_max: 0.3,
            ..SweepTemplate::default()
        }
    }

    #[test]
    fn samples_respect_current_and_power_limits() {
        let model = TriodeModel::new(ModelKind::Koren);
        let t = template();
        let samples = generate_samples(&model, &t, 0.0, 1).unwrap();

        assert!(!samples.is_empty());
        assert!(samples.len() < t.va_points().len() * t.vg_points().len());
        for s in &samples {
            assert!(s.ia <= t.ia_max);
            assert!(s.ia * s.va / 1000.0 <= t.pa_max);
            assert!(s.vg1 <= 0.0);
            assert_eq!(s.ia, model.anode_current(s.va, s.vg1, 0.0));
        }
    }

    #[test]
    fn noise_is_seeded_and_relative() {
        let model = TriodeModel::new(ModelKind::Simple);
        let t = template();
        let a = generate_samples(&model, &t, 0.02, 7).unwrap();
        let b = generate_samples(&model, &t, 0.02, 7).unwrap();
        let c = generate_samples(&model, &t, 0.02, 8).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        for s in &a {
            let clean = model.anode_current(s.va, s.vg1, 0.0);
            // 10 sigma
            assert!((s.ia - clean).abs() <= 0.2 * clean + 1e-12);
        }
    }

    #[test]
    fn negative_noise_is_rejected() {
        let model = TriodeModel::new(ModelKind::Simple);
        assert!(generate_samples(&model, &template(), -0.1, 0).is_err());
    }
}
