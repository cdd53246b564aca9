//! Inverse of the forward equation: anode voltage for a target anode current.
//!
//! Used to trace the cathode bias curve, where the current is fixed by the
//! cathode resistor and the anode voltage is unknown.
//!
//! The search is a damped Newton iteration on a backward finite difference:
//! - start at `va = 100 V`
//! - `slope = ia(va) - ia(va - 1)`
//! - step by `(target - ia) / slope`, limited to ±20% of `va`
//! - double `va` when the slope vanishes (the device is cut off)
//! - give up once the current or the step stops being finite
//!
//! It stops at 1% relative error or after 1000 iterations. Targets it cannot
//! divide by are rejected up front.

use tracing::warn;

use crate::error::ModelError;

/// Starting anode voltage.
const VA_START: f64 = 100.0;

/// Maximum relative move per iteration (`va/1.2 ..= va*1.2`).
const STEP_LIMIT: f64 = 1.2;

/// Relative current tolerance.
const REL_TOLERANCE: f64 = 0.01;

/// Iteration cap.
pub const MAX_INVERSE_ITERATIONS: usize = 1000;

/// Find `va` with `current(va) ≈ ia` (within 1%).
///
/// `vg1` is only used for error reporting.
///
/// # Errors
/// - [`ModelError::NonPositiveTarget`] if `ia` is not finite and positive
/// - [`ModelError::InverseDidNotConverge`] after [`MAX_INVERSE_ITERATIONS`], or
///   as soon as the current, slope or next step is not finite
pub fn solve_anode_voltage<F>(current: F, ia: f64, vg1: f64) -> Result<f64, ModelError>
where
    F: Fn(f64) -> f64,
{
    if !(ia.is_finite() && ia > 0.0) {
        return Err(ModelError::NonPositiveTarget { ia });
    }

    let mut va = VA_START;
    let mut ia_test = current(va);
    let mut slope = ia_test - current(va - 1.0);

    for iteration in 0..MAX_INVERSE_ITERATIONS {
        if !(ia_test.is_finite() && slope.is_finite()) {
            return Err(diverged(ia, vg1, iteration, va));
        }

        let ia_err = ia - ia_test;
        if (ia_err.abs() / ia) < REL_TOLERANCE {
            return Ok(va);
        }

        let next = if slope != 0.0 { va + ia_err / slope } else { 2.0 * va };
        if !next.is_finite() {
            return Err(diverged(ia, vg1, iteration + 1, next));
        }
        va = if slope != 0.0 {
            next.max(va / STEP_LIMIT).min(va * STEP_LIMIT)
        } else {
            next
        };

        ia_test = current(va);
        slope = ia_test - current(va - 1.0);
    }

    if ia_test.is_finite() && (ia - ia_test).abs() / ia < REL_TOLERANCE {
        return Ok(va);
    }

    warn!(ia, vg1, last_va = va, "anode voltage search hit its iteration cap");
    Err(ModelError::InverseDidNotConverge {
        ia,
        vg1,
        iterations: MAX_INVERSE_ITERATIONS,
        last_va: va,
    })
}

/// The forward equation left its domain (non-finite current or step).
fn diverged(ia: f64, vg1: f64, iterations: usize, last_va: f64) -> ModelError {
    warn!(ia, vg1, last_va, iterations, "anode voltage search produced a non-finite value");
    ModelError::InverseDidNotConverge {
        ia,
        vg1,
        iterations,
        last_va,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::models::{ParamIndex, TriodeModel};

    #[test]
    fn improved_koren_inverse_is_consistent() {
        let model = TriodeModel::new(ModelKind::ImprovedKoren);
        let va = model.anode_voltage(2.0, -1.0, 0.0).unwrap();
        let ia = model.anode_current(va, -1.0, 0.0);
        assert!((ia - 2.0).abs() / 2.0 < 0.01, "ia={ia} at va={va}");
    }

    #[test]
    fn inverse_works_for_every_family() {
        for kind in ModelKind::PRIORITY {
            let model = TriodeModel::new(kind);
            for &(target, vg) in &[(0.05, -0.5), (0.5, -1.0), (1.5, -0.2), (3.0, -2.0)] {
                let va = model.anode_voltage(target, vg, 0.0).unwrap();
                let ia = model.anode_current(va, vg, 0.0);
                assert!(
                    (ia - target).abs() / target < 0.01,
                    "{kind:?}: target={target} vg={vg} got ia={ia} at va={va}"
                );
            }
        }
    }

    #[test]
    fn zero_target_is_rejected() {
        let model = TriodeModel::new(ModelKind::Koren);
        let err = model.anode_voltage(0.0, -1.0, 0.0).unwrap_err();
        assert_eq!(err, ModelError::NonPositiveTarget { ia: 0.0 });
        assert!(model.anode_voltage(f64::NAN, -1.0, 0.0).is_err());
        assert!(model.anode_voltage(-1.0, -1.0, 0.0).is_err());
    }

    #[test]
    fn unreachable_target_reports_non_convergence() {
        // A device that never conducts: the slope is always zero and va doubles
        // until it overflows, so the target is never reached.
        let err = solve_anode_voltage(|_| 0.0, 1.0, -1.0).unwrap_err();
        match err {
            ModelError::InverseDidNotConverge { iterations, .. } => {
                assert_eq!(iterations, MAX_INVERSE_ITERATIONS)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn already_at_target_returns_start_voltage() {
        let va = solve_anode_voltage(|va| va / 100.0, 1.0, 0.0).unwrap();
        assert_eq!(va, 100.0);
    }

    #[test]
    fn non_finite_current_below_one_volt_is_an_error() {
        // With kvb = 0 a tiny target pushes va under 1 V, where the Improved
        // Koren square root goes negative at `va - 1`.
        let model = TriodeModel::new(ModelKind::ImprovedKoren).with_parameter(ParamIndex::Kvb, 0.0);
        match model.anode_voltage(1e-4, 0.0, 0.0) {
            Ok(va) => {
                let ia = model.anode_current(va, 0.0, 0.0);
                assert!((ia - 1e-4).abs() / 1e-4 < 0.01, "ia={ia} at va={va}");
            }
            Err(ModelError::InverseDidNotConverge { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nan_current_stops_the_search() {
        let err = solve_anode_voltage(|va| if va < 90.0 { f64::NAN } else { va / 100.0 }, 0.5, -1.0).unwrap_err();
        match err {
            ModelError::InverseDidNotConverge { iterations, .. } => assert!(iterations < MAX_INVERSE_ITERATIONS),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
