//! Bound-constrained Levenberg–Marquardt.
//!
//! Minimizes `½ Σ r_i(x)²` subject to `lower <= x <= upper`:
//!
//! - Jacobian rows are central finite differences (one-sided at a bound),
//!   evaluated per residual in parallel.
//! - Steps solve `(JᵀJ + λ diag(JᵀJ)) δ = -Jᵀr` and are projected onto the box.
//! - Acceptance uses the gain ratio with Nielsen's damping update.
//! - A non-finite residual anywhere at the trial point rejects the step (the
//!   damping grows and the solve carries on) instead of aborting.
//!
//! Every trial step counts as one iteration, accepted or not.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::debug;

use crate::math::{solve_cg_jacobi, solve_dense};
use crate::models::params::Bound;

/// A residual vector that can be evaluated one entry at a time.
pub trait LeastSquaresProblem: Sync {
    /// Number of residuals.
    fn residual_count(&self) -> usize;

    /// Residual `i` at parameter vector `x`. May be non-finite.
    fn residual(&self, x: &[f64], i: usize) -> f64;
}

/// How the damped normal equations are solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolverKind {
    /// Dense Cholesky with SVD fallback.
    Dense,
    /// Jacobi-preconditioned conjugate gradients, dense fallback on stall.
    CgJacobi,
}

impl LinearSolverKind {
    pub fn display_name(self) -> &'static str {
        match self {
            LinearSolverKind::Dense => "DENSE_NORMAL_CHOLESKY",
            LinearSolverKind::CgJacobi => "CGNR (JACOBI)",
        }
    }
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Stop when an accepted step lowers the cost by less than this fraction.
    pub function_tolerance: f64,
    /// Stop when `‖step‖ <= tol (‖x‖ + tol)`.
    pub parameter_tolerance: f64,
    /// Stop when the projected gradient max-norm falls below this.
    pub gradient_tolerance: f64,
    /// Initial Marquardt damping (relative to `diag(JᵀJ)`).
    pub initial_damping: f64,
    pub linear_solver: LinearSolverKind,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            function_tolerance: 1e-10,
            parameter_tolerance: 1e-10,
            gradient_tolerance: 1e-12,
            initial_damping: 1e-4,
            linear_solver: LinearSolverKind::Dense,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    FunctionTolerance,
    ParameterTolerance,
    GradientTolerance,
    IterationLimit,
    /// Damping grew without bound; no acceptable step exists from here.
    NoProgress,
    /// The starting point already produced non-finite residuals.
    NonFiniteStart,
    /// Nothing to fit.
    NoResiduals,
}

impl Termination {
    pub fn is_convergence(self) -> bool {
        matches!(
            self,
            Termination::FunctionTolerance | Termination::ParameterTolerance | Termination::GradientTolerance
        )
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Termination::FunctionTolerance => "CONVERGENCE (function tolerance)",
            Termination::ParameterTolerance => "CONVERGENCE (parameter tolerance)",
            Termination::GradientTolerance => "CONVERGENCE (gradient tolerance)",
            Termination::IterationLimit => "NO_CONVERGENCE (iteration limit)",
            Termination::NoProgress => "NO_CONVERGENCE (no acceptable step)",
            Termination::NonFiniteStart => "FAILURE (non-finite initial residuals)",
            Termination::NoResiduals => "FAILURE (no residuals)",
        }
    }
}

/// Solver result. `x` holds the last accepted point.
#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub x: Vec<f64>,
    pub termination: Termination,
    pub iterations: usize,
    pub successful_steps: usize,
    pub rejected_steps: usize,
    /// Steps rejected because a residual was non-finite.
    pub divergent_steps: usize,
    /// CG solves that fell back to the dense solver.
    pub cg_fallbacks: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
}

const MAX_DAMPING: f64 = 1e32;
const MIN_DIAGONAL: f64 = 1e-30;
const CG_REL_TOLERANCE: f64 = 1e-10;
const CG_ITERATIONS_PER_PARAM: usize = 10;
const MIN_GAIN_RATIO: f64 = 1e-3;

/// Minimize `problem` starting from `x0` within `bounds` (one per entry of `x0`).
pub fn minimize<P: LeastSquaresProblem>(
    problem: &P,
    x0: &[f64],
    bounds: &[Bound],
    options: &LmOptions,
) -> LmOutcome {
    debug_assert_eq!(x0.len(), bounds.len());

    let mut x: Vec<f64> = x0.iter().zip(bounds).map(|(&v, b)| b.clamp(v)).collect();
    let mut outcome = LmOutcome {
        x: x.clone(),
        termination: Termination::NoResiduals,
        iterations: 0,
        successful_steps: 0,
        rejected_steps: 0,
        divergent_steps: 0,
        cg_fallbacks: 0,
        initial_cost: 0.0,
        final_cost: 0.0,
    };

    if problem.residual_count() == 0 {
        return outcome;
    }

    let Some(mut r) = residuals(problem, &x) else {
        outcome.termination = Termination::NonFiniteStart;
        outcome.initial_cost = f64::NAN;
        outcome.final_cost = f64::NAN;
        return outcome;
    };

    let mut cost = 0.5 * r.norm_squared();
    outcome.initial_cost = cost;

    let mut jac = jacobian(problem, &x, bounds);
    let mut grad = jac.transpose() * &r;
    let mut jtj = jac.transpose() * &jac;

    let mut damping = options.initial_damping;
    let mut nu = 2.0;

    let termination = loop {
        if cost == 0.0 {
            break Termination::FunctionTolerance;
        }
        if projected_gradient_norm(&x, &grad, bounds) <= options.gradient_tolerance {
            break Termination::GradientTolerance;
        }
        if outcome.iterations >= options.max_iterations {
            break Termination::IterationLimit;
        }
        if damping > MAX_DAMPING {
            break Termination::NoProgress;
        }

        outcome.iterations += 1;

        let mut system = jtj.clone();
        for j in 0..x.len() {
            system[(j, j)] += damping * jtj[(j, j)].max(MIN_DIAGONAL);
        }
        let rhs = -&grad;

        let Some(delta) = solve_step(&system, &rhs, options.linear_solver, &mut outcome.cg_fallbacks) else {
            outcome.rejected_steps += 1;
            damping *= nu;
            nu *= 2.0;
            continue;
        };

        let x_new: Vec<f64> = x
            .iter()
            .zip(delta.iter())
            .zip(bounds)
            .map(|((&xi, &di), b)| b.clamp(xi + di))
            .collect();
        let step = DVector::from_iterator(x.len(), x_new.iter().zip(&x).map(|(a, b)| a - b));

        let x_norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        if step.norm() <= options.parameter_tolerance * (x_norm + options.parameter_tolerance) {
            break Termination::ParameterTolerance;
        }

        let Some(r_new) = residuals(problem, &x_new) else {
            debug!(iteration = outcome.iterations, damping, "non-finite residual, step rejected");
            outcome.rejected_steps += 1;
            outcome.divergent_steps += 1;
            damping *= nu;
            nu *= 2.0;
            continue;
        };

        let cost_new = 0.5 * r_new.norm_squared();
        let actual = cost - cost_new;
        let predicted = -(grad.dot(&step) + 0.5 * step.dot(&(&jtj * &step)));
        let gain = if predicted > 0.0 {
            actual / predicted
        } else if actual > 0.0 {
            1.0
        } else {
            -1.0
        };

        debug!(
            iteration = outcome.iterations,
            cost,
            cost_new,
            gain,
            damping,
            "levenberg-marquardt step"
        );

        if gain > MIN_GAIN_RATIO && actual > 0.0 {
            let previous_cost = cost;
            x = x_new;
            r = r_new;
            cost = cost_new;
            outcome.successful_steps += 1;

            damping *= (1.0_f64 / 3.0).max(1.0 - (2.0 * gain - 1.0).powi(3));
            nu = 2.0;

            if actual <= options.function_tolerance * previous_cost {
                break Termination::FunctionTolerance;
            }

            jac = jacobian(problem, &x, bounds);
            grad = jac.transpose() * &r;
            jtj = jac.transpose() * &jac;
        } else {
            outcome.rejected_steps += 1;
            damping *= nu;
            nu *= 2.0;
        }
    };

    outcome.x = x;
    outcome.termination = termination;
    outcome.final_cost = cost;
    outcome
}

fn solve_step(
    system: &DMatrix<f64>,
    rhs: &DVector<f64>,
    kind: LinearSolverKind,
    cg_fallbacks: &mut usize,
) -> Option<DVector<f64>> {
    match kind {
        LinearSolverKind::Dense => solve_dense(system, rhs),
        LinearSolverKind::CgJacobi => {
            let max_iter = CG_ITERATIONS_PER_PARAM * rhs.len().max(1);
            let cg = solve_cg_jacobi(system, rhs, CG_REL_TOLERANCE, max_iter);
            if cg.converged && cg.x.iter().all(|v| v.is_finite()) {
                Some(cg.x)
            } else {
                *cg_fallbacks += 1;
                debug!(iterations = cg.iterations, "conjugate gradients stalled, using dense solve");
                solve_dense(system, rhs)
            }
        }
    }
}

/// All residuals at `x`, or `None` if any is non-finite.
fn residuals<P: LeastSquaresProblem>(problem: &P, x: &[f64]) -> Option<DVector<f64>> {
    let values: Vec<f64> = (0..problem.residual_count())
        .into_par_iter()
        .map(|i| problem.residual(x, i))
        .collect();
    if values.iter().all(|v| v.is_finite()) {
        Some(DVector::from_vec(values))
    } else {
        None
    }
}

fn jacobian<P: LeastSquaresProblem>(problem: &P, x: &[f64], bounds: &[Bound]) -> DMatrix<f64> {
    let n = x.len();
    let m = problem.residual_count();

    let steps: Vec<f64> = x.iter().map(|v| 6e-6 * v.abs().max(1e-2)).collect();

    let rows: Vec<Vec<f64>> = (0..m)
        .into_par_iter()
        .map(|i| {
            let mut probe = x.to_vec();
            (0..n)
                .map(|j| {
                    let d = derivative(problem, &mut probe, i, j, steps[j], bounds[j]);
                    if d.is_finite() { d } else { 0.0 }
                })
                .collect()
        })
        .collect();

    DMatrix::from_fn(m, n, |i, j| rows[i][j])
}

/// Finite-difference derivative of residual `i` w.r.t. parameter `j`.
///
/// Central where both sides fit inside the bound, one-sided otherwise.
/// `probe` is restored to its input state on return.
fn derivative<P: LeastSquaresProblem>(problem: &P, probe: &mut [f64], i: usize, j: usize, h: f64, bound: Bound) -> f64 {
    let xj = probe[j];
    let up = xj + h <= bound.upper;
    let down = xj - h >= bound.lower;

    let d = match (up, down) {
        (true, true) => {
            probe[j] = xj + h;
            let fp = problem.residual(probe, i);
            probe[j] = xj - h;
            let fm = problem.residual(probe, i);
            let central = (fp - fm) / (2.0 * h);
            if central.is_finite() {
                central
            } else {
                // One side hit a singularity; try the other.
                probe[j] = xj;
                let f0 = problem.residual(probe, i);
                let forward = (fp - f0) / h;
                if forward.is_finite() { forward } else { (f0 - fm) / h }
            }
        }
        (true, false) => {
            probe[j] = xj;
            let f0 = problem.residual(probe, i);
            probe[j] = xj + h;
            (problem.residual(probe, i) - f0) / h
        }
        (false, true) => {
            probe[j] = xj;
            let f0 = problem.residual(probe, i);
            probe[j] = xj - h;
            (f0 - problem.residual(probe, i)) / h
        }
        (false, false) => 0.0,
    };

    probe[j] = xj;
    d
}

/// Max-norm of `x - P(x - g)`: zero exactly at a bound-constrained stationary point.
fn projected_gradient_norm(x: &[f64], grad: &DVector<f64>, bounds: &[Bound]) -> f64 {
    x.iter()
        .zip(grad.iter())
        .zip(bounds)
        .map(|((&xi, &gi), b)| (xi - b.clamp(xi - gi)).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exponential decay `y = a exp(-b t)` sampled without noise.
    struct Decay {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl Decay {
        fn new(a: f64, b: f64) -> Self {
            let t: Vec<f64> = (0..30).map(|i| i as f64 * 0.2).collect();
            let y = t.iter().map(|&t| a * (-b * t).exp()).collect();
            Self { t, y }
        }
    }

    impl LeastSquaresProblem for Decay {
        fn residual_count(&self) -> usize {
            self.t.len()
        }

        fn residual(&self, x: &[f64], i: usize) -> f64 {
            x[0] * (-x[1] * self.t[i]).exp() - self.y[i]
        }
    }

    #[test]
    fn recovers_exponential_decay() {
        let problem = Decay::new(3.0, 0.7);
        for solver in [LinearSolverKind::Dense, LinearSolverKind::CgJacobi] {
            let options = LmOptions {
                linear_solver: solver,
                ..LmOptions::default()
            };
            let out = minimize(&problem, &[1.0, 0.1], &[Bound::FREE, Bound::FREE], &options);
            assert!(out.termination.is_convergence(), "{:?}", out.termination);
            assert!((out.x[0] - 3.0).abs() < 1e-6);
            assert!((out.x[1] - 0.7).abs() < 1e-6);
            assert!(out.final_cost < out.initial_cost);
        }
    }

    #[test]
    fn respects_bounds() {
        let problem = Decay::new(3.0, 0.7);
        let bounds = [Bound::FREE, Bound { lower: 0.0, upper: 0.5 }];
        let out = minimize(&problem, &[1.0, 0.1], &bounds, &LmOptions::default());
        assert!(out.x[1] <= 0.5 && out.x[1] >= 0.0);
        assert!((out.x[1] - 0.5).abs() < 1e-9, "b should sit on its upper bound");
    }

    #[test]
    fn projects_start_into_bounds() {
        let problem = Decay::new(3.0, 0.7);
        let bounds = [Bound { lower: 0.0, upper: 2.0 }, Bound::FREE];
        let out = minimize(&problem, &[10.0, 0.7], &bounds, &LmOptions::default());
        assert!(out.x[0] <= 2.0);
    }

    struct Singular;

    impl LeastSquaresProblem for Singular {
        fn residual_count(&self) -> usize {
            1
        }

        fn residual(&self, x: &[f64], _i: usize) -> f64 {
            // Undefined for x < 0, minimum at x = 0.25.
            x[0].sqrt() - 0.5
        }
    }

    #[test]
    fn non_finite_steps_are_rejected_not_fatal() {
        let out = minimize(&Singular, &[4.0], &[Bound::FREE], &LmOptions::default());
        assert!(out.termination.is_convergence(), "{:?}", out.termination);
        assert!((out.x[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn non_finite_start_fails_without_moving() {
        let out = minimize(&Singular, &[-1.0], &[Bound::FREE], &LmOptions::default());
        assert_eq!(out.termination, Termination::NonFiniteStart);
        assert_eq!(out.x, vec![-1.0]);
    }

    #[test]
    fn iteration_cap_is_honoured() {
        let problem = Decay::new(3.0, 0.7);
        let options = LmOptions {
            max_iterations: 2,
            ..LmOptions::default()
        };
        let out = minimize(&problem, &[1.0, 0.1], &[Bound::FREE, Bound::FREE], &options);
        assert!(out.iterations <= 2);
        assert_eq!(out.termination, Termination::IterationLimit);
    }
}
