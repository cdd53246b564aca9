//! Fitting a single triode model to measured samples.
//!
//! Given:
//! - samples `(va_i, vg1_i, vg2_i, ia_i)`
//! - a model family and its current parameter values
//!
//! we minimise `½ Σ (ia_model(va_i, vg1_i) - ia_i)²` over the parameters the
//! family reads, within the family's bounds, and write the result back into the
//! model's [`ParameterSet`].

use tracing::{debug, info, warn};

use crate::domain::{ModelKind, Sample};
use crate::fit::lm::{self, LeastSquaresProblem, LinearSolverKind, LmOptions, Termination};
use crate::models::params::{Bound, PARAM_COUNT, ParamIndex, ParameterSet};

/// Whether a solve produced parameters worth using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    Converged,
    /// Ran out of iterations; parameters hold the last accepted step.
    IterationLimit,
    /// No step could reduce the cost any further.
    NoProgress,
    /// Nothing was fitted (no samples, or non-finite residuals at the start).
    Failed,
}

impl FitStatus {
    fn from_termination(termination: Termination) -> Self {
        match termination {
            Termination::FunctionTolerance | Termination::ParameterTolerance | Termination::GradientTolerance => {
                FitStatus::Converged
            }
            Termination::IterationLimit => FitStatus::IterationLimit,
            Termination::NoProgress => FitStatus::NoProgress,
            Termination::NonFiniteStart | Termination::NoResiduals => FitStatus::Failed,
        }
    }
}

/// Outcome of one [`Fitter::solve`].
#[derive(Debug, Clone)]
pub struct FitReport {
    pub model: ModelKind,
    pub status: FitStatus,
    pub termination: Termination,
    pub samples: usize,
    /// Number of free parameters.
    pub parameters: usize,
    pub iterations: usize,
    pub successful_steps: usize,
    pub rejected_steps: usize,
    /// Rejected steps whose residuals were non-finite.
    pub divergent_steps: usize,
    pub linear_solver: LinearSolverKind,
    pub cg_fallbacks: usize,
    /// `½ Σ r²` at the start and end of the solve.
    pub initial_cost: f64,
    pub final_cost: f64,
}

impl FitReport {
    pub fn is_usable(&self) -> bool {
        self.status == FitStatus::Converged
    }

    pub fn sse(&self) -> f64 {
        2.0 * self.final_cost
    }

    pub fn rmse(&self) -> f64 {
        if self.samples == 0 {
            return f64::NAN;
        }
        (self.sse() / self.samples as f64).sqrt()
    }

    /// One-line summary.
    pub fn brief_report(&self) -> String {
        format!(
            "{} fit: Iterations: {}, Initial cost: {:.6e}, Final cost: {:.6e}, Rejected: {}, Solver: {}, Termination: {}",
            self.model.display_name(),
            self.iterations,
            self.initial_cost,
            self.final_cost,
            self.rejected_steps,
            self.linear_solver.display_name(),
            self.termination.display_name(),
        )
    }
}

/// Accumulates samples and fits a model family to them.
#[derive(Debug, Clone, Default)]
pub struct Fitter {
    samples: Vec<Sample>,
    options: LmOptions,
}

impl Fitter {
    pub fn with_options(options: LmOptions) -> Self {
        Self {
            samples: Vec::new(),
            options,
        }
    }

    pub fn add(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Fit `kind` to the queued samples, updating `params` in place.
    ///
    /// Never fails: a failed or non-converged solve is reported through
    /// [`FitReport::status`]. On [`FitStatus::Failed`] `params` is untouched.
    pub fn solve(&self, kind: ModelKind, params: &mut ParameterSet) -> FitReport {
        let indices = kind.fitted_parameters();
        let bounds_set = kind.configure_bounds();
        let bounds: Vec<Bound> = indices.iter().map(|&idx| bounds_set.get(idx)).collect();
        let x0: Vec<f64> = indices.iter().map(|&idx| params.value(idx)).collect();

        let options = LmOptions {
            linear_solver: kind.linear_solver(),
            ..self.options.clone()
        };

        let problem = TriodeProblem {
            kind,
            base: params.values(),
            indices,
            samples: &self.samples,
        };

        debug!(
            model = kind.display_name(),
            samples = self.samples.len(),
            parameters = indices.len(),
            solver = options.linear_solver.display_name(),
            "starting fit"
        );

        let outcome = lm::minimize(&problem, &x0, &bounds, &options);
        let status = FitStatus::from_termination(outcome.termination);

        if status != FitStatus::Failed {
            for (&idx, &value) in indices.iter().zip(&outcome.x) {
                params.set(idx, value);
            }
        }

        let report = FitReport {
            model: kind,
            status,
            termination: outcome.termination,
            samples: self.samples.len(),
            parameters: indices.len(),
            iterations: outcome.iterations,
            successful_steps: outcome.successful_steps,
            rejected_steps: outcome.rejected_steps,
            divergent_steps: outcome.divergent_steps,
            linear_solver: options.linear_solver,
            cg_fallbacks: outcome.cg_fallbacks,
            initial_cost: outcome.initial_cost,
            final_cost: outcome.final_cost,
        };

        match status {
            FitStatus::Converged => info!("{}", report.brief_report()),
            _ => warn!("{}", report.brief_report()),
        }

        report
    }
}

/// Residuals `ia_model - ia_obs` for one family over a fixed sample set.
///
/// `base` holds every slot; the optimization vector only overwrites `indices`.
struct TriodeProblem<'a> {
    kind: ModelKind,
    base: [f64; PARAM_COUNT],
    indices: &'static [ParamIndex],
    samples: &'a [Sample],
}

impl TriodeProblem<'_> {
    fn unpack(&self, x: &[f64]) -> [f64; PARAM_COUNT] {
        let mut p = self.base;
        for (&idx, &value) in self.indices.iter().zip(x) {
            p[idx.slot()] = value;
        }
        p
    }
}

impl LeastSquaresProblem for TriodeProblem<'_> {
    fn residual_count(&self) -> usize {
        self.samples.len()
    }

    fn residual(&self, x: &[f64], i: usize) -> f64 {
        let s = &self.samples[i];
        self.kind.evaluate(&self.unpack(x), s.va, s.vg1, s.vg2) - s.ia
    }
}
