//! Triode model evaluation for Simple / Koren / Improved Koren.
//!
//! The fitter, the inverse solver and the device all rely on three primitives:
//! - which parameter slots a family reads (and in which order they are fitted)
//! - the family's bound intervals
//! - the forward equation `ia(va, vg1)` for a given slot snapshot
//!
//! These are implemented on [`ModelKind`] as pure functions; [`TriodeModel`]
//! wraps a kind with its parameter storage and pending samples.

use crate::domain::{ModelKind, ParameterRow, Sample};
use crate::error::ModelError;
use crate::fit::{FitReport, Fitter, LinearSolverKind};
use crate::math::{improved_koren_effective, koren_effective, power_law, simple_effective};
use crate::models::inverse::solve_anode_voltage;
use crate::models::params::{BoundSet, PARAM_COUNT, ParamIndex, ParameterSet};

use ParamIndex::{Alpha, Kg, Kp, Kvb, Kvb2, Mu, Vct};

const SIMPLE_FITTED: &[ParamIndex] = &[Kg, Vct, Alpha, Mu];
const KOREN_FITTED: &[ParamIndex] = &[Kg, Kp, Kvb, Alpha, Mu];
const IMPROVED_KOREN_FITTED: &[ParamIndex] = &[Kg, Kp, Kvb, Kvb2, Vct, Alpha, Mu];

const SIMPLE_FIELDS: &[ParamIndex] = &[Kg, Mu, Alpha, Vct];
const KOREN_FIELDS: &[ParamIndex] = &[Kg, Mu, Alpha, Vct, Kp, Kvb];
const IMPROVED_KOREN_FIELDS: &[ParamIndex] = &[Kg, Mu, Alpha, Vct, Kp, Kvb, Kvb2];

const SIMPLE_ROWS: &[ParamIndex] = &[Mu, Kg, Alpha, Vct];
const KOREN_ROWS: &[ParamIndex] = &[Mu, Kg, Alpha, Kp, Kvb];
const IMPROVED_KOREN_ROWS: &[ParamIndex] = &[Mu, Kg, Alpha, Kp, Kvb, Kvb2, Vct];

/// Minimum number of free parameters for which the iterative linear solver is used.
const ITERATIVE_SOLVER_MIN_PARAMS: usize = 5;

impl ModelKind {
    /// Slots the forward equation reads, in optimization-vector order.
    pub fn fitted_parameters(self) -> &'static [ParamIndex] {
        match self {
            ModelKind::Simple => SIMPLE_FITTED,
            ModelKind::Koren => KOREN_FITTED,
            ModelKind::ImprovedKoren => IMPROVED_KOREN_FITTED,
        }
    }

    /// Fields this family reads from / writes to its device-document block.
    pub fn document_fields(self) -> &'static [ParamIndex] {
        match self {
            ModelKind::Simple => SIMPLE_FIELDS,
            ModelKind::Koren => KOREN_FIELDS,
            ModelKind::ImprovedKoren => IMPROVED_KOREN_FIELDS,
        }
    }

    /// Order of the (label, value) rows shown to the UI.
    pub fn display_parameters(self) -> &'static [ParamIndex] {
        match self {
            ModelKind::Simple => SIMPLE_ROWS,
            ModelKind::Koren => KOREN_ROWS,
            ModelKind::ImprovedKoren => IMPROVED_KOREN_ROWS,
        }
    }

    /// Built-in starting values, indexed by `ParamIndex::slot()`.
    pub fn defaults(self) -> [f64; PARAM_COUNT] {
        let vct = match self {
            ModelKind::Simple | ModelKind::Koren => 0.1,
            ModelKind::ImprovedKoren => 0.01,
        };
        // Kg, Kp, Kvb, Kvb2, Vct, Alpha, Mu
        [0.7, 500.0, 300.0, 30.0, vct, 1.5, 100.0]
    }

    /// Bound intervals used during fitting.
    ///
    /// A refined family starts from its base family's bounds and extends or
    /// narrows them explicitly.
    pub fn configure_bounds(self) -> BoundSet {
        match self {
            ModelKind::Simple => {
                let mut bounds = BoundSet::default();
                bounds.set_lower_bound(Kg, 1e-7);
                bounds.set_limits(Alpha, 1.0, 2.0);
                bounds.set_limits(Mu, 1.0, 1000.0);
                bounds.set_limits(Vct, -2.0, 2.0);
                bounds
            }
            ModelKind::Koren => {
                let mut bounds = ModelKind::Simple.configure_bounds();
                bounds.set_lower_bound(Kp, 1e-7);
                bounds.set_limits(Kvb, 0.0, 10000.0);
                bounds
            }
            ModelKind::ImprovedKoren => {
                let mut bounds = ModelKind::Koren.configure_bounds();
                bounds.set_limits(Kvb2, 0.0, 1000.0);
                bounds.set_limits(Vct, 0.0, 2.0);
                bounds
            }
        }
    }

    pub fn linear_solver(self) -> LinearSolverKind {
        if self.fitted_parameters().len() >= ITERATIVE_SOLVER_MIN_PARAMS {
            LinearSolverKind::CgJacobi
        } else {
            LinearSolverKind::Dense
        }
    }

    /// Forward equation: anode current (mA) for the slot snapshot `p`.
    ///
    /// `vg2` is accepted for interface symmetry with pentodes and ignored.
    pub fn evaluate(self, p: &[f64; PARAM_COUNT], va: f64, vg1: f64, _vg2: f64) -> f64 {
        let at = |idx: ParamIndex| p[idx.slot()];
        let e = match self {
            ModelKind::Simple => simple_effective(va, vg1, at(Vct), at(Mu)),
            ModelKind::Koren => koren_effective(va, vg1, at(Kp), at(Kvb), at(Mu)),
            ModelKind::ImprovedKoren => {
                improved_koren_effective(va, vg1, at(Kp), at(Kvb), at(Kvb2), at(Vct), at(Mu))
            }
        };
        power_law(e, at(Alpha), at(Kg))
    }
}

/// One triode equation family with its parameters and pending fit samples.
#[derive(Debug, Clone)]
pub struct TriodeModel {
    kind: ModelKind,
    params: ParameterSet,
    fitter: Fitter,
}

impl TriodeModel {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            params: ParameterSet::from_defaults(kind.defaults()),
            fitter: Fitter::default(),
        }
    }

    /// Builder-style parameter override.
    pub fn with_parameter(mut self, index: ParamIndex, value: f64) -> Self {
        self.params.set(index, value);
        self
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.display_name()
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn parameter(&self, index: ParamIndex) -> f64 {
        self.params.value(index)
    }

    pub fn set_parameter(&mut self, index: ParamIndex, value: f64) {
        self.params.set(index, value);
    }

    pub fn configure_bounds(&self) -> BoundSet {
        self.kind.configure_bounds()
    }

    /// (label, value) rows for the UI collaborator.
    pub fn parameter_rows(&self) -> Vec<ParameterRow> {
        self.params.rows(self.kind.display_parameters())
    }

    /// Modelled anode current in mA.
    pub fn anode_current(&self, va: f64, vg1: f64, vg2: f64) -> f64 {
        self.kind.evaluate(&self.params.values(), va, vg1, vg2)
    }

    /// Anode voltage that produces `ia` mA at the given grid voltage(s).
    pub fn anode_voltage(&self, ia: f64, vg1: f64, vg2: f64) -> Result<f64, ModelError> {
        solve_anode_voltage(|va| self.anode_current(va, vg1, vg2), ia, vg1)
    }

    /// Queue a measured point for the next [`TriodeModel::solve`].
    ///
    /// The residual is `predicted_ia - ia`.
    pub fn add_sample(&mut self, va: f64, ia: f64, vg1: f64, vg2: f64) {
        self.fitter.add(Sample::new(va, vg1, vg2, ia));
    }

    pub fn samples(&self) -> &[Sample] {
        self.fitter.samples()
    }

    pub fn clear_samples(&mut self) {
        self.fitter.clear();
    }

    /// Fit the parameters to the queued samples, in place.
    ///
    /// Never fails; inspect the returned report to learn whether the result
    /// converged.
    pub fn solve(&mut self) -> FitReport {
        self.fitter.solve(self.kind, &mut self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_current_is_zero_below_cutoff() {
        let model = TriodeModel::new(ModelKind::Simple);
        // va/mu + vg1 + vct = 100/100 - 1.2 + 0.1 < 0
        assert_eq!(model.anode_current(100.0, -1.2, 0.0), 0.0);
        // exactly at cutoff: 100/100 - 1.1 + 0.1 = 0
        assert_eq!(model.anode_current(100.0, -1.1, 0.0), 0.0);
    }

    #[test]
    fn simple_current_increases_with_anode_voltage() {
        let model = TriodeModel::new(ModelKind::Simple);
        for &vg1 in &[0.0, -0.5, -1.0, -2.0] {
            let mut prev = 0.0;
            let mut seen_conduction = false;
            for step in 0..=400 {
                let va = step as f64;
                let ia = model.anode_current(va, vg1, 0.0);
                let e = va / 100.0 + vg1 + 0.1;
                if e <= 0.0 {
                    assert_eq!(ia, 0.0);
                } else {
                    if seen_conduction {
                        assert!(ia > prev, "not increasing at va={va}, vg1={vg1}");
                    }
                    seen_conduction = true;
                }
                prev = ia;
            }
        }
    }

    #[test]
    fn koren_current_at_known_point() {
        let model = TriodeModel::new(ModelKind::Koren);
        let va: f64 = 250.0;
        let vg: f64 = -2.0;
        let s = (300.0 + va * va).sqrt();
        let x = 500.0 * (1.0 / 100.0 + vg / s);
        let e = (va / 500.0) * (1.0 + x.exp()).ln();
        let expected = e.powf(1.5) / 0.7;
        assert!((model.anode_current(va, vg, 0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn refined_families_extend_base_bounds() {
        let simple = ModelKind::Simple.configure_bounds();
        let koren = ModelKind::Koren.configure_bounds();
        let improved = ModelKind::ImprovedKoren.configure_bounds();

        assert_eq!(koren.get(Alpha), simple.get(Alpha));
        assert_eq!(koren.get(Kvb).upper, 10000.0);
        assert_eq!(improved.get(Kvb), koren.get(Kvb));
        assert_eq!(improved.get(Kvb2).upper, 1000.0);
        assert_eq!(simple.get(Vct).lower, -2.0);
        assert_eq!(improved.get(Vct).lower, 0.0);
    }

    #[test]
    fn linear_solver_follows_parameter_count() {
        assert_eq!(ModelKind::Simple.linear_solver(), LinearSolverKind::Dense);
        assert_eq!(ModelKind::Koren.linear_solver(), LinearSolverKind::CgJacobi);
        assert_eq!(ModelKind::ImprovedKoren.linear_solver(), LinearSolverKind::CgJacobi);
    }

    #[test]
    fn family_defaults_differ_only_in_vct() {
        let simple = TriodeModel::new(ModelKind::Simple);
        let improved = TriodeModel::new(ModelKind::ImprovedKoren);
        assert_eq!(simple.parameter(Vct), 0.1);
        assert_eq!(improved.parameter(Vct), 0.01);
        assert_eq!(improved.parameter(Kvb2), 30.0);
        assert_eq!(simple.parameter(Kg), improved.parameter(Kg));
    }

    #[test]
    fn ui_rows_follow_family_order() {
        let rows = TriodeModel::new(ModelKind::ImprovedKoren).parameter_rows();
        let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["Mu", "Kg", "Alpha", "Kp", "Kvb", "Kvb2", "Vct"]);
    }
}
