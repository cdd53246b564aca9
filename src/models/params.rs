//! Shared, index-addressed triode parameters.
//!
//! The triode families are progressive refinements: Koren reuses the Simple
//! slots and Improved Koren reuses the Koren slots. Rather than duplicating
//! state per family, every model owns one fixed-size [`ParameterSet`] keyed by
//! [`ParamIndex`] and each family declares which indices it reads.

use crate::domain::ParameterRow;

/// Number of parameter slots shared by all triode families.
pub const PARAM_COUNT: usize = 7;

/// Stable address of a triode parameter.
///
/// The fitter uses these as the mapping between the packed optimization vector
/// and the model's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamIndex {
    Kg,
    Kp,
    Kvb,
    Kvb2,
    Vct,
    Alpha,
    Mu,
}

impl ParamIndex {
    pub const ALL: [ParamIndex; PARAM_COUNT] = [
        ParamIndex::Kg,
        ParamIndex::Kp,
        ParamIndex::Kvb,
        ParamIndex::Kvb2,
        ParamIndex::Vct,
        ParamIndex::Alpha,
        ParamIndex::Mu,
    ];

    pub fn slot(self) -> usize {
        self as usize
    }

    /// UI label.
    pub fn label(self) -> &'static str {
        match self {
            ParamIndex::Kg => "Kg",
            ParamIndex::Kp => "Kp",
            ParamIndex::Kvb => "Kvb",
            ParamIndex::Kvb2 => "Kvb2",
            ParamIndex::Vct => "Vct",
            ParamIndex::Alpha => "Alpha",
            ParamIndex::Mu => "Mu",
        }
    }

    /// Field name in device documents.
    pub fn key(self) -> &'static str {
        match self {
            ParamIndex::Kg => "kg",
            ParamIndex::Kp => "kp",
            ParamIndex::Kvb => "kvb",
            ParamIndex::Kvb2 => "kvb2",
            ParamIndex::Vct => "vct",
            ParamIndex::Alpha => "alpha",
            ParamIndex::Mu => "mu",
        }
    }
}

/// A named scalar value.
///
/// No validation happens here: bounds only exist for the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: &'static str,
    value: f64,
}

impl Parameter {
    pub fn new(name: &'static str, value: f64) -> Self {
        Self { name, value }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }
}

/// Fixed-size parameter storage, one slot per [`ParamIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    slots: [Parameter; PARAM_COUNT],
}

impl ParameterSet {
    /// Build a set with every slot initialised to `defaults[index]`.
    pub fn from_defaults(defaults: [f64; PARAM_COUNT]) -> Self {
        let slots = ParamIndex::ALL.map(|idx| Parameter::new(idx.label(), defaults[idx.slot()]));
        Self { slots }
    }

    pub fn get(&self, index: ParamIndex) -> &Parameter {
        &self.slots[index.slot()]
    }

    pub fn value(&self, index: ParamIndex) -> f64 {
        self.slots[index.slot()].value()
    }

    pub fn set(&mut self, index: ParamIndex, value: f64) {
        self.slots[index.slot()].set_value(value);
    }

    /// Snapshot of all slot values, indexed by `ParamIndex::slot()`.
    pub fn values(&self) -> [f64; PARAM_COUNT] {
        self.slots.each_ref().map(Parameter::value)
    }

    /// (label, value) rows for `indices`, in that order.
    pub fn rows(&self, indices: &[ParamIndex]) -> Vec<ParameterRow> {
        indices
            .iter()
            .map(|&idx| ParameterRow {
                label: self.get(idx).name().to_string(),
                value: self.value(idx),
            })
            .collect()
    }
}

/// Closed interval `[lower, upper]` for one parameter; either side may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub const FREE: Bound = Bound {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// Per-slot bounds declared by a model family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundSet {
    bounds: [Bound; PARAM_COUNT],
}

impl Default for BoundSet {
    fn default() -> Self {
        Self {
            bounds: [Bound::FREE; PARAM_COUNT],
        }
    }
}

impl BoundSet {
    pub fn set_lower_bound(&mut self, index: ParamIndex, lower: f64) {
        self.bounds[index.slot()].lower = lower;
    }

    pub fn set_upper_bound(&mut self, index: ParamIndex, upper: f64) {
        self.bounds[index.slot()].upper = upper;
    }

    pub fn set_limits(&mut self, index: ParamIndex, lower: f64, upper: f64) {
        self.bounds[index.slot()] = Bound { lower, upper };
    }

    pub fn get(&self, index: ParamIndex) -> Bound {
        self.bounds[index.slot()]
    }
}
