//! Post-hoc plausibility check for noised aggregates.
//!
//! The check is a self-diagnostic: it annotates results and never gates or
//! suppresses them. Laplace tails are unbounded, so occasional "invalid"
//! flags on honest results are expected.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::query::AggregateKind;

/// Default absolute slack around the plausible range
pub const DEFAULT_SLACK: f64 = 10.0;

/// Bounds a noised aggregate by the observed value range of its column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultValidator {
    slack: f64,
}

impl Default for ResultValidator {
    fn default() -> Self {
        ResultValidator {
            slack: DEFAULT_SLACK,
        }
    }
}

impl ResultValidator {
    pub fn new(slack: f64) -> Self {
        ResultValidator { slack }
    }

    pub fn slack(&self) -> f64 {
        self.slack
    }

    /// Plausible interval `[min·n - slack, max·n + slack]` for a sum
    ///
    /// An attribute outside the schema, or an empty dataset, has range
    /// (0, 0).
    pub fn sum_bounds(&self, dataset: &Dataset, attribute: usize) -> (f64, f64) {
        let n = dataset.len() as f64;
        let (min, max) = dataset.column_range(attribute).unwrap_or((0.0, 0.0));
        (min * n - self.slack, max * n + self.slack)
    }

    /// Whether a noised sum lies inside [`ResultValidator::sum_bounds`]
    pub fn check(&self, value: f64, dataset: &Dataset, attribute: usize) -> bool {
        let (low, high) = self.sum_bounds(dataset, attribute);
        value.is_finite() && low <= value && value <= high
    }

    /// Plausible interval for an aggregate of the given kind.
    ///
    /// Sums use [`ResultValidator::sum_bounds`]; counts use `n ± slack`;
    /// means use the per-record range `[min - slack, max + slack]`.
    pub fn bounds_for(&self, kind: AggregateKind, dataset: &Dataset, attribute: usize) -> (f64, f64) {
        match kind {
            AggregateKind::Sum => self.sum_bounds(dataset, attribute),
            AggregateKind::Count => {
                let n = dataset.len() as f64;
                (n - self.slack, n + self.slack)
            }
            AggregateKind::Mean => {
                let (min, max) = dataset.column_range(attribute).unwrap_or((0.0, 0.0));
                (min - self.slack, max + self.slack)
            }
        }
    }

    pub fn check_kind(&self, kind: AggregateKind, value: f64, dataset: &Dataset, attribute: usize) -> bool {
        let (low, high) = self.bounds_for(kind, dataset, attribute);
        value.is_finite() && low <= value && value <= high
    }
}
