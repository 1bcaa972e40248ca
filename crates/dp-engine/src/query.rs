//! Query descriptions and their results.
//!
//! Queries are immutable values: construction validates every parameter,
//! so an engine only ever sees well-formed requests.

use serde::{Deserialize, Serialize};

use crate::budget::ChargeReceipt;
use crate::validation::{
    validate_domain, validate_epsilon, validate_probability, validate_sensitivity, ValidationError,
};

/// Default per-record sensitivity
pub const DEFAULT_SENSITIVITY: f64 = 1.0;

/// Linear aggregate kinds supported by the central path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Sum,
    Count,
    Mean,
}

/// A central-DP aggregate query answered with Laplace noise
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Query {
    kind: AggregateKind,
    attribute: usize,
    epsilon: f64,
    sensitivity: f64,
    clip_bound: Option<f64>,
}

impl Query {
    /// Build a query with the default sensitivity of 1.0
    pub fn new(kind: AggregateKind, attribute: usize, epsilon: f64) -> Result<Self, ValidationError> {
        validate_epsilon(epsilon)?;
        Ok(Query {
            kind,
            attribute,
            epsilon,
            sensitivity: DEFAULT_SENSITIVITY,
            clip_bound: None,
        })
    }

    pub fn sum(attribute: usize, epsilon: f64) -> Result<Self, ValidationError> {
        Self::new(AggregateKind::Sum, attribute, epsilon)
    }

    pub fn count(attribute: usize, epsilon: f64) -> Result<Self, ValidationError> {
        Self::new(AggregateKind::Count, attribute, epsilon)
    }

    pub fn mean(attribute: usize, epsilon: f64) -> Result<Self, ValidationError> {
        Self::new(AggregateKind::Mean, attribute, epsilon)
    }

    /// Declare the per-record sensitivity used to calibrate noise
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Result<Self, ValidationError> {
        validate_sensitivity(sensitivity)?;
        self.sensitivity = sensitivity;
        Ok(self)
    }

    /// Clamp contributions to `[-bound, +bound]` instead of the sensitivity.
    ///
    /// The noise stays calibrated to the declared sensitivity, so a bound
    /// larger than it weakens the guarantee (the engine logs a warning).
    pub fn with_clip_bound(mut self, bound: f64) -> Result<Self, ValidationError> {
        validate_sensitivity(bound)?;
        self.clip_bound = Some(bound);
        Ok(self)
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    pub fn attribute(&self) -> usize {
        self.attribute
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    /// Effective clamp bound: the explicit bound, else the sensitivity
    pub fn clip_bound(&self) -> f64 {
        self.clip_bound.unwrap_or(self.sensitivity)
    }

    /// Laplace scale on the summed contributions
    pub fn noise_scale(&self) -> f64 {
        self.sensitivity / self.epsilon
    }
}

/// Wire form of a [`Query`]; validated through [`QuerySpec::build`]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuerySpec {
    pub kind: AggregateKind,
    pub attribute: usize,
    pub epsilon: f64,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    #[serde(default)]
    pub clip_bound: Option<f64>,
}

fn default_sensitivity() -> f64 {
    DEFAULT_SENSITIVITY
}

impl QuerySpec {
    pub fn build(&self) -> Result<Query, ValidationError> {
        let query = Query::new(self.kind, self.attribute, self.epsilon)?
            .with_sensitivity(self.sensitivity)?;
        match self.clip_bound {
            Some(bound) => query.with_clip_bound(bound),
            None => Ok(query),
        }
    }
}

/// Outcome of a successful central query
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryResult {
    /// Noised aggregate
    pub value: f64,
    /// Epsilon charged to the ledger
    pub epsilon_charged: f64,
    /// Whether the value passed the plausibility check (diagnostic only)
    pub valid: bool,
    /// Laplace scale applied to the sum
    pub noise_scale: f64,
    /// 95% half-width of the noise on `value`
    pub ci95_half_width: f64,
    pub receipt: ChargeReceipt,
}

/// Randomized-response mean estimate over one attribute.
///
/// Each record reports its true value (clamped into the domain) with
/// probability `p`, else a uniform draw from `[domain_low, domain_high]`.
/// This path is not charged to the ε ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocalMeanQuery {
    attribute: usize,
    p: f64,
    domain_low: f64,
    domain_high: f64,
}

impl LocalMeanQuery {
    pub fn new(attribute: usize, p: f64, domain_low: f64, domain_high: f64) -> Result<Self, ValidationError> {
        validate_probability(p)?;
        validate_domain(domain_low, domain_high)?;
        Ok(LocalMeanQuery {
            attribute,
            p,
            domain_low,
            domain_high,
        })
    }

    /// Unit domain [0, 1]
    pub fn unit(attribute: usize, p: f64) -> Result<Self, ValidationError> {
        Self::new(attribute, p, 0.0, 1.0)
    }

    pub fn attribute(&self) -> usize {
        self.attribute
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.domain_low, self.domain_high)
    }

    pub fn midpoint(&self) -> f64 {
        (self.domain_low + self.domain_high) / 2.0
    }

    /// Invert E[report] = p·μ + (1-p)·midpoint
    pub fn debias(&self, reported_mean: f64) -> f64 {
        (reported_mean - (1.0 - self.p) * self.midpoint()) / self.p
    }
}

/// Outcome of a randomized-response mean estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocalMeanResult {
    /// Debiased estimate of the true mean
    pub estimate: f64,
    /// Mean of the randomized reports
    pub reported_mean: f64,
    pub reports: usize,
}
