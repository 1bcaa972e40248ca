//! Input Validation for Differential Privacy Parameters
//!
//! Every query parameter passes through these checks before any data is
//! touched or any budget is charged.
//!
//! # Parameter Constraints
//!
//! ## Epsilon (ε)
//! - Must be positive (> 0) and finite
//! - Smaller = more private, but more noise
//! - Values > [`MAX_EPSILON`] are accepted but provide little protection
//!
//! ## Sensitivity (Δf)
//! - Must be positive (> 0) and finite
//! - Count query: Δf = 1
//! - Sum query: Δf = clip bound
//!
//! ## Randomized response
//! - Truth probability p must lie in (0, 1]
//! - Reporting domain must be finite with low < high

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for DP parameter validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Epsilon is invalid
    #[error("invalid epsilon {value}: {reason}")]
    InvalidEpsilon { value: f64, reason: String },
    /// Sensitivity is invalid
    #[error("invalid sensitivity {value}: {reason}")]
    InvalidSensitivity { value: f64, reason: String },
    /// Randomized-response truth probability is invalid
    #[error("invalid reporting probability {value}: {reason}")]
    InvalidProbability { value: f64, reason: String },
    /// Randomized-response domain is invalid
    #[error("invalid reporting domain [{low}, {high}]")]
    InvalidDomain { low: f64, high: f64 },
    /// Budget total is invalid
    #[error("invalid budget total {0}: must be positive and finite")]
    InvalidBudget(f64),
}

/// Above this, the guarantee is too weak to be meaningful
pub const MAX_EPSILON: f64 = 10.0;

/// Minimum allowed epsilon (too small = unbounded noise)
pub const MIN_EPSILON: f64 = 1e-10;

/// Minimum allowed sensitivity
pub const MIN_SENSITIVITY: f64 = 1e-15;

/// Validate epsilon parameter
///
/// # Constraints
/// - Must be positive (> 0)
/// - Must be finite
/// - Should be ≤ MAX_EPSILON for meaningful privacy (logged, not rejected)
pub fn validate_epsilon(epsilon: f64) -> Result<(), ValidationError> {
    if !epsilon.is_finite() {
        return Err(ValidationError::InvalidEpsilon {
            value: epsilon,
            reason: "epsilon must be a finite number".to_string(),
        });
    }

    if epsilon <= 0.0 {
        return Err(ValidationError::InvalidEpsilon {
            value: epsilon,
            reason: "epsilon must be positive".to_string(),
        });
    }

    if epsilon < MIN_EPSILON {
        return Err(ValidationError::InvalidEpsilon {
            value: epsilon,
            reason: format!("epsilon below {} would add unbounded noise", MIN_EPSILON),
        });
    }

    if epsilon > MAX_EPSILON {
        warn!(
            "epsilon {} exceeds {}; the privacy guarantee is negligible",
            epsilon, MAX_EPSILON
        );
    }

    Ok(())
}

/// Validate an amount charged against a budget ledger
///
/// Any positive finite amount is chargeable. The [`MIN_EPSILON`] floor only
/// guards noise calibration and is enforced where queries are built.
pub fn validate_charge(epsilon: f64) -> Result<(), ValidationError> {
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(ValidationError::InvalidEpsilon {
            value: epsilon,
            reason: "charge must be positive and finite".to_string(),
        });
    }
    Ok(())
}

/// Validate sensitivity parameter
///
/// # Constraints
/// - Must be positive (> 0)
/// - Must be finite
pub fn validate_sensitivity(sensitivity: f64) -> Result<(), ValidationError> {
    if !sensitivity.is_finite() {
        return Err(ValidationError::InvalidSensitivity {
            value: sensitivity,
            reason: "sensitivity must be a finite number".to_string(),
        });
    }

    if sensitivity <= 0.0 {
        return Err(ValidationError::InvalidSensitivity {
            value: sensitivity,
            reason: "sensitivity must be positive".to_string(),
        });
    }

    if sensitivity < MIN_SENSITIVITY {
        return Err(ValidationError::InvalidSensitivity {
            value: sensitivity,
            reason: "sensitivity too small: likely a computation error".to_string(),
        });
    }

    Ok(())
}

/// Validate the probability of reporting the true value
///
/// p = 0 is rejected: the debiasing step divides by p.
pub fn validate_probability(p: f64) -> Result<(), ValidationError> {
    if !p.is_finite() || p <= 0.0 || p > 1.0 {
        return Err(ValidationError::InvalidProbability {
            value: p,
            reason: "must lie in (0, 1]".to_string(),
        });
    }
    Ok(())
}

/// Validate a randomized-response reporting domain
pub fn validate_domain(low: f64, high: f64) -> Result<(), ValidationError> {
    if !low.is_finite() || !high.is_finite() || low >= high {
        return Err(ValidationError::InvalidDomain { low, high });
    }
    Ok(())
}

/// Validate a total privacy budget
pub fn validate_budget_total(total: f64) -> Result<(), ValidationError> {
    if !total.is_finite() || total <= 0.0 {
        return Err(ValidationError::InvalidBudget(total));
    }
    Ok(())
}

/// Recommended privacy parameters for common use cases
#[derive(Debug, Clone, Copy)]
pub struct RecommendedParameters {
    pub epsilon: f64,
    pub description: &'static str,
}

/// Privacy levels for parameter recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    VeryHigh,
    High,
    Medium,
    Low,
}

/// Get recommended per-query epsilon for a privacy level
pub fn recommended_parameters(level: PrivacyLevel) -> RecommendedParameters {
    match level {
        PrivacyLevel::VeryHigh => RecommendedParameters {
            epsilon: 0.1,
            description: "very high privacy: sensitive individual-level data",
        },
        PrivacyLevel::High => RecommendedParameters {
            epsilon: 0.5,
            description: "high privacy: most routine analytics",
        },
        PrivacyLevel::Medium => RecommendedParameters {
            epsilon: 1.0,
            description: "medium privacy: balance of utility and privacy",
        },
        PrivacyLevel::Low => RecommendedParameters {
            epsilon: 3.0,
            description: "lower privacy: higher utility, less noise",
        },
    }
}
