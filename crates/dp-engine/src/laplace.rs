//! Laplace Mechanism for Differential Privacy
//!
//! For a numeric query f with sensitivity Δf (the maximum change in f when
//! one record is added or removed), the Laplace mechanism releases
//!
//! ```text
//! M(D) = f(D) + Lap(0, Δf/ε)
//! ```
//!
//! which satisfies (ε, 0)-differential privacy.
//!
//! # Sampling
//!
//! A Laplace(0, b) variate is the difference of two independent
//! Exponential(1/b) variates. Each exponential side is drawn by inversion,
//!
//! ```text
//! E = -b · ln(1 - U),   U ~ Uniform[0, 1)
//! ```
//!
//! and `1 - U` lies in `(0, 1]`, so the logarithm is always finite. Taking
//! `E₁ - E₂` gives P(Y > y) = P(Y < -y) for every y, mean 0 and variance 2b².

use crate::rng::{RandomSource, RngError};
use crate::validation::{validate_epsilon, validate_sensitivity, ValidationError};

/// Laplace mechanism for (ε, 0)-differential privacy
pub struct LaplaceMechanism;

impl LaplaceMechanism {
    /// Draw one side: Exponential with mean `scale`
    fn exponential<R: RandomSource + ?Sized>(source: &mut R, scale: f64) -> Result<f64, RngError> {
        let u = source.next_uniform()?;
        Ok(-scale * (1.0 - u).ln())
    }

    /// Sample from Laplace(0, scale)
    ///
    /// `scale` must be strictly positive; callers derive it from a validated
    /// sensitivity and epsilon.
    pub fn sample<R: RandomSource + ?Sized>(source: &mut R, scale: f64) -> Result<f64, RngError> {
        debug_assert!(scale > 0.0, "Laplace scale must be positive");
        let positive = Self::exponential(source, scale)?;
        let negative = Self::exponential(source, scale)?;
        Ok(positive - negative)
    }
}

/// Compute the scale parameter for given sensitivity and epsilon
///
/// scale = Δf / ε
pub fn compute_scale(sensitivity: f64, epsilon: f64) -> Result<f64, ValidationError> {
    validate_sensitivity(sensitivity)?;
    validate_epsilon(epsilon)?;
    Ok(sensitivity / epsilon)
}

/// Variance of Laplace noise: Var(Lap(0, b)) = 2b²
pub fn variance(sensitivity: f64, epsilon: f64) -> Result<f64, ValidationError> {
    let scale = compute_scale(sensitivity, epsilon)?;
    Ok(2.0 * scale * scale)
}

/// Standard deviation of Laplace noise: √2 · Δf/ε
pub fn std_dev(sensitivity: f64, epsilon: f64) -> Result<f64, ValidationError> {
    Ok(variance(sensitivity, epsilon)?.sqrt())
}

/// Half-width of the 95% interval of Laplace noise
///
/// P(|X| < x) = 1 - e^(-x/b), so x = -b · ln(0.05) ≈ 3b.
pub fn confidence_interval_95(sensitivity: f64, epsilon: f64) -> Result<f64, ValidationError> {
    let scale = compute_scale(sensitivity, epsilon)?;
    Ok(half_width_95(scale))
}

pub(crate) fn half_width_95(scale: f64) -> f64 {
    -scale * 0.05_f64.ln()
}
