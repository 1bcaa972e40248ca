//! Noise mechanisms and the sampler that applies them.
//!
//! [`Mechanism`] is the tagged choice of distribution. Laplace is a single
//! additive perturbation on an aggregate; randomized response is applied
//! record by record on the local-masking path.

use serde::{Deserialize, Serialize};

use crate::laplace::LaplaceMechanism;
use crate::rng::{RandomSource, RngError};

/// A noise distribution together with the parameters it needs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mechanism {
    /// Additive Laplace(0, scale) noise, scale = sensitivity / ε
    Laplace { scale: f64 },
    /// Report the true value with probability `p`, else a uniform draw
    /// from `[domain_low, domain_high]`
    RandomizedResponse {
        p: f64,
        domain_low: f64,
        domain_high: f64,
    },
}

impl Mechanism {
    /// Laplace mechanism calibrated to a sensitivity and epsilon
    pub fn laplace(sensitivity: f64, epsilon: f64) -> Self {
        Mechanism::Laplace {
            scale: sensitivity / epsilon,
        }
    }
}

/// Draws calibrated perturbations from an injected [`RandomSource`]
pub struct NoiseSampler<R: RandomSource> {
    source: R,
}

impl<R: RandomSource> NoiseSampler<R> {
    pub fn new(source: R) -> Self {
        NoiseSampler { source }
    }

    /// Sample the mechanism's random component.
    ///
    /// For Laplace this is the additive noise. For randomized response it is
    /// the replacement value drawn uniformly from the reporting domain; use
    /// [`NoiseSampler::respond`] to apply the full per-record coin flip.
    pub fn sample(&mut self, mechanism: &Mechanism) -> Result<f64, RngError> {
        match *mechanism {
            Mechanism::Laplace { scale } => LaplaceMechanism::sample(&mut self.source, scale),
            Mechanism::RandomizedResponse {
                domain_low,
                domain_high,
                ..
            } => {
                let u = self.source.next_uniform()?;
                Ok(domain_low + u * (domain_high - domain_low))
            }
        }
    }

    /// Perturb a single true value under the mechanism.
    ///
    /// Laplace adds noise. Randomized response keeps `value` with
    /// probability `p` and otherwise substitutes a uniform domain draw.
    pub fn respond(&mut self, mechanism: &Mechanism, value: f64) -> Result<f64, RngError> {
        match *mechanism {
            Mechanism::Laplace { .. } => Ok(value + self.sample(mechanism)?),
            Mechanism::RandomizedResponse { p, .. } => {
                if self.source.next_uniform()? < p {
                    Ok(value)
                } else {
                    self.sample(mechanism)
                }
            }
        }
    }
}
