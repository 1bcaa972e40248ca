//! Random Sources for Noise Sampling
//!
//! Every mechanism draws its randomness through the [`RandomSource`] trait,
//! which yields uniform values in `[0, 1)`. Two sources are provided:
//!
//! - [`OsEntropy`]: reads the OS entropy pool via `getrandom`
//!   (urandom/CryptGenRandom/Web Crypto). Used when no seed is configured.
//! - [`SeededSource`]: a ChaCha20 stream keyed from a `u64` or a [`Seed`].
//!   Reproducible, so tests and demos can replay exact noise sequences.
//!
//! # Uniform Construction
//!
//! Both sources build the `f64` from the top 53 bits of a random `u64`
//! (the mantissa precision of `f64`) divided by 2^53, so every value lies in
//! `[0, 1)` and `1.0` is never produced.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Error type for RNG operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RngError {
    /// The entropy source failed to produce bytes
    #[error("entropy error: {0}")]
    Entropy(String),
}

/// A source of uniform reals in `[0, 1)`.
///
/// Implementations must be `Send` so an engine can hold one behind a mutex
/// and serve queries from several threads.
pub trait RandomSource: Send {
    /// Draw one value uniformly distributed in `[0, 1)`
    fn next_uniform(&mut self) -> Result<f64, RngError>;
}

/// Map a random `u64` onto `[0, 1)` using its top 53 bits
fn unit_interval(value: u64) -> f64 {
    (value >> 11) as f64 / (1u64 << 53) as f64
}

/// Random source backed by the operating system's entropy pool
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl OsEntropy {
    /// Fill a buffer with random bytes from the OS
    pub fn fill_bytes(buffer: &mut [u8]) -> Result<(), RngError> {
        getrandom::getrandom(buffer)
            .map_err(|e| RngError::Entropy(format!("failed to read OS entropy: {}", e)))
    }

    /// Generate a random u64
    pub fn random_u64() -> Result<u64, RngError> {
        let mut bytes = [0u8; 8];
        Self::fill_bytes(&mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }
}

impl RandomSource for OsEntropy {
    fn next_uniform(&mut self) -> Result<f64, RngError> {
        Ok(unit_interval(Self::random_u64()?))
    }
}

/// A 32-byte seed for reproducible noise streams
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed(pub [u8; 32]);

impl Seed {
    /// Create a seed from a string (hashed to 32 bytes)
    pub fn from_string(s: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(s.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&hasher.finalize());
        Seed(seed)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Deterministic random source driven by ChaCha20
#[derive(Debug, Clone)]
pub struct SeededSource {
    rng: ChaCha20Rng,
}

impl SeededSource {
    /// Seed the stream from a single integer
    pub fn from_u64(seed: u64) -> Self {
        SeededSource {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Seed the stream from a 32-byte [`Seed`]
    pub fn from_seed(seed: &Seed) -> Self {
        SeededSource {
            rng: ChaCha20Rng::from_seed(*seed.as_bytes()),
        }
    }

    /// Seed the stream from a label such as `"census-2026-run-3"`
    pub fn from_label(label: &str) -> Self {
        Self::from_seed(&Seed::from_string(label))
    }
}

impl RandomSource for SeededSource {
    fn next_uniform(&mut self) -> Result<f64, RngError> {
        Ok(unit_interval(self.rng.next_u64()))
    }
}

impl<S: RandomSource + ?Sized> RandomSource for Box<S> {
    fn next_uniform(&mut self) -> Result<f64, RngError> {
        (**self).next_uniform()
    }
}
