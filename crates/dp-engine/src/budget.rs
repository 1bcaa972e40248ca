//! Privacy Budget Accounting
//!
//! Each noised query consumes part of a fixed privacy allowance ε_total.
//! Without tracking, an adversary could make many queries and average away
//! the noise.
//!
//! # Accounting Policy: Sequential Composition
//!
//! If k queries are answered with ε₁..ε_k-DP mechanisms, the total privacy
//! loss is bounded by Σεᵢ. The ledger admits a charge iff
//!
//! ```text
//! used + ε <= total
//! ```
//!
//! evaluated once in `f64`, with no tolerance. This is conservative (advanced
//! composition gives tighter bounds for many small queries, see
//! [`compare_compositions`]) but always sound.
//!
//! # Atomicity
//!
//! The check and the increment happen under one lock: a charge is either
//! fully admitted or fully rejected, and two concurrent callers can never
//! both succeed when only one allotment remains. The budget never resets
//! within a session; a fresh allowance means a fresh ledger.

use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::{validate_budget_total, validate_charge, ValidationError};

/// Error type for budget operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetError {
    /// The requested charge is not a valid epsilon
    #[error("invalid charge: {0}")]
    InvalidInput(ValidationError),
    /// Insufficient budget remaining
    #[error("privacy budget exhausted: need ε={requested:.4}, have ε={remaining:.4}")]
    Exceeded { requested: f64, remaining: f64 },
}

/// Proof of an admitted charge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    /// 1-based position of this charge in the ledger history
    pub sequence: usize,
    /// Epsilon charged
    pub charged: f64,
    /// Remaining epsilon after the charge
    pub remaining: f64,
}

/// Point-in-time view of a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub total_epsilon: f64,
    pub used_epsilon: f64,
    pub remaining_epsilon: f64,
    pub charge_count: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    used: f64,
    history: Vec<ChargeReceipt>,
}

/// Tracks cumulative privacy loss against a fixed total
#[derive(Debug)]
pub struct BudgetLedger {
    total: f64,
    state: Mutex<LedgerState>,
}

impl BudgetLedger {
    /// Create a ledger with a fixed positive total
    pub fn new(total_epsilon: f64) -> Result<Self, ValidationError> {
        validate_budget_total(total_epsilon)?;
        Ok(BudgetLedger {
            total: total_epsilon,
            state: Mutex::new(LedgerState::default()),
        })
    }

    // Every mutation completes before the guard drops, so a poisoned
    // lock still holds consistent state.
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admit or reject a charge of `epsilon`
    ///
    /// # Returns
    /// * `Ok(ChargeReceipt)` if `used + epsilon <= total`; `used` grows by
    ///   exactly `epsilon`
    /// * `Err(BudgetError::InvalidInput)` for non-positive or non-finite input
    /// * `Err(BudgetError::Exceeded)` otherwise; state is unchanged
    pub fn charge(&self, epsilon: f64) -> Result<ChargeReceipt, BudgetError> {
        validate_charge(epsilon).map_err(BudgetError::InvalidInput)?;

        let mut state = self.lock();
        let next = state.used + epsilon;
        if next > self.total {
            let remaining = self.total - state.used;
            warn!(
                "rejected charge of ε={} with ε={} remaining",
                epsilon, remaining
            );
            return Err(BudgetError::Exceeded {
                requested: epsilon,
                remaining,
            });
        }

        state.used = next;
        let receipt = ChargeReceipt {
            sequence: state.history.len() + 1,
            charged: epsilon,
            remaining: self.total - next,
        };
        state.history.push(receipt);
        debug!(
            "charge #{} admitted: ε={}, remaining ε={}",
            receipt.sequence, epsilon, receipt.remaining
        );
        Ok(receipt)
    }

    /// Whether a charge of `epsilon` would be admitted right now
    pub fn can_charge(&self, epsilon: f64) -> bool {
        validate_charge(epsilon).is_ok() && self.lock().used + epsilon <= self.total
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn used(&self) -> f64 {
        self.lock().used
    }

    /// `total - used`; never negative because `used <= total` always holds
    pub fn remaining(&self) -> f64 {
        (self.total - self.lock().used).max(0.0)
    }

    /// Fraction of the total consumed
    pub fn utilization(&self) -> f64 {
        self.lock().used / self.total
    }

    pub fn charge_count(&self) -> usize {
        self.lock().history.len()
    }

    /// Receipts of all admitted charges, oldest first
    pub fn history(&self) -> Vec<ChargeReceipt> {
        self.lock().history.clone()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.lock();
        LedgerSnapshot {
            total_epsilon: self.total,
            used_epsilon: state.used,
            remaining_epsilon: (self.total - state.used).max(0.0),
            charge_count: state.history.len(),
        }
    }
}

/// Total privacy loss under basic (sequential) composition: Σεᵢ
pub fn basic_composition(epsilons: &[f64]) -> f64 {
    epsilons.iter().sum()
}

/// Total privacy loss under advanced composition (Dwork et al., 2010)
///
/// For k mechanisms each ε-DP and slack δ' > 0:
/// ε' = √(2k ln(1/δ')) · ε + k · ε · (e^ε - 1)
pub fn advanced_composition_homogeneous(epsilon: f64, k: usize, delta_prime: f64) -> f64 {
    let k_f = k as f64;
    let term1 = (2.0 * k_f * (1.0 / delta_prime).ln()).sqrt() * epsilon;
    let term2 = k_f * epsilon * (epsilon.exp() - 1.0);
    term1 + term2
}

/// Basic vs advanced composition for k identical queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionComparison {
    pub query_count: usize,
    pub per_query_epsilon: f64,
    pub basic_total: f64,
    pub advanced_total: f64,
    /// basic / advanced
    pub savings_ratio: f64,
}

/// Compare composition theorems. Reporting only: the ledger always gates
/// on basic composition.
pub fn compare_compositions(epsilon: f64, k: usize, delta_prime: f64) -> CompositionComparison {
    let basic = epsilon * k as f64;
    let advanced = advanced_composition_homogeneous(epsilon, k, delta_prime);

    CompositionComparison {
        query_count: k,
        per_query_epsilon: epsilon,
        basic_total: basic,
        advanced_total: advanced,
        savings_ratio: basic / advanced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_creation() {
        let ledger = BudgetLedger::new(1.0).unwrap();
        assert_eq!(ledger.total(), 1.0);
        assert_eq!(ledger.remaining(), 1.0);
        assert_eq!(ledger.charge_count(), 0);
        assert!(BudgetLedger::new(0.0).is_err());
        assert!(BudgetLedger::new(f64::NAN).is_err());
    }

    #[test]
    fn test_charge_receipts() {
        let ledger = BudgetLedger::new(1.0).unwrap();

        let first = ledger.charge(0.1).unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.charged, 0.1);
        assert!((first.remaining - 0.9).abs() < 1e-12);

        let second = ledger.charge(0.2).unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.remaining, ledger.remaining());
        assert_eq!(ledger.history(), vec![first, second]);
    }

    #[test]
    fn test_rejection_leaves_state_unchanged() {
        let ledger = BudgetLedger::new(1.0).unwrap();
        ledger.charge(0.3).unwrap();
        assert!((ledger.remaining() - 0.7).abs() < 1e-12);

        let err = ledger.charge(0.8).unwrap_err();
        assert!(matches!(err, BudgetError::Exceeded { requested, .. } if requested == 0.8));
        assert_eq!(ledger.used(), 0.3);
        assert_eq!(ledger.charge_count(), 1);
    }

    #[test]
    fn test_non_positive_charge_rejected() {
        let ledger = BudgetLedger::new(1.0).unwrap();
        for eps in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(ledger.charge(eps), Err(BudgetError::InvalidInput(_))));
        }
        assert_eq!(ledger.used(), 0.0);
        assert!(!ledger.can_charge(0.0));
    }

    #[test]
    fn test_tiny_positive_charge_admitted() {
        let ledger = BudgetLedger::new(1.0).unwrap();
        let receipt = ledger.charge(1e-11).unwrap();
        assert_eq!(receipt.charged, 1e-11);
        assert_eq!(ledger.used(), 1e-11);
        assert!(ledger.can_charge(1e-11));
    }

    #[test]
    fn test_sequence_tracks_history() {
        let ledger = BudgetLedger::new(1.0).unwrap();
        for expected in 1..=5usize {
            assert_eq!(ledger.charge(0.125).unwrap().sequence, expected);
        }
        assert_eq!(ledger.charge_count(), 5);
        assert_eq!(ledger.snapshot().charge_count, ledger.history().len());
    }

    #[test]
    fn test_exact_total_admitted() {
        let ledger = BudgetLedger::new(1.0).unwrap();
        ledger.charge(0.5).unwrap();
        ledger.charge(0.5).unwrap();
        assert_eq!(ledger.remaining(), 0.0);
        assert!(ledger.charge(1e-9).is_err());
    }

    #[test]
    fn test_snapshot_and_utilization() {
        let ledger = BudgetLedger::new(2.0).unwrap();
        ledger.charge(0.5).unwrap();
        let snap = ledger.snapshot();
        assert_eq!(snap.used_epsilon, 0.5);
        assert_eq!(snap.remaining_epsilon, 1.5);
        assert_eq!(snap.charge_count, 1);
        assert_eq!(ledger.utilization(), 0.25);
    }

    #[test]
    fn test_basic_composition() {
        let total = basic_composition(&[0.1, 0.2, 0.3]);
        assert!((total - 0.6).abs() < 1e-10);
    }

    #[test]
    fn test_advanced_composition_tighter() {
        let comparison = compare_compositions(0.1, 100, 1e-6);

        assert!((comparison.basic_total - 10.0).abs() < 1e-10);
        // term1 ≈ 5.26, term2 ≈ 1.05
        assert!(comparison.advanced_total < 8.0);
        assert!(comparison.savings_ratio > 1.3);
    }
}
