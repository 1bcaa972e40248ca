use thiserror::Error;

use crate::budget::BudgetError;
use crate::clipper::{ClipError, SchemaMismatch};
use crate::dataset::DatasetError;
use crate::rng::RngError;
use crate::validation::ValidationError;

/// Every way a query can fail. All failures come back as values so callers
/// can branch on the outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Bad query parameters (caller bug, not retryable)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The privacy allowance cannot cover the request
    #[error("privacy budget exceeded: requested ε={requested:.4}, remaining ε={remaining:.4}")]
    BudgetExceeded { requested: f64, remaining: f64 },

    /// A mean was requested over zero records
    #[error("dataset is empty")]
    EmptyDataset,

    /// Strict schema policy saw an attribute outside the dataset width
    #[error("attribute {attribute} outside schema of width {width}")]
    SchemaMismatch { attribute: usize, width: usize },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("entropy source failed: {0}")]
    Entropy(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Only budget exhaustion may succeed with a cheaper query
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::BudgetExceeded { .. })
    }
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::InvalidQuery(e.to_string())
    }
}

impl From<BudgetError> for EngineError {
    fn from(e: BudgetError) -> Self {
        match e {
            BudgetError::InvalidInput(v) => EngineError::InvalidQuery(v.to_string()),
            BudgetError::Exceeded {
                requested,
                remaining,
            } => EngineError::BudgetExceeded {
                requested,
                remaining,
            },
        }
    }
}

impl From<SchemaMismatch> for EngineError {
    fn from(e: SchemaMismatch) -> Self {
        EngineError::SchemaMismatch {
            attribute: e.attribute,
            width: e.width,
        }
    }
}

impl From<ClipError> for EngineError {
    fn from(e: ClipError) -> Self {
        match e {
            ClipError::Schema(mismatch) => mismatch.into(),
            ClipError::InvalidRange(v) => EngineError::InvalidQuery(v.to_string()),
        }
    }
}

impl From<RngError> for EngineError {
    fn from(e: RngError) -> Self {
        EngineError::Entropy(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_budget_exhaustion_is_retryable() {
        let exceeded = EngineError::BudgetExceeded {
            requested: 0.8,
            remaining: 0.7,
        };
        assert!(exceeded.is_retryable());
        assert!(!EngineError::EmptyDataset.is_retryable());
        assert!(!EngineError::InvalidQuery("x".into()).is_retryable());
    }

    #[test]
    fn test_budget_error_mapping() {
        let invalid: EngineError = BudgetError::InvalidInput(ValidationError::InvalidEpsilon {
            value: -1.0,
            reason: "epsilon must be positive".into(),
        })
        .into();
        assert!(matches!(invalid, EngineError::InvalidQuery(_)));

        let exceeded: EngineError = BudgetError::Exceeded {
            requested: 0.5,
            remaining: 0.1,
        }
        .into();
        assert_eq!(
            exceeded,
            EngineError::BudgetExceeded {
                requested: 0.5,
                remaining: 0.1
            }
        );
    }

    #[test]
    fn test_clip_error_mapping() {
        let schema: EngineError = ClipError::Schema(SchemaMismatch {
            attribute: 2,
            width: 1,
        })
        .into();
        assert_eq!(
            schema,
            EngineError::SchemaMismatch {
                attribute: 2,
                width: 1
            }
        );

        let range: EngineError =
            ClipError::InvalidRange(ValidationError::InvalidDomain { low: 1.0, high: 0.0 }).into();
        assert!(matches!(range, EngineError::InvalidQuery(_)));
    }

    #[test]
    fn test_display() {
        let e = EngineError::BudgetExceeded {
            requested: 0.8,
            remaining: 0.7,
        };
        assert_eq!(
            e.to_string(),
            "privacy budget exceeded: requested ε=0.8000, remaining ε=0.7000"
        );
    }
}
