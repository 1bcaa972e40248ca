//! Per-record contribution bounding.
//!
//! Before aggregation every record's contribution is clamped to
//! `[-bound, +bound]` (sum and mean) or fixed at 1 (count), so no single
//! record can move the aggregate by more than the declared sensitivity.
//!
//! Attribute indices outside the schema are handled by [`SchemaPolicy`]:
//! `Strict` fails with [`SchemaMismatch`]; `Lenient` contributes zero for
//! the missing value, moved to the nearest end of the clamp range when zero
//! lies outside it. Lenient mode silently masks schema errors and logs a
//! warning each time it does so.

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Dataset;
use crate::validation::{validate_domain, validate_sensitivity, ValidationError};

/// How to treat an attribute index outside the dataset width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPolicy {
    /// Fail with [`SchemaMismatch`]
    #[default]
    Strict,
    /// Contribute zero for every record
    Lenient,
}

/// Attribute outside the dataset schema under the strict policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attribute {attribute} outside schema of width {width}")]
pub struct SchemaMismatch {
    pub attribute: usize,
    pub width: usize,
}

/// Errors from clipping a column
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClipError {
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
    /// Clamp bound or range is unusable
    #[error("invalid clip range: {0}")]
    InvalidRange(#[from] ValidationError),
}

/// Bounds per-record contributions before aggregation
#[derive(Debug, Clone, Copy, Default)]
pub struct SensitivityClipper {
    policy: SchemaPolicy,
}

impl SensitivityClipper {
    pub fn new(policy: SchemaPolicy) -> Self {
        SensitivityClipper { policy }
    }

    pub fn policy(&self) -> SchemaPolicy {
        self.policy
    }

    /// Apply the schema policy to an attribute index.
    ///
    /// Returns `Ok(true)` when the attribute exists, `Ok(false)` when lenient
    /// mode will zero-fill it.
    pub fn check_attribute(&self, dataset: &Dataset, attribute: usize) -> Result<bool, SchemaMismatch> {
        if attribute < dataset.width() {
            return Ok(true);
        }
        match self.policy {
            SchemaPolicy::Strict => Err(SchemaMismatch {
                attribute,
                width: dataset.width(),
            }),
            SchemaPolicy::Lenient => {
                warn!(
                    "attribute {} outside schema of width {}; lenient policy contributes zero for {} records",
                    attribute,
                    dataset.width(),
                    dataset.len()
                );
                Ok(false)
            }
        }
    }

    /// Clamp each record's value of `attribute` into `[low, high]`.
    ///
    /// The range must be finite with `low < high`.
    pub fn clip_range(
        &self,
        dataset: &Dataset,
        attribute: usize,
        low: f64,
        high: f64,
    ) -> Result<Vec<f64>, ClipError> {
        validate_domain(low, high)?;
        if !self.check_attribute(dataset, attribute)? {
            return Ok(vec![0.0f64.clamp(low, high); dataset.len()]);
        }
        Ok(dataset
            .records()
            .iter()
            .map(|r| r.values()[attribute].clamp(low, high))
            .collect())
    }

    /// Sum/mean contributions: each value clamped to `[-bound, +bound]`
    pub fn clip(
        &self,
        dataset: &Dataset,
        attribute: usize,
        bound: f64,
    ) -> Result<Vec<f64>, ClipError> {
        validate_sensitivity(bound)?;
        self.clip_range(dataset, attribute, -bound, bound)
    }

    /// Count contributions: exactly 1 per record
    pub fn count_contributions(
        &self,
        dataset: &Dataset,
        attribute: usize,
    ) -> Result<Vec<f64>, SchemaMismatch> {
        self.check_attribute(dataset, attribute)?;
        Ok(vec![1.0; dataset.len()])
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::dataset::Record;
    use proptest::prelude::*;

    proptest! {
        /// No clipped contribution ever exceeds the bound
        #[test]
        fn clipped_within_bound(
            values in proptest::collection::vec(-1e6..1e6f64, 0..64),
            bound in 0.01..100.0f64
        ) {
            let records = values
                .iter()
                .enumerate()
                .map(|(i, &v)| Record::new(i.to_string(), vec![v]))
                .collect();
            let ds = Dataset::with_width(1, records).unwrap();
            let clipped = SensitivityClipper::default().clip(&ds, 0, bound).unwrap();

            prop_assert_eq!(clipped.len(), values.len());
            for (c, v) in clipped.iter().zip(&values) {
                prop_assert!(c.abs() <= bound);
                if v.abs() <= bound {
                    prop_assert_eq!(c, v);
                }
            }
        }
    }
}
