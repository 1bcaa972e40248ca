//! The query engine: one analysis session over a fixed privacy budget.
//!
//! # Central path (Sum / Count / Mean)
//!
//! 1. Clip contributions under the configured [`SchemaPolicy`]
//! 2. Mean over zero records fails with `EmptyDataset`
//! 3. Sum the contributions
//! 4. Charge ε; on rejection nothing else happens
//! 5. Add Laplace(sensitivity/ε) noise to the sum
//! 6. Mean divides the noised sum by n
//! 7. Annotate with the plausibility check
//!
//! Noise is always added to the sum, and a mean is the noised sum divided
//! by n, so the noise magnitude is calibrated on the quantity the
//! sensitivity describes.
//!
//! # Local path (randomized-response mean)
//!
//! Every record is masked individually and the mean of the reports is
//! debiased. This path does not charge the ε ledger: randomized response
//! and the Laplace mechanism are accounted separately, and no RR-to-ε
//! conversion is applied.

use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::budget::{BudgetLedger, LedgerSnapshot};
use crate::clipper::{SchemaPolicy, SensitivityClipper};
use crate::config::EngineConfig;
use crate::dataset::Dataset;
use crate::error::EngineError;
use crate::laplace::half_width_95;
use crate::mechanism::{Mechanism, NoiseSampler};
use crate::query::{AggregateKind, LocalMeanQuery, LocalMeanResult, Query, QueryResult};
use crate::rng::{OsEntropy, RandomSource, SeededSource};
use crate::validator::ResultValidator;

type SharedSampler = NoiseSampler<Box<dyn RandomSource>>;

/// An analysis session: owns the ledger and the noise source
pub struct QueryEngine {
    ledger: BudgetLedger,
    sampler: Mutex<SharedSampler>,
    clipper: SensitivityClipper,
    validator: ResultValidator,
}

impl QueryEngine {
    /// Strict schema policy, default validator, OS entropy
    pub fn new(total_epsilon: f64) -> Result<Self, EngineError> {
        Self::from_config(&EngineConfig::new(total_epsilon))
    }

    /// Build from configuration; a configured seed selects a ChaCha20 stream
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let source: Box<dyn RandomSource> = match &config.seed {
            Some(label) => Box::new(SeededSource::from_label(label)),
            None => Box::new(OsEntropy),
        };
        Self::build(config, source)
    }

    /// Build with an injected random source (ignores `config.seed`)
    pub fn with_source<R: RandomSource + 'static>(config: &EngineConfig, source: R) -> Result<Self, EngineError> {
        Self::build(config, Box::new(source))
    }

    fn build(config: &EngineConfig, source: Box<dyn RandomSource>) -> Result<Self, EngineError> {
        config.validate()?;
        let ledger = BudgetLedger::new(config.total_epsilon)
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(QueryEngine {
            ledger,
            sampler: Mutex::new(NoiseSampler::new(source)),
            clipper: SensitivityClipper::new(config.schema_policy),
            validator: ResultValidator::new(config.validator_slack),
        })
    }

    pub fn ledger(&self) -> &BudgetLedger {
        &self.ledger
    }

    pub fn remaining(&self) -> f64 {
        self.ledger.remaining()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn schema_policy(&self) -> SchemaPolicy {
        self.clipper.policy()
    }

    pub fn validator(&self) -> &ResultValidator {
        &self.validator
    }

    fn sampler(&self) -> MutexGuard<'_, SharedSampler> {
        self.sampler.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer a central-DP aggregate query
    pub fn run(&self, query: &Query, dataset: &Dataset) -> Result<QueryResult, EngineError> {
        let attribute = query.attribute();
        let contributions = match query.kind() {
            AggregateKind::Count => self.clipper.count_contributions(dataset, attribute)?,
            AggregateKind::Sum | AggregateKind::Mean => {
                if query.clip_bound() > query.sensitivity() {
                    warn!(
                        "clip bound {} exceeds declared sensitivity {}; noise covers only the declared sensitivity",
                        query.clip_bound(),
                        query.sensitivity()
                    );
                }
                self.clipper.clip(dataset, attribute, query.clip_bound())?
            }
        };
        if query.kind() == AggregateKind::Mean && contributions.is_empty() {
            return Err(EngineError::EmptyDataset);
        }
        let raw_sum: f64 = contributions.iter().sum();

        let receipt = self.ledger.charge(query.epsilon())?;

        let scale = query.noise_scale();
        let noise = self.sampler().sample(&Mechanism::Laplace { scale })?;
        let noised_sum = raw_sum + noise;

        let (value, ci95_half_width) = match query.kind() {
            AggregateKind::Mean => {
                let n = dataset.len() as f64;
                (noised_sum / n, half_width_95(scale) / n)
            }
            AggregateKind::Sum | AggregateKind::Count => (noised_sum, half_width_95(scale)),
        };

        let valid = self.validator.check_kind(query.kind(), value, dataset, attribute);
        if !valid {
            debug!(
                "{:?} result {} outside plausible range {:?}",
                query.kind(),
                value,
                self.validator.bounds_for(query.kind(), dataset, attribute)
            );
        }

        info!(
            "{:?} on attribute {} answered: ε={}, scale={}, remaining ε={}",
            query.kind(),
            attribute,
            query.epsilon(),
            scale,
            receipt.remaining
        );

        Ok(QueryResult {
            value,
            epsilon_charged: receipt.charged,
            valid,
            noise_scale: scale,
            ci95_half_width,
            receipt,
        })
    }

    /// Estimate a mean by per-record randomized response.
    ///
    /// True values are clamped into the reporting domain before masking.
    /// Under the lenient policy a missing attribute reports the domain value
    /// nearest zero. The ε ledger is not charged.
    pub fn local_randomized_mean(
        &self,
        query: &LocalMeanQuery,
        dataset: &Dataset,
    ) -> Result<LocalMeanResult, EngineError> {
        let attribute = query.attribute();
        let (low, high) = query.domain();
        let values = self.clipper.clip_range(dataset, attribute, low, high)?;
        if values.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let mechanism = Mechanism::RandomizedResponse {
            p: query.p(),
            domain_low: low,
            domain_high: high,
        };

        let mut sampler = self.sampler();
        let mut total = 0.0;
        for value in &values {
            total += sampler.respond(&mechanism, *value)?;
        }
        drop(sampler);

        let reported_mean = total / values.len() as f64;
        let estimate = query.debias(reported_mean);
        info!(
            "randomized-response mean on attribute {}: p={}, {} reports, estimate {}",
            attribute,
            query.p(),
            values.len(),
            estimate
        );

        Ok(LocalMeanResult {
            estimate,
            reported_mean,
            reports: values.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;

    fn engine(total: f64, seed: u64) -> QueryEngine {
        QueryEngine::with_source(&EngineConfig::new(total), SeededSource::from_u64(seed)).unwrap()
    }

    fn constant(n: usize, value: f64) -> Dataset {
        Dataset::new(
            (0..n)
                .map(|i| Record::new(format!("r{}", i), vec![value, 1.0]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_sum_charges_and_noises() {
        let engine = engine(1.0, 1);
        let q = Query::sum(0, 0.3).unwrap();
        let result = engine.run(&q, &constant(50, 0.5)).unwrap();

        assert_eq!(result.epsilon_charged, 0.3);
        assert!((engine.remaining() - 0.7).abs() < 1e-12);
        assert_eq!(result.noise_scale, 1.0 / 0.3);
        assert_ne!(result.value, 25.0);
    }

    #[test]
    fn test_rejected_query_leaves_budget() {
        let engine = engine(1.0, 2);
        engine.run(&Query::sum(0, 0.3).unwrap(), &constant(10, 1.0)).unwrap();

        let err = engine
            .run(&Query::count(0, 0.8).unwrap(), &constant(10, 1.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::BudgetExceeded { .. }));
        assert!(err.is_retryable());
        assert_eq!(engine.ledger().used(), 0.3);
    }

    #[test]
    fn test_rejection_draws_no_noise() {
        let a = engine(0.5, 3);
        let b = engine(0.5, 3);
        let ds = constant(10, 1.0);

        assert!(a.run(&Query::sum(0, 0.9).unwrap(), &ds).is_err());
        let after_rejection = a.run(&Query::sum(0, 0.1).unwrap(), &ds).unwrap();
        let fresh = b.run(&Query::sum(0, 0.1).unwrap(), &ds).unwrap();
        assert_eq!(after_rejection.value, fresh.value);
    }

    #[test]
    fn test_mean_divides_noised_sum() {
        let ds = constant(40, 0.5);
        let q = Query::mean(0, 0.5).unwrap();
        let sum_q = Query::sum(0, 0.5).unwrap();

        let mean = engine(1.0, 4).run(&q, &ds).unwrap();
        let sum = engine(1.0, 4).run(&sum_q, &ds).unwrap();
        assert!((mean.value - sum.value / 40.0).abs() < 1e-12);
        assert!((mean.ci95_half_width - sum.ci95_half_width / 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_mean_fails() {
        let engine = engine(1.0, 5);
        let err = engine
            .run(&Query::mean(0, 0.1).unwrap(), &Dataset::empty(2))
            .unwrap_err();
        assert_eq!(err, EngineError::EmptyDataset);
        assert_eq!(engine.ledger().used(), 0.0);
    }

    #[test]
    fn test_empty_sum_is_allowed() {
        let engine = engine(1.0, 6);
        let result = engine.run(&Query::sum(0, 0.1).unwrap(), &Dataset::empty(2)).unwrap();
        assert!(result.value.is_finite());
    }

    #[test]
    fn test_strict_schema_mismatch() {
        let engine = engine(1.0, 7);
        let err = engine
            .run(&Query::sum(5, 0.1).unwrap(), &constant(3, 1.0))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::SchemaMismatch {
                attribute: 5,
                width: 2
            }
        );
        assert_eq!(engine.ledger().charge_count(), 0);
    }

    #[test]
    fn test_lenient_zero_fill() {
        let config = EngineConfig::new(1.0).with_schema_policy(SchemaPolicy::Lenient);
        let engine = QueryEngine::with_source(&config, SeededSource::from_u64(8)).unwrap();
        let result = engine.run(&Query::sum(5, 1.0).unwrap(), &constant(3, 1.0)).unwrap();
        // raw sum is zero; only noise remains
        assert!(result.value.abs() < 50.0);
        assert_eq!(engine.ledger().charge_count(), 1);
    }

    #[test]
    fn test_count_ignores_values() {
        let engine = engine(10.0, 9);
        let result = engine
            .run(&Query::count(0, 5.0).unwrap(), &constant(100, -7.0))
            .unwrap();
        assert!((result.value - 100.0).abs() < 5.0);
        assert!(result.valid);
    }

    #[test]
    fn test_local_mean_does_not_charge() {
        let engine = engine(1.0, 10);
        let q = LocalMeanQuery::unit(0, 1.0).unwrap();
        let result = engine.local_randomized_mean(&q, &constant(20, 0.25)).unwrap();
        assert_eq!(result.estimate, 0.25);
        assert_eq!(result.reports, 20);
        assert_eq!(engine.remaining(), 1.0);
    }

    #[test]
    fn test_local_mean_empty_and_schema() {
        let engine = engine(1.0, 11);
        let q = LocalMeanQuery::unit(0, 0.5).unwrap();
        assert_eq!(
            engine.local_randomized_mean(&q, &Dataset::empty(1)),
            Err(EngineError::EmptyDataset)
        );
        let q = LocalMeanQuery::unit(9, 0.5).unwrap();
        assert!(matches!(
            engine.local_randomized_mean(&q, &constant(2, 0.5)),
            Err(EngineError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_lenient_local_mean_fills_inside_domain() {
        let config = EngineConfig::new(1.0).with_schema_policy(SchemaPolicy::Lenient);
        let engine = QueryEngine::with_source(&config, SeededSource::from_u64(12)).unwrap();
        let q = LocalMeanQuery::new(9, 1.0, 20.0, 40.0).unwrap();
        let result = engine.local_randomized_mean(&q, &constant(5, 0.5)).unwrap();
        assert_eq!(result.reported_mean, 20.0);
        assert_eq!(result.estimate, 20.0);
    }

    #[test]
    fn test_seeded_config_is_reproducible() {
        let config = EngineConfig::new(1.0).with_seed("replay");
        let ds = constant(10, 1.0);
        let q = Query::sum(0, 0.2).unwrap();
        let a = QueryEngine::from_config(&config).unwrap().run(&q, &ds).unwrap();
        let b = QueryEngine::from_config(&config).unwrap().run(&q, &ds).unwrap();
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(QueryEngine::new(-1.0), Err(EngineError::Config(_))));
    }
}
