//! DP Engine - Privacy Budget Accounting & Noised Query Engine
//!
//! Answers linear aggregate queries (sum, count, mean) over an in-memory
//! dataset with calibrated Laplace noise, while a ledger enforces a fixed
//! total privacy budget under sequential composition.
//!
//! # Components
//!
//! - [`NoiseSampler`]: Laplace and randomized-response perturbations from an
//!   injectable [`RandomSource`]
//! - [`SensitivityClipper`]: bounds each record's contribution
//! - [`BudgetLedger`]: atomic, one-way-depleting ε accounting
//! - [`QueryEngine`]: clip → aggregate → charge → noise → annotate
//! - [`ResultValidator`]: diagnostic plausibility bound on results
//!
//! # Example
//!
//! ```rust
//! use dp_engine::{Dataset, EngineConfig, Query, QueryEngine, Record, SeededSource};
//!
//! let dataset = Dataset::new(vec![
//!     Record::new("a", vec![0.4]),
//!     Record::new("b", vec![0.9]),
//! ]).unwrap();
//!
//! let config = EngineConfig::new(1.0);
//! let engine = QueryEngine::with_source(&config, SeededSource::from_u64(7)).unwrap();
//!
//! let result = engine.run(&Query::sum(0, 0.3).unwrap(), &dataset).unwrap();
//! assert_eq!(result.epsilon_charged, 0.3);
//! assert!((engine.remaining() - 0.7).abs() < 1e-12);
//! ```

pub mod budget;
pub mod clipper;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod laplace;
#[cfg(feature = "cli")]
pub mod logging;
pub mod mechanism;
pub mod query;
pub mod rng;
pub mod validation;
pub mod validator;

// Re-export commonly used types for convenience
pub use budget::{
    basic_composition, compare_compositions, BudgetError, BudgetLedger, ChargeReceipt,
    CompositionComparison, LedgerSnapshot,
};
pub use clipper::{ClipError, SchemaMismatch, SchemaPolicy, SensitivityClipper};
pub use config::EngineConfig;
pub use dataset::{Dataset, DatasetError, Record};
pub use engine::QueryEngine;
pub use error::EngineError;
pub use laplace::LaplaceMechanism;
pub use mechanism::{Mechanism, NoiseSampler};
pub use query::{
    AggregateKind, LocalMeanQuery, LocalMeanResult, Query, QueryResult, QuerySpec,
};
pub use rng::{OsEntropy, RandomSource, RngError, Seed, SeededSource};
pub use validation::{recommended_parameters, PrivacyLevel, ValidationError};
pub use validator::ResultValidator;
