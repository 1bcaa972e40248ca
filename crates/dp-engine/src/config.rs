//! Engine configuration, loaded from JSON.
//!
//! ```json
//! {
//!   "total_epsilon": 1.0,
//!   "schema_policy": "strict",
//!   "validator_slack": 10.0,
//!   "seed": "census-run-3"
//! }
//! ```
//!
//! Only `total_epsilon` is required.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clipper::SchemaPolicy;
use crate::error::EngineError;
use crate::validation::validate_budget_total;
use crate::validator::DEFAULT_SLACK;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Total ε allowance for the session
    pub total_epsilon: f64,
    #[serde(default)]
    pub schema_policy: SchemaPolicy,
    #[serde(default = "default_slack")]
    pub validator_slack: f64,
    /// Label for a reproducible noise stream; OS entropy when absent
    #[serde(default)]
    pub seed: Option<String>,
}

fn default_slack() -> f64 {
    DEFAULT_SLACK
}

impl EngineConfig {
    pub fn new(total_epsilon: f64) -> Self {
        EngineConfig {
            total_epsilon,
            schema_policy: SchemaPolicy::default(),
            validator_slack: DEFAULT_SLACK,
            seed: None,
        }
    }

    pub fn with_schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.schema_policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_validator_slack(mut self, slack: f64) -> Self {
        self.validator_slack = slack;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_budget_total(self.total_epsilon).map_err(|e| EngineError::Config(e.to_string()))?;
        if !self.validator_slack.is_finite() || self.validator_slack < 0.0 {
            return Err(EngineError::Config(format!(
                "validator_slack must be finite and non-negative, got {}",
                self.validator_slack
            )));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json() {
        let config = EngineConfig::from_json_str(r#"{"total_epsilon": 2.0}"#).unwrap();
        assert_eq!(config, EngineConfig::new(2.0));
        assert_eq!(config.schema_policy, SchemaPolicy::Strict);
        assert_eq!(config.validator_slack, 10.0);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_full_json() {
        let config = EngineConfig::from_json_str(
            r#"{"total_epsilon": 1.0, "schema_policy": "lenient", "validator_slack": 2.5, "seed": "s"}"#,
        )
        .unwrap();
        assert_eq!(config.schema_policy, SchemaPolicy::Lenient);
        assert_eq!(config.validator_slack, 2.5);
        assert_eq!(config.seed.as_deref(), Some("s"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(EngineConfig::from_json_str(r#"{"total_epsilon": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"total_epsilon": 1, "validator_slack": -1}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"schema_policy": "strict"}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/dp-engine.json").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
