//! Parsing and validation for ruleflow.toml configuration files

use crate::error::ConfigError;
use crate::types::{RuleId, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Main configuration struct for ruleflow.toml
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Validator options
    #[serde(default)]
    pub validator: ValidatorOptions,

    /// Per-rule overrides, keyed by rule id
    #[serde(default)]
    pub rules: RulesConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.validator.workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "validator.workers".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        for (rule_id, rule_value) in &self.rules {
            if let RuleValue::Settings(settings) = rule_value
                && settings.is_empty()
            {
                return Err(ConfigError::Validation(format!(
                    "Settings for rule '{}' are empty; use `{} = true` to keep the rule unchanged",
                    rule_id, rule_id
                )));
            }
        }

        Ok(())
    }
}

/// Validator section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorOptions {
    /// Validate batch inputs on the rayon pool
    #[serde(default = "default_parallel_batch")]
    pub parallel_batch: bool,

    /// Size of a dedicated batch pool; the global rayon pool when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            parallel_batch: default_parallel_batch(),
            workers: None,
        }
    }
}

fn default_parallel_batch() -> bool {
    true
}

/// Rules section: rule id to override, applied in id order
pub type RulesConfig = BTreeMap<RuleId, RuleValue>;

/// A rule can be kept or removed with a boolean, or tuned with settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    /// `false` removes the rule; `true` keeps it unchanged
    Enabled(bool),
    /// Settings table for the rule
    Settings(RuleSettings),
}

/// Overrides for an individual rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl RuleSettings {
    pub fn is_empty(&self) -> bool {
        self.severity.is_none() && self.priority.is_none() && self.active.is_none()
    }
}
