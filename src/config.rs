//! Configuration file parsing and validation

pub mod ruleflow_toml;

pub use ruleflow_toml::{Config, RuleSettings, RuleValue, RulesConfig, ValidatorOptions};
