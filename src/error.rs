//! Error types for Ruleflow
//!
//! This module defines the error types used throughout Ruleflow, following
//! a hierarchical structure with specific error variants for different
//! error categories. Rule *failures* are not errors: they are folded into a
//! [`ValidationResult`](crate::output::ValidationResult).

use crate::output::ValidationError;
use crate::types::RuleId;

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading a configuration file
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid TOML syntax or shape
    #[error("Invalid configuration syntax: {0}")]
    InvalidSyntax(#[from] toml::de::Error),

    /// Configuration parsed but failed validation
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// Invalid configuration value
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Rule-related errors
///
/// These abort construction of a validator or a registry operation; they are
/// never produced while validating an input.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Invalid rule definition
    #[error("Invalid rule definition: {0}")]
    InvalidDefinition(String),

    /// Rule not found
    #[error("Rule not found: {0}")]
    NotFound(String),

    /// Two rules with the same id in one rule set
    #[error("Duplicate rule ID '{0}'")]
    DuplicateId(RuleId),

    /// A dependent rule names a rule that is not part of the rule set
    #[error("Rule '{rule}' depends on unknown rule '{dependency}'")]
    UnknownDependency { rule: RuleId, dependency: RuleId },

    /// The dependency graph contains a cycle
    #[error("Circular dependency detected: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<RuleId> },

    /// A rule type cannot be removed while rules still reference it
    #[error("Rule type {type_id} is still used by {rules} rule(s)")]
    TypeInUse { type_id: u32, rules: usize },
}

/// Top-level error type for Ruleflow
#[derive(Debug, thiserror::Error)]
pub enum RuleflowError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rule error
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// Validation was cancelled between rule evaluations
    #[error("Validation cancelled after {executed} rule evaluation(s)")]
    Cancelled { executed: usize },

    /// Raised at the fail-fast boundary for an invalid result
    #[error("Validation failed with {} error(s){}", .errors.len(), critical_suffix(.critical))]
    ValidationFailed {
        errors: Vec<ValidationError>,
        critical: bool,
    },
}

fn critical_suffix(critical: &bool) -> &'static str {
    if *critical { " (critical)" } else { "" }
}

fn format_cycle(cycle: &[RuleId]) -> String {
    cycle
        .iter()
        .map(RuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
