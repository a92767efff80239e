#![forbid(unsafe_code)]

//! Core domain types for Ruleflow
//!
//! This module defines the identifiers, severity levels and grouping types
//! shared by the rule model, the registry and the scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity attached to a failing rule
///
/// Levels are ordered: `Verbose < Debug < Information < Warning < Error < Critical`.
/// Only `Error` and above make a result invalid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Verbose,
    Debug,
    Information,
    Warning,
    #[default]
    Error,
    Critical,
}

impl Severity {
    /// All levels in ascending order
    pub const ALL: [Severity; 6] = [
        Severity::Verbose,
        Severity::Debug,
        Severity::Information,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Returns true if an error at this level makes a result invalid
    pub fn is_blocking(self) -> bool {
        self >= Severity::Error
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Verbose => "verbose",
            Severity::Debug => "debug",
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a dependent rule runs, given its dependencies' outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// Run only if every dependency succeeded
    #[default]
    RequiresAllSuccess,
    /// Run if at least one dependency succeeded
    RequiresAnySuccess,
    /// Run if at least one dependency failed
    RequiresAnyFailure,
}

impl DependencyPolicy {
    /// Applies the policy to a sequence of dependency outcomes (`true` = succeeded)
    ///
    /// An empty sequence satisfies `RequiresAllSuccess` and neither of the
    /// "any" policies.
    pub fn permits(self, outcomes: &[bool]) -> bool {
        let all_succeeded = outcomes.iter().all(|&ok| ok);
        let any_succeeded = outcomes.iter().any(|&ok| ok);
        let any_failed = outcomes.iter().any(|&ok| !ok);

        match self {
            DependencyPolicy::RequiresAllSuccess => all_succeeded,
            DependencyPolicy::RequiresAnySuccess => any_succeeded,
            DependencyPolicy::RequiresAnyFailure => any_failed,
        }
    }
}

/// A validated rule identifier
///
/// Rule IDs must be non-empty and contain only alphanumeric characters,
/// hyphens, underscores, dots and colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleId(String);

impl RuleId {
    /// Creates a new RuleId, validating the input
    ///
    /// Returns None if the input is empty or contains invalid characters
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            return None;
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        {
            return None;
        }
        Some(RuleId(id))
    }

    /// Returns the rule ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RuleId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RuleId::new(value.clone()).ok_or_else(|| format!("Invalid rule ID '{}'", value))
    }
}

impl TryFrom<&str> for RuleId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        RuleId::try_from(value.to_string())
    }
}

impl From<RuleId> for String {
    fn from(rule_id: RuleId) -> Self {
        rule_id.0
    }
}

impl AsRef<str> for RuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A category of rules, referenced from `Rule::type_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleType {
    /// Numeric identifier, unique within a registry
    pub id: u32,
    /// Technical code, unique within a registry
    pub code: String,
    /// Human-readable name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleType {
    pub fn new(id: u32, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            description: None,
            enabled: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A named, ordered collection of rule ids
///
/// Groups hold ids only; members are resolved through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub rule_ids: Vec<RuleId>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl RuleGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            rule_ids: Vec::new(),
            active: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a member id; ids already present are ignored
    pub fn with_rule(mut self, rule_id: RuleId) -> Self {
        if !self.rule_ids.contains(&rule_id) {
            self.rule_ids.push(rule_id);
        }
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

fn default_true() -> bool {
    true
}
