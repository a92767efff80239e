#![forbid(unsafe_code)]

//! Validation errors and the aggregated validation result
//!
//! A [`ValidationResult`] is created fresh for every validation call and is
//! append-only: the scheduler folds each rule's error into it and the caller
//! consumes it.

use crate::error::RuleflowError;
use crate::types::{RuleId, Severity};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// Opaque, caller-supplied payload attached to an error
///
/// Shared by reference; never copied or inspected by the engine.
pub type ErrorContext = Arc<dyn Any + Send + Sync>;

/// A single validation error
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    /// Human-readable message; may be empty
    pub message: String,

    pub severity: Severity,

    /// Optional machine-readable code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Rule that produced this error, set by the scheduler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,

    #[serde(skip)]
    pub context: Option<ErrorContext>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            code: None,
            rule_id: None,
            context: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_rule_id(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Downcasts the attached context, if any
    pub fn context_as<C: Any>(&self) -> Option<&C> {
        self.context.as_deref().and_then(|ctx| ctx.downcast_ref::<C>())
    }
}

/// Contexts compare by identity, everything else by value.
impl PartialEq for ValidationError {
    fn eq(&self, other: &Self) -> bool {
        let same_context = match (&self.context, &other.context) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.message == other.message
            && self.severity == other.severity
            && self.code == other.code
            && self.rule_id == other.rule_id
            && same_context
    }
}

/// Aggregated outcome of one validation call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

#[derive(Serialize)]
struct ResultReport<'a> {
    valid: bool,
    has_critical_errors: bool,
    error_count: usize,
    errors: &'a [ValidationError],
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// No error at `Error` severity or above
    pub fn is_valid(&self) -> bool {
        !self.errors.iter().any(|e| e.severity.is_blocking())
    }

    pub fn has_critical_errors(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Critical)
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Creates and appends an error from a message and severity
    pub fn add(&mut self, message: impl Into<String>, severity: Severity) {
        self.errors.push(ValidationError::new(message, severity));
    }

    /// Appends a batch of errors, preserving their order
    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    /// Appends all errors of another result
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    /// Errors whose severity equals `severity` exactly
    pub fn errors_by_severity(&self, severity: Severity) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == severity)
            .collect()
    }

    /// Errors at `severity` or above
    pub fn errors_at_least(&self, severity: Severity) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity >= severity)
            .collect()
    }

    /// Errors produced by the given rule
    pub fn errors_for_rule(&self, rule_id: &RuleId) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.rule_id.as_ref() == Some(rule_id))
            .collect()
    }

    /// Runs `action` when the result is valid
    pub fn on_success(self, action: impl FnOnce()) -> Self {
        if self.is_valid() {
            action();
        }
        self
    }

    /// Runs `action` with `input` when the result is valid
    pub fn on_success_with<I>(self, input: I, action: impl FnOnce(I)) -> Self {
        if self.is_valid() {
            action(input);
        }
        self
    }

    /// Runs `action` with the collected errors when the result is invalid
    pub fn on_failure(self, action: impl FnOnce(&[ValidationError])) -> Self {
        if !self.is_valid() {
            action(&self.errors);
        }
        self
    }

    /// Fail-fast boundary: converts an invalid result into an error
    pub fn into_result(self) -> Result<ValidationResult, RuleflowError> {
        if self.is_valid() {
            Ok(self)
        } else {
            let critical = self.has_critical_errors();
            Err(RuleflowError::ValidationFailed {
                errors: self.errors,
                critical,
            })
        }
    }

    /// Serializes a report of this result as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ResultReport {
            valid: self.is_valid(),
            has_critical_errors: self.has_critical_errors(),
            error_count: self.errors.len(),
            errors: &self.errors,
        })
    }
}

impl FromIterator<ValidationError> for ValidationResult {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl Extend<ValidationError> for ValidationResult {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}
