//! Rule scheduling, batch execution and result aggregation

pub mod batch;
pub mod cancel;
pub mod composite;
pub mod graph;
pub mod scheduler;

pub use batch::BatchValidator;
pub use cancel::CancellationToken;
pub use composite::CompositeValidator;
pub use graph::DependencyGraph;
pub use scheduler::{DependencyAwareValidator, Validator};

use crate::error::RuleError;
use crate::output::ValidationResult;
use crate::rules::Rule;

/// Validates one input against `rules`
///
/// Builds a [`DependencyAwareValidator`] and runs it once; keep the
/// validator instead when validating repeatedly.
pub fn validate<T>(
    input: &T,
    rules: impl IntoIterator<Item = Rule<T>>,
) -> Result<ValidationResult, RuleError> {
    Ok(DependencyAwareValidator::new(rules)?.validate(input))
}

/// Validates every input against `rules` on the global rayon pool
pub fn validate_batch<T: Sync>(
    inputs: &[T],
    rules: impl IntoIterator<Item = Rule<T>>,
) -> Result<ValidationResult, RuleError> {
    Ok(BatchValidator::from_rules(rules)?.validate_batch(inputs))
}
