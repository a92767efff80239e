#![forbid(unsafe_code)]

//! Batch validation of many inputs against one rule set
//!
//! Inputs are independent: each one gets its own context and its own
//! per-call cache, so they can run in parallel on rayon. Per-input results
//! are merged in input order, which keeps the output deterministic whatever
//! the worker count.

use crate::config::ValidatorOptions;
use crate::engine::cancel::CancellationToken;
use crate::engine::scheduler::{DependencyAwareValidator, Validator};
use crate::error::{ConfigError, RuleError, RuleflowError};
use crate::output::ValidationResult;
use crate::rules::{Rule, ValidationContext};
use rayon::prelude::*;
use std::sync::Arc;

/// Validates slices of inputs with a shared [`DependencyAwareValidator`]
pub struct BatchValidator<T> {
    validator: Arc<DependencyAwareValidator<T>>,
    parallel: bool,
    pool: Option<rayon::ThreadPool>,
}

impl<T: Sync> BatchValidator<T> {
    /// Creates a batch validator that runs on the global rayon pool
    pub fn new(validator: impl Into<Arc<DependencyAwareValidator<T>>>) -> Self {
        Self {
            validator: validator.into(),
            parallel: true,
            pool: None,
        }
    }

    /// Builds the underlying validator from `rules`
    ///
    /// # Errors
    ///
    /// Same as [`DependencyAwareValidator::new`].
    pub fn from_rules(rules: impl IntoIterator<Item = Rule<T>>) -> Result<Self, RuleError> {
        Ok(Self::new(DependencyAwareValidator::new(rules)?))
    }

    /// Creates a batch validator configured by `options`
    ///
    /// With `workers` set, batches run on a dedicated pool of that size;
    /// with `parallel_batch = false`, inputs are validated sequentially on
    /// the calling thread.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the dedicated pool cannot be
    /// built.
    pub fn with_options(
        validator: impl Into<Arc<DependencyAwareValidator<T>>>,
        options: &ValidatorOptions,
    ) -> Result<Self, ConfigError> {
        let pool = match options.workers {
            Some(workers) if options.parallel_batch => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("ruleflow-batch-{i}"))
                    .build()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "validator.workers".to_string(),
                        message: e.to_string(),
                    })?,
            ),
            _ => None,
        };

        tracing::debug!(
            parallel = options.parallel_batch,
            workers = ?options.workers,
            "batch validator configured"
        );

        Ok(Self {
            validator: validator.into(),
            parallel: options.parallel_batch,
            pool,
        })
    }

    pub fn validator(&self) -> &DependencyAwareValidator<T> {
        &self.validator
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Validates every input and merges the errors in input order
    pub fn validate_batch(&self, inputs: &[T]) -> ValidationResult {
        let results: Vec<ValidationResult> = if self.parallel {
            self.in_pool(|| {
                inputs
                    .par_iter()
                    .map(|input| self.validator.validate(input))
                    .collect()
            })
        } else {
            inputs
                .iter()
                .map(|input| self.validator.validate(input))
                .collect()
        };

        merge(inputs.len(), results)
    }

    /// Validates every input with a copy of `template`, honouring `token`
    ///
    /// The token is polled before each input and before each rule execution.
    ///
    /// # Errors
    ///
    /// Returns `RuleflowError::Cancelled` once the token is cancelled; the
    /// count covers the interrupted input only.
    pub fn validate_batch_with(
        &self,
        inputs: &[T],
        template: &ValidationContext,
        token: &CancellationToken,
    ) -> Result<ValidationResult, RuleflowError> {
        let validate_one = |input: &T| {
            if token.is_cancelled() {
                return Err(RuleflowError::Cancelled { executed: 0 });
            }
            let mut ctx = template.clone();
            self.validator.validate_with(input, &mut ctx, token)
        };

        let results: Vec<ValidationResult> = if self.parallel {
            self.in_pool(|| {
                inputs
                    .par_iter()
                    .map(validate_one)
                    .collect::<Result<_, _>>()
            })?
        } else {
            inputs
                .iter()
                .map(validate_one)
                .collect::<Result<_, _>>()?
        };

        Ok(merge(inputs.len(), results))
    }

    fn in_pool<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

fn merge(inputs: usize, results: Vec<ValidationResult>) -> ValidationResult {
    let mut merged = ValidationResult::new();
    for result in results {
        merged.merge(result);
    }
    tracing::debug!(inputs, errors = merged.len(), "batch validated");
    merged
}

impl<T: Sync> Validator<[T]> for BatchValidator<T> {
    fn collect_results(&self, inputs: &[T]) -> ValidationResult {
        self.validate_batch(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleFailure;
    use crate::types::RuleId;

    fn positive_rule() -> Rule<i32> {
        Rule::action(RuleId::new("positive").unwrap(), |n: &i32, _| {
            if *n > 0 {
                Ok(())
            } else {
                Err(RuleFailure::new(format!("{n} is not positive")))
            }
        })
    }

    fn messages(result: &ValidationResult) -> Vec<&str> {
        result.errors().iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn test_parallel_batch_preserves_input_order() {
        let batch = BatchValidator::from_rules(vec![positive_rule()]).unwrap();
        let inputs: Vec<i32> = (-50..50).collect();

        let result = batch.validate_batch(&inputs);
        let expected: Vec<String> = (-50..=0).map(|n| format!("{n} is not positive")).collect();

        assert_eq!(messages(&result), expected);
    }

    #[test]
    fn test_sequential_and_dedicated_pool_agree() {
        let inputs = vec![3, -1, 0, 7];
        let validator = Arc::new(DependencyAwareValidator::new(vec![positive_rule()]).unwrap());

        let sequential = BatchValidator::with_options(
            Arc::clone(&validator),
            &ValidatorOptions {
                parallel_batch: false,
                workers: None,
            },
        )
        .unwrap();
        let pooled = BatchValidator::with_options(
            Arc::clone(&validator),
            &ValidatorOptions {
                parallel_batch: true,
                workers: Some(2),
            },
        )
        .unwrap();

        assert!(!sequential.is_parallel());
        assert_eq!(sequential.validate_batch(&inputs), pooled.validate_batch(&inputs));
        assert_eq!(pooled.validate_batch(&inputs).len(), 2);
    }

    #[test]
    fn test_empty_batch_is_valid() {
        let batch = BatchValidator::from_rules(vec![positive_rule()]).unwrap();
        assert!(batch.validate_batch(&[]).is_valid());
        assert!(batch.is_valid(&[1, 2, 3]));
    }

    #[test]
    fn test_cancelled_batch() {
        let batch = BatchValidator::from_rules(vec![positive_rule()]).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = batch.validate_batch_with(&[1, 2], &ValidationContext::new(), &token);
        assert!(matches!(result, Err(RuleflowError::Cancelled { .. })));
    }

    #[test]
    fn test_template_context_is_copied_per_input() {
        let rule = Rule::action(RuleId::new("limit").unwrap(), |n: &i32, ctx| {
            let limit = ctx.get_typed::<i32>("limit").unwrap_or(0);
            ctx.set("limit", limit + 1000);
            if *n <= limit {
                Ok(())
            } else {
                Err("over limit".into())
            }
        });
        let batch = BatchValidator::from_rules(vec![rule]).unwrap();

        let mut template = ValidationContext::new();
        template.set("limit", 10);

        let result = batch
            .validate_batch_with(&[5, 50, 500], &template, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.len(), 2);
    }
}
