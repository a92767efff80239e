#![forbid(unsafe_code)]

//! Several validators behind one [`Validator`] surface

use crate::engine::scheduler::Validator;
use crate::output::ValidationResult;

/// Runs every inner validator on the same input
///
/// Errors are concatenated in the order the validators were added.
pub struct CompositeValidator<'a, T: ?Sized> {
    validators: Vec<Box<dyn Validator<T> + Send + Sync + 'a>>,
}

impl<'a, T: ?Sized> CompositeValidator<'a, T> {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    pub fn with(mut self, validator: impl Validator<T> + Send + Sync + 'a) -> Self {
        self.push(validator);
        self
    }

    pub fn push(&mut self, validator: impl Validator<T> + Send + Sync + 'a) {
        self.validators.push(Box::new(validator));
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<T: ?Sized> Default for CompositeValidator<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Validator<T> for CompositeValidator<'_, T> {
    fn collect_results(&self, input: &T) -> ValidationResult {
        let mut result = ValidationResult::new();
        for validator in &self.validators {
            result.merge(validator.collect_results(input));
        }
        result
    }
}

impl<T: ?Sized, V: Validator<T> + ?Sized> Validator<T> for &V {
    fn collect_results(&self, input: &T) -> ValidationResult {
        (**self).collect_results(input)
    }
}

impl<T: ?Sized, V: Validator<T> + ?Sized> Validator<T> for std::sync::Arc<V> {
    fn collect_results(&self, input: &T) -> ValidationResult {
        (**self).collect_results(input)
    }
}
