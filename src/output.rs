//! Aggregated validation output

pub mod result;

pub use result::{ErrorContext, ValidationError, ValidationResult};
