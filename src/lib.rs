#![forbid(unsafe_code)]

//! Ruleflow: dependency-aware rule validation
//!
//! Ruleflow validates an input against a set of named, prioritized rules.
//! Rules may declare dependencies on the outcomes of other rules; the
//! scheduler rejects cyclic rule sets up front, orders independent rules by
//! priority, applies each dependent rule's policy and folds every failure
//! into a single [`ValidationResult`].
//!
//! ```
//! use ruleflow::{DependencyAwareValidator, Rule, RuleFailure, RuleId, Severity};
//!
//! struct User {
//!     name: String,
//! }
//!
//! let rules = vec![
//!     Rule::action(RuleId::new("name-present").unwrap(), |u: &User, _| {
//!         if u.name.is_empty() {
//!             Err(RuleFailure::new("name is required"))
//!         } else {
//!             Ok(())
//!         }
//!     })
//!     .with_priority(10),
//!     Rule::dependent(
//!         RuleId::new("name-length").unwrap(),
//!         [RuleId::new("name-present").unwrap()],
//!         |u: &User, _| {
//!             if u.name.len() >= 3 {
//!                 Ok(())
//!             } else {
//!                 Err(RuleFailure::new("name too short"))
//!             }
//!         },
//!     )
//!     .with_severity(Severity::Warning),
//! ];
//!
//! let validator = DependencyAwareValidator::new(rules).unwrap();
//! let result = validator.validate(&User { name: String::new() });
//! assert_eq!(result.len(), 1);
//! assert!(!result.is_valid());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod rules;
pub mod types;

// Re-export error types for convenient access
pub use error::{ConfigError, RuleError, RuleflowError};

// Re-export core domain types for convenient access
pub use types::{DependencyPolicy, RuleGroup, RuleId, RuleType, Severity};

pub use config::{Config, ValidatorOptions};
pub use engine::{
    BatchValidator, CancellationToken, CompositeValidator, DependencyAwareValidator,
    DependencyGraph, Validator, validate, validate_batch,
};
pub use output::{ValidationError, ValidationResult};
pub use rules::{EventHub, Rule, RuleFailure, RuleRegistry, TimeSource, ValidationContext};
