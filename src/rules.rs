#![forbid(unsafe_code)]

//! Rule definitions, the per-call context and the registry

pub mod context;
pub mod events;
pub mod registry;
mod rule;

// Re-export core types
pub use context::{RuleExecutionResult, ValidationContext};
pub use events::{EventHandler, EventHub};
pub use registry::RuleRegistry;
pub use rule::{
    CheckFn, PredicateFn, Rule, RuleCheck, RuleFailure, RuleKind, RuleVariant, SwitchCases,
    TimePredicateFn, TimeSource,
};
