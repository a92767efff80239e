//! Test utilities for ruleflow integration tests

#![allow(dead_code)]

use ruleflow::{Rule, RuleFailure, RuleId, ValidationResult};
use std::sync::{Arc, Mutex};

/// Result type alias for tests
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Extract Ok value or panic with context
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("assertion failed: expected Ok, got Err({:?})", e),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Extract Some value or panic with context
#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {
        match $expr {
            Some(v) => v,
            None => panic!("assertion failed: expected Some, got None"),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Some(v) => v,
            None => panic!("{}: got None", $msg),
        }
    };
}

pub fn id(s: &str) -> RuleId {
    RuleId::new(s).unwrap()
}

/// Shared log of rule executions, in the order they happened
#[derive(Clone, Default)]
pub struct ExecutionLog(Arc<Mutex<Vec<String>>>);

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries().iter().position(|entry| entry == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }
}

/// An action rule that logs its execution and passes or fails as told
pub fn logged_rule<T: 'static>(log: &ExecutionLog, name: &str, fails: bool) -> Rule<T> {
    let log = log.clone();
    let label = name.to_string();
    Rule::action(id(name), move |_: &T, _| {
        log.record(&label);
        if fails {
            Err(RuleFailure::new(format!("{label} failed")))
        } else {
            Ok(())
        }
    })
}

/// A dependent rule that logs its execution and passes or fails as told
pub fn logged_dependent<T: 'static>(log: &ExecutionLog, name: &str, deps: &[&str], fails: bool) -> Rule<T> {
    let log = log.clone();
    let label = name.to_string();
    Rule::dependent(id(name), deps.iter().map(|d| id(d)), move |_: &T, _| {
        log.record(&label);
        if fails {
            Err(RuleFailure::new(format!("{label} failed")))
        } else {
            Ok(())
        }
    })
}

pub fn messages(result: &ValidationResult) -> Vec<String> {
    result.errors().iter().map(|e| e.message.clone()).collect()
}
