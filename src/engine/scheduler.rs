#![forbid(unsafe_code)]

//! Dependency-aware rule scheduling
//!
//! [`DependencyAwareValidator`] owns a rule set whose dependency graph has
//! been proven acyclic. Each validation call walks the rules by priority,
//! resolves dependencies depth-first through a per-call cache, applies the
//! dependency policies and folds every rule's error into one
//! [`ValidationResult`].

use crate::engine::cancel::CancellationToken;
use crate::engine::graph::DependencyGraph;
use crate::error::{RuleError, RuleflowError};
use crate::output::{ValidationError, ValidationResult};
use crate::rules::registry::RuleRegistry;
use crate::rules::{EventHub, Rule, ValidationContext};
use crate::types::RuleId;
use std::cmp::Reverse;
use std::convert::Infallible;

/// Surface shared by every validator
///
/// Only [`collect_results`](Validator::collect_results) must be implemented;
/// the rest are conveniences over it.
pub trait Validator<T: ?Sized> {
    /// Validates `input` and returns every collected error
    fn collect_results(&self, input: &T) -> ValidationResult;

    fn is_valid(&self, input: &T) -> bool {
        self.collect_results(input).is_valid()
    }

    /// First collected error, in result order
    fn first_error(&self, input: &T) -> Option<ValidationError> {
        self.collect_results(input).into_errors().into_iter().next()
    }

    /// Fail-fast variant of [`collect_results`](Validator::collect_results)
    ///
    /// # Errors
    ///
    /// Returns `RuleflowError::ValidationFailed` if any error is at `Error`
    /// severity or above.
    fn validate_or_fail(&self, input: &T) -> Result<ValidationResult, RuleflowError> {
        self.collect_results(input).into_result()
    }

    /// Runs `process` on `input` only when it is valid
    fn validate_and_process(&self, input: &T, process: impl FnOnce(&T)) -> ValidationResult
    where
        Self: Sized,
    {
        let result = self.collect_results(input);
        if result.is_valid() {
            process(input);
        }
        result
    }

    /// Runs exactly one of `on_success` or `on_failure`
    fn validate_and_execute(
        &self,
        input: &T,
        on_success: impl FnOnce(&T),
        on_failure: impl FnOnce(&[ValidationError]),
    ) -> ValidationResult
    where
        Self: Sized,
    {
        let result = self.collect_results(input);
        if result.is_valid() {
            on_success(input);
        } else {
            on_failure(result.errors());
        }
        result
    }
}

/// Outcome of one rule within one validation call
///
/// `success` is whether the rule's check passed and is what the context
/// records. `valid` is whether its result is still valid, that is, it failed
/// at most below `Error`; dependency policies are decided on `valid`.
#[derive(Debug)]
struct Outcome {
    success: bool,
    valid: bool,
    error: Option<ValidationError>,
}

impl Outcome {
    fn succeeded() -> Self {
        Self {
            success: true,
            valid: true,
            error: None,
        }
    }

    fn failed(error: ValidationError) -> Self {
        Self {
            success: false,
            valid: !error.severity.is_blocking(),
            error: Some(error),
        }
    }
}

/// Decides whether a run may execute its next rule
trait Interrupt {
    type Error;

    fn check(&self, executed: usize) -> Result<(), Self::Error>;
}

/// Runs without a token never stop early.
impl Interrupt for () {
    type Error = Infallible;

    fn check(&self, _executed: usize) -> Result<(), Infallible> {
        Ok(())
    }
}

impl Interrupt for &CancellationToken {
    type Error = RuleflowError;

    fn check(&self, executed: usize) -> Result<(), RuleflowError> {
        if self.is_cancelled() {
            tracing::warn!(executed, "validation cancelled");
            return Err(RuleflowError::Cancelled { executed });
        }
        Ok(())
    }
}

/// State of a single validation call
///
/// The cache is indexed by rule position and dropped with the run, so no
/// outcome leaks into another call or another input.
struct Run<'a, T, I> {
    validator: &'a DependencyAwareValidator<T>,
    input: &'a T,
    ctx: &'a mut ValidationContext,
    interrupt: I,
    cache: Vec<Option<Outcome>>,
    executed: usize,
}

impl<T, I: Interrupt> Run<'_, T, I> {
    /// Evaluates rule `node` once, resolving its dependencies first
    ///
    /// Returns whether the rule's result is valid, which is what dependency
    /// policies consult.
    fn evaluate(&mut self, node: usize) -> Result<bool, I::Error> {
        if let Some(outcome) = &self.cache[node] {
            return Ok(outcome.valid);
        }

        let validator = self.validator;
        let rule = &validator.rules[node];

        if !rule.is_active() {
            tracing::trace!(rule = %rule.id(), "skipping inactive rule");
            return Ok(self.finish(node, Outcome::succeeded()));
        }

        if let Some(policy) = rule.policy() {
            let mut outcomes = Vec::with_capacity(rule.dependencies().len());
            for &dependency in validator.graph.dependency_indices(node) {
                outcomes.push(self.evaluate(dependency)?);
            }

            if !policy.permits(&outcomes) {
                tracing::debug!(
                    rule = %rule.id(),
                    ?policy,
                    ?outcomes,
                    "dependency policy not satisfied, rule not executed"
                );
                return Ok(self.finish(node, Outcome::succeeded()));
            }
        }

        self.interrupt.check(self.executed)?;

        let outcome = match rule.evaluate(self.input, self.ctx) {
            Ok(()) => Outcome::succeeded(),
            Err(failure) => Outcome::failed(failure.into_error(rule.id(), rule.severity())),
        };
        self.executed += 1;
        tracing::trace!(
            rule = %rule.id(),
            success = outcome.success,
            valid = outcome.valid,
            "rule executed"
        );

        Ok(self.finish(node, outcome))
    }

    fn finish(&mut self, node: usize, outcome: Outcome) -> bool {
        let valid = outcome.valid;
        self.ctx
            .record_rule_result(self.validator.rules[node].id().clone(), outcome.success);
        self.cache[node] = Some(outcome);
        valid
    }
}

/// Validator that schedules rules by priority and declared dependencies
///
/// Construction proves the rule set is well formed (unique ids, resolvable
/// dependencies, no cycles); validation itself never fails except through
/// cancellation.
#[derive(Debug, Clone)]
pub struct DependencyAwareValidator<T> {
    rules: Vec<Rule<T>>,
    graph: DependencyGraph,
    order: Vec<usize>,
    events: EventHub,
}

impl<T> DependencyAwareValidator<T> {
    /// Creates a validator over `rules`
    ///
    /// Rules run by descending priority; equal priorities keep the order in
    /// which they were given.
    ///
    /// # Errors
    ///
    /// - `RuleError::DuplicateId` if two rules share an id
    /// - `RuleError::UnknownDependency` if a dependency is not in `rules`
    /// - `RuleError::CircularDependency` if dependencies form a cycle
    pub fn new(rules: impl IntoIterator<Item = Rule<T>>) -> Result<Self, RuleError> {
        let rules: Vec<Rule<T>> = rules.into_iter().collect();
        let graph = DependencyGraph::build(&rules)?;

        let mut order: Vec<usize> = (0..rules.len()).collect();
        order.sort_by_key(|&node| Reverse(rules[node].priority()));

        let ordered: Vec<&str> = order.iter().map(|&n| rules[n].id().as_str()).collect();
        tracing::debug!(
            rules = rules.len(),
            dependencies = graph.edge_count(),
            order = ?ordered,
            "validator constructed"
        );

        Ok(Self {
            rules,
            graph,
            order,
            events: EventHub::new(),
        })
    }

    /// Sets the event hub handed to every context this validator creates
    ///
    /// Contexts passed to [`validate_in`](Self::validate_in) or
    /// [`validate_with`](Self::validate_with) keep their own hub.
    pub fn with_events(mut self, events: EventHub) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Creates a validator over every rule in `registry`
    ///
    /// Inactive rules are kept so that dependencies on them resolve; they
    /// count as succeeded and never run.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new), except duplicates cannot occur.
    pub fn from_registry(registry: &RuleRegistry<T>) -> Result<Self, RuleError> {
        Self::new(registry.all_rules().into_iter().cloned())
    }

    /// Validates `input` with a fresh context
    pub fn validate(&self, input: &T) -> ValidationResult {
        let mut ctx = ValidationContext::new().with_events(self.events.clone());
        self.validate_in(input, &mut ctx)
    }

    /// Validates `input` with a caller-supplied context
    ///
    /// Rule outcomes left in `ctx` by an earlier call are cleared first;
    /// properties and the evaluation time are kept.
    pub fn validate_in(&self, input: &T, ctx: &mut ValidationContext) -> ValidationResult {
        let Ok(result) = self.run(input, ctx, ());
        result
    }

    /// Validates `input`, polling `token` before every rule execution
    ///
    /// # Errors
    ///
    /// Returns `RuleflowError::Cancelled` once the token is cancelled.
    pub fn validate_with(
        &self,
        input: &T,
        ctx: &mut ValidationContext,
        token: &CancellationToken,
    ) -> Result<ValidationResult, RuleflowError> {
        self.run(input, ctx, token)
    }

    /// Rule ids in outer iteration order
    pub fn execution_order(&self) -> Vec<&RuleId> {
        self.order.iter().map(|&n| self.rules[n].id()).collect()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Rules in the order they were given
    pub fn rules(&self) -> &[Rule<T>] {
        &self.rules
    }

    pub fn rule(&self, id: &RuleId) -> Option<&Rule<T>> {
        self.graph.index_of(id).map(|n| &self.rules[n])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn run<I: Interrupt>(
        &self,
        input: &T,
        ctx: &mut ValidationContext,
        interrupt: I,
    ) -> Result<ValidationResult, I::Error> {
        ctx.reset_rule_results();

        let mut run = Run {
            validator: self,
            input,
            ctx,
            interrupt,
            cache: (0..self.rules.len()).map(|_| None).collect(),
            executed: 0,
        };

        let mut result = ValidationResult::new();
        for &node in &self.order {
            run.evaluate(node)?;
            if let Some(error) = run.cache[node].as_mut().and_then(|o| o.error.take()) {
                result.add_error(error);
            }
        }

        tracing::trace!(
            executed = run.executed,
            errors = result.len(),
            "validation run finished"
        );
        Ok(result)
    }
}

impl<T> Validator<T> for DependencyAwareValidator<T> {
    fn collect_results(&self, input: &T) -> ValidationResult {
        self.validate(input)
    }
}
