#![forbid(unsafe_code)]

//! Rule model: identity, scheduling metadata and the evaluation variants
//!
//! A [`Rule`] is immutable once built. Its evaluation payload lives behind
//! `Arc`s, so cloning a rule (for example into a registry and a validator)
//! is cheap and never duplicates user closures.

use super::context::ValidationContext;
use crate::output::{ErrorContext, ValidationError};
use crate::types::{DependencyPolicy, RuleId, Severity};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INTERNAL_ID: AtomicU64 = AtomicU64::new(1);

/// Failure signalled by a rule check
///
/// The scheduler turns it into exactly one [`ValidationError`] carrying the
/// failing rule's severity.
#[derive(Debug, Clone)]
pub struct RuleFailure {
    pub message: String,
    pub code: Option<String>,
    pub context: Option<ErrorContext>,
}

impl RuleFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            context: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Converts the failure into an error attributed to `rule_id`
    pub fn into_error(self, rule_id: &RuleId, severity: Severity) -> ValidationError {
        ValidationError {
            message: self.message,
            severity,
            code: self.code,
            rule_id: Some(rule_id.clone()),
            context: self.context,
        }
    }
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&str> for RuleFailure {
    fn from(message: &str) -> Self {
        RuleFailure::new(message)
    }
}

impl From<String> for RuleFailure {
    fn from(message: String) -> Self {
        RuleFailure::new(message)
    }
}

/// A check run against an input
///
/// Implemented for every `Fn(&T, &mut ValidationContext) -> Result<(), RuleFailure>`
/// closure; implement it directly for reusable, stateful checks.
/// The trait is `Send + Sync` so rule sets can be shared across batch workers.
pub trait RuleCheck<T: ?Sized>: Send + Sync {
    fn check(&self, input: &T, ctx: &mut ValidationContext) -> Result<(), RuleFailure>;
}

impl<T: ?Sized, F> RuleCheck<T> for F
where
    F: Fn(&T, &mut ValidationContext) -> Result<(), RuleFailure> + Send + Sync,
{
    fn check(&self, input: &T, ctx: &mut ValidationContext) -> Result<(), RuleFailure> {
        self(input, ctx)
    }
}

pub type CheckFn<T> = Arc<dyn RuleCheck<T>>;
pub type PredicateFn<T> = Arc<dyn Fn(&T, &ValidationContext) -> bool + Send + Sync>;
pub type TimePredicateFn<T> = Arc<dyn Fn(&T, DateTime<Utc>, &ValidationContext) -> bool + Send + Sync>;

/// Case table of a switch rule, with the key type erased
pub trait SwitchCases<T>: Send + Sync {
    /// The sub-rule for this input: exact key match, else the default
    fn select(&self, input: &T) -> Option<&Rule<T>>;

    fn case_count(&self) -> usize;

    fn has_default(&self) -> bool;
}

struct KeyedCases<T, K, F> {
    selector: F,
    cases: HashMap<K, Rule<T>>,
    default: Option<Rule<T>>,
}

impl<T, K, F> SwitchCases<T> for KeyedCases<T, K, F>
where
    K: Eq + Hash + Send + Sync,
    F: Fn(&T) -> K + Send + Sync,
{
    fn select(&self, input: &T) -> Option<&Rule<T>> {
        let key = (self.selector)(input);
        self.cases.get(&key).or(self.default.as_ref())
    }

    fn case_count(&self) -> usize {
        self.cases.len()
    }

    fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Where a time-based rule takes its evaluation time from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeSource {
    /// Wall clock at evaluation
    #[default]
    Now,
    /// `ValidationContext::evaluation_time`; the rule fails when it is absent
    Supplied,
}

/// Discriminant of [`RuleVariant`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Action,
    Conditional,
    Switch,
    Dependent,
    TimeBased,
    EventTrigger,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Action => "action",
            RuleKind::Conditional => "conditional",
            RuleKind::Switch => "switch",
            RuleKind::Dependent => "dependent",
            RuleKind::TimeBased => "time_based",
            RuleKind::EventTrigger => "event_trigger",
        }
    }
}

/// Evaluation payload of a rule
pub enum RuleVariant<T> {
    Action {
        check: CheckFn<T>,
    },
    Conditional {
        condition: PredicateFn<T>,
        then_rule: Option<Box<Rule<T>>>,
        else_rule: Option<Box<Rule<T>>>,
    },
    Switch {
        cases: Arc<dyn SwitchCases<T>>,
    },
    /// Only the scheduler resolves `dependencies`; they are ids, not handles.
    Dependent {
        dependencies: Vec<RuleId>,
        policy: DependencyPolicy,
        check: CheckFn<T>,
    },
    TimeBased {
        predicate: TimePredicateFn<T>,
        source: TimeSource,
    },
    /// Fires `event` on the context's hub and always succeeds.
    EventTrigger {
        event: String,
    },
}

impl<T> Clone for RuleVariant<T> {
    fn clone(&self) -> Self {
        match self {
            RuleVariant::Action { check } => RuleVariant::Action {
                check: Arc::clone(check),
            },
            RuleVariant::Conditional {
                condition,
                then_rule,
                else_rule,
            } => RuleVariant::Conditional {
                condition: Arc::clone(condition),
                then_rule: then_rule.clone(),
                else_rule: else_rule.clone(),
            },
            RuleVariant::Switch { cases } => RuleVariant::Switch {
                cases: Arc::clone(cases),
            },
            RuleVariant::Dependent {
                dependencies,
                policy,
                check,
            } => RuleVariant::Dependent {
                dependencies: dependencies.clone(),
                policy: *policy,
                check: Arc::clone(check),
            },
            RuleVariant::TimeBased { predicate, source } => RuleVariant::TimeBased {
                predicate: Arc::clone(predicate),
                source: *source,
            },
            RuleVariant::EventTrigger { event } => RuleVariant::EventTrigger {
                event: event.clone(),
            },
        }
    }
}

impl<T> fmt::Debug for RuleVariant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleVariant::Action { .. } => f.write_str("Action"),
            RuleVariant::Conditional {
                then_rule,
                else_rule,
                ..
            } => f
                .debug_struct("Conditional")
                .field("then_rule", &then_rule.as_ref().map(|r| r.id()))
                .field("else_rule", &else_rule.as_ref().map(|r| r.id()))
                .finish(),
            RuleVariant::Switch { cases } => f
                .debug_struct("Switch")
                .field("cases", &cases.case_count())
                .field("has_default", &cases.has_default())
                .finish(),
            RuleVariant::Dependent {
                dependencies,
                policy,
                ..
            } => f
                .debug_struct("Dependent")
                .field("dependencies", dependencies)
                .field("policy", policy)
                .finish(),
            RuleVariant::TimeBased { source, .. } => f
                .debug_struct("TimeBased")
                .field("source", source)
                .finish(),
            RuleVariant::EventTrigger { event } => f
                .debug_struct("EventTrigger")
                .field("event", event)
                .finish(),
        }
    }
}

/// A named, prioritized unit of validation logic
pub struct Rule<T> {
    id: RuleId,
    internal_id: u64,
    name: Option<String>,
    description: Option<String>,
    type_id: Option<u32>,
    priority: i32,
    severity: Severity,
    active: bool,
    variant: RuleVariant<T>,
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            internal_id: self.internal_id,
            name: self.name.clone(),
            description: self.description.clone(),
            type_id: self.type_id,
            priority: self.priority,
            severity: self.severity,
            active: self.active,
            variant: self.variant.clone(),
        }
    }
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("internal_id", &self.internal_id)
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("priority", &self.priority)
            .field("severity", &self.severity)
            .field("active", &self.active)
            .field("variant", &self.variant)
            .finish()
    }
}

impl<T> Rule<T> {
    fn with_variant(id: RuleId, variant: RuleVariant<T>) -> Self {
        Self {
            id,
            internal_id: NEXT_INTERNAL_ID.fetch_add(1, Ordering::Relaxed),
            name: None,
            description: None,
            type_id: None,
            priority: 0,
            severity: Severity::Error,
            active: true,
            variant,
        }
    }

    /// A rule that runs `check` against the input
    pub fn action<F>(id: RuleId, check: F) -> Self
    where
        F: Fn(&T, &mut ValidationContext) -> Result<(), RuleFailure> + Send + Sync + 'static,
    {
        Self::with_variant(
            id,
            RuleVariant::Action {
                check: Arc::new(check),
            },
        )
    }

    /// An action rule backed by a [`RuleCheck`] implementation
    pub fn from_check<C>(id: RuleId, check: C) -> Self
    where
        C: RuleCheck<T> + 'static,
    {
        Self::with_variant(
            id,
            RuleVariant::Action {
                check: Arc::new(check),
            },
        )
    }

    /// A rule delegating to `then_rule` or `else_rule` depending on `condition`
    ///
    /// A missing branch succeeds vacuously.
    pub fn conditional<P>(
        id: RuleId,
        condition: P,
        then_rule: Option<Rule<T>>,
        else_rule: Option<Rule<T>>,
    ) -> Self
    where
        P: Fn(&T, &ValidationContext) -> bool + Send + Sync + 'static,
    {
        Self::with_variant(
            id,
            RuleVariant::Conditional {
                condition: Arc::new(condition),
                then_rule: then_rule.map(Box::new),
                else_rule: else_rule.map(Box::new),
            },
        )
    }

    /// A rule delegating to the case whose key equals `selector(input)`
    ///
    /// Falls back to `default`; succeeds vacuously when neither applies.
    pub fn switch<K, F>(
        id: RuleId,
        selector: F,
        cases: impl IntoIterator<Item = (K, Rule<T>)>,
        default: Option<Rule<T>>,
    ) -> Self
    where
        T: 'static,
        K: Eq + Hash + Send + Sync + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let cases = KeyedCases {
            selector,
            cases: cases.into_iter().collect(),
            default,
        };
        Self::with_variant(
            id,
            RuleVariant::Switch {
                cases: Arc::new(cases),
            },
        )
    }

    /// A rule whose execution depends on the outcomes of `dependencies`
    ///
    /// Duplicate ids collapse to their first occurrence. The default policy
    /// is [`DependencyPolicy::RequiresAllSuccess`].
    pub fn dependent<F>(id: RuleId, dependencies: impl IntoIterator<Item = RuleId>, check: F) -> Self
    where
        F: Fn(&T, &mut ValidationContext) -> Result<(), RuleFailure> + Send + Sync + 'static,
    {
        let mut deps: Vec<RuleId> = Vec::new();
        for dep in dependencies {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        Self::with_variant(
            id,
            RuleVariant::Dependent {
                dependencies: deps,
                policy: DependencyPolicy::default(),
                check: Arc::new(check),
            },
        )
    }

    /// A rule evaluating `predicate` at a point in time taken from `source`
    pub fn time_based<P>(id: RuleId, source: TimeSource, predicate: P) -> Self
    where
        P: Fn(&T, DateTime<Utc>, &ValidationContext) -> bool + Send + Sync + 'static,
    {
        Self::with_variant(
            id,
            RuleVariant::TimeBased {
                predicate: Arc::new(predicate),
                source,
            },
        )
    }

    /// A rule that triggers `event` on the context's [`EventHub`]
    ///
    /// Defaults to `Information` severity.
    ///
    /// [`EventHub`]: super::events::EventHub
    pub fn event_trigger(id: RuleId, event: impl Into<String>) -> Self {
        Self::with_variant(
            id,
            RuleVariant::EventTrigger {
                event: event.into(),
            },
        )
        .with_severity(Severity::Information)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, type_id: u32) -> Self {
        self.type_id = Some(type_id);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Sets the dependency policy; no effect on non-dependent rules
    pub fn with_policy(mut self, new_policy: DependencyPolicy) -> Self {
        if let RuleVariant::Dependent { policy, .. } = &mut self.variant {
            *policy = new_policy;
        }
        self
    }

    /// Adds a dependency; no effect on non-dependent rules
    pub fn depends_on(mut self, dependency: RuleId) -> Self {
        if let RuleVariant::Dependent { dependencies, .. } = &mut self.variant
            && !dependencies.contains(&dependency)
        {
            dependencies.push(dependency);
        }
        self
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn internal_id(&self) -> u64 {
        self.internal_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Name if set, otherwise the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn type_id(&self) -> Option<u32> {
        self.type_id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn variant(&self) -> &RuleVariant<T> {
        &self.variant
    }

    pub fn kind(&self) -> RuleKind {
        match self.variant {
            RuleVariant::Action { .. } => RuleKind::Action,
            RuleVariant::Conditional { .. } => RuleKind::Conditional,
            RuleVariant::Switch { .. } => RuleKind::Switch,
            RuleVariant::Dependent { .. } => RuleKind::Dependent,
            RuleVariant::TimeBased { .. } => RuleKind::TimeBased,
            RuleVariant::EventTrigger { .. } => RuleKind::EventTrigger,
        }
    }

    /// Declared dependency ids; empty unless this is a dependent rule
    pub fn dependencies(&self) -> &[RuleId] {
        match &self.variant {
            RuleVariant::Dependent { dependencies, .. } => dependencies,
            _ => &[],
        }
    }

    pub fn policy(&self) -> Option<DependencyPolicy> {
        match &self.variant {
            RuleVariant::Dependent { policy, .. } => Some(*policy),
            _ => None,
        }
    }

    /// Runs this rule's own check against `input`
    ///
    /// Dependency policies are not applied here; a dependent rule simply runs
    /// its embedded check. Inactive rules succeed without running.
    pub fn evaluate(&self, input: &T, ctx: &mut ValidationContext) -> Result<(), RuleFailure> {
        if !self.active {
            return Ok(());
        }

        match &self.variant {
            RuleVariant::Action { check } | RuleVariant::Dependent { check, .. } => {
                check.check(input, ctx)
            }
            RuleVariant::Conditional {
                condition,
                then_rule,
                else_rule,
            } => {
                let branch = if condition(input, &*ctx) {
                    then_rule
                } else {
                    else_rule
                };
                match branch {
                    Some(rule) => rule.evaluate(input, ctx),
                    None => Ok(()),
                }
            }
            RuleVariant::Switch { cases } => match cases.select(input) {
                Some(rule) => rule.evaluate(input, ctx),
                None => Ok(()),
            },
            RuleVariant::TimeBased { predicate, source } => {
                let time = match source {
                    TimeSource::Now => Utc::now(),
                    TimeSource::Supplied => ctx.evaluation_time().ok_or_else(|| {
                        RuleFailure::new(format!(
                            "time-based rule '{}' requires an evaluation time in the context",
                            self.display_name()
                        ))
                        .with_code("EVALUATION_TIME_MISSING")
                    })?,
                };

                if predicate(input, time, &*ctx) {
                    Ok(())
                } else {
                    Err(RuleFailure::new(format!(
                        "time-based rule '{}' not satisfied at {}",
                        self.display_name(),
                        time.to_rfc3339()
                    )))
                }
            }
            RuleVariant::EventTrigger { event } => {
                ctx.events().trigger(event);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct Order {
        kind: &'static str,
        total: u32,
    }

    fn id(s: &str) -> RuleId {
        RuleId::new(s).unwrap()
    }

    fn min_total(limit: u32) -> Rule<Order> {
        Rule::action(id(&format!("min-total-{limit}")), move |o: &Order, _| {
            if o.total >= limit {
                Ok(())
            } else {
                Err(format!("total below {limit}").into())
            }
        })
    }

    #[test]
    fn test_action_rule() {
        let rule = min_total(10);
        let mut ctx = ValidationContext::new();

        assert!(rule.evaluate(&Order { kind: "a", total: 12 }, &mut ctx).is_ok());
        let failure = rule
            .evaluate(&Order { kind: "a", total: 5 }, &mut ctx)
            .unwrap_err();
        assert_eq!(failure.message, "total below 10");
    }

    #[test]
    fn test_defaults() {
        let rule = min_total(1);
        assert_eq!(rule.priority(), 0);
        assert_eq!(rule.severity(), Severity::Error);
        assert!(rule.is_active());
        assert_eq!(rule.kind(), RuleKind::Action);
        assert!(rule.dependencies().is_empty());
        assert!(rule.policy().is_none());
        assert_eq!(rule.display_name(), "min-total-1");
    }

    #[test]
    fn test_internal_ids_are_unique_and_survive_clone() {
        let a = min_total(1);
        let b = min_total(1);
        assert_ne!(a.internal_id(), b.internal_id());
        assert_eq!(a.clone().internal_id(), a.internal_id());
    }

    #[test]
    fn test_check_can_write_context() {
        let rule = Rule::action(id("remember"), |o: &Order, ctx: &mut ValidationContext| {
            ctx.set("seen_total", o.total);
            Ok(())
        });
        let mut ctx = ValidationContext::new();
        rule.evaluate(&Order { kind: "a", total: 7 }, &mut ctx).unwrap();
        assert_eq!(ctx.get_typed::<u32>("seen_total"), Some(7));
    }

    #[test]
    fn test_from_check_struct() {
        struct NonEmptyKind;
        impl RuleCheck<Order> for NonEmptyKind {
            fn check(&self, input: &Order, _ctx: &mut ValidationContext) -> Result<(), RuleFailure> {
                if input.kind.is_empty() {
                    Err(RuleFailure::new("kind required").with_code("KIND"))
                } else {
                    Ok(())
                }
            }
        }

        let rule = Rule::from_check(id("kind"), NonEmptyKind);
        let mut ctx = ValidationContext::new();
        let failure = rule
            .evaluate(&Order { kind: "", total: 0 }, &mut ctx)
            .unwrap_err();
        assert_eq!(failure.code.as_deref(), Some("KIND"));
    }

    #[test]
    fn test_conditional_branches() {
        let rule = Rule::conditional(
            id("cond"),
            |o: &Order, _| o.kind == "bulk",
            Some(min_total(100)),
            Some(min_total(1)),
        );
        let mut ctx = ValidationContext::new();

        assert!(rule.evaluate(&Order { kind: "bulk", total: 50 }, &mut ctx).is_err());
        assert!(rule.evaluate(&Order { kind: "retail", total: 50 }, &mut ctx).is_ok());
        assert!(rule.evaluate(&Order { kind: "retail", total: 0 }, &mut ctx).is_err());
    }

    #[test]
    fn test_conditional_missing_branch_is_vacuous() {
        let rule = Rule::conditional(id("cond"), |_: &Order, _| false, Some(min_total(100)), None);
        let mut ctx = ValidationContext::new();
        assert!(rule.evaluate(&Order { kind: "x", total: 0 }, &mut ctx).is_ok());
    }

    #[test]
    fn test_switch_cases_and_default() {
        let rule = Rule::switch(
            id("by-kind"),
            |o: &Order| o.kind,
            vec![("bulk", min_total(100)), ("retail", min_total(1))],
            Some(min_total(10)),
        );
        let mut ctx = ValidationContext::new();

        assert!(rule.evaluate(&Order { kind: "bulk", total: 99 }, &mut ctx).is_err());
        assert!(rule.evaluate(&Order { kind: "retail", total: 1 }, &mut ctx).is_ok());
        // Falls back to the default case
        assert!(rule.evaluate(&Order { kind: "other", total: 9 }, &mut ctx).is_err());
        assert!(rule.evaluate(&Order { kind: "other", total: 10 }, &mut ctx).is_ok());
    }

    #[test]
    fn test_switch_without_match_or_default_is_vacuous() {
        let rule = Rule::switch(
            id("by-total"),
            |o: &Order| o.total,
            vec![(1u32, min_total(5))],
            None,
        );
        let mut ctx = ValidationContext::new();
        assert!(rule.evaluate(&Order { kind: "x", total: 2 }, &mut ctx).is_ok());
        assert!(rule.evaluate(&Order { kind: "x", total: 1 }, &mut ctx).is_err());
    }

    #[test]
    fn test_dependent_dedups_and_policy() {
        let rule = Rule::dependent(
            id("email"),
            vec![id("username"), id("username"), id("domain")],
            |_: &Order, _| Ok(()),
        )
        .depends_on(id("domain"))
        .depends_on(id("tld"))
        .with_policy(DependencyPolicy::RequiresAnyFailure);

        assert_eq!(rule.kind(), RuleKind::Dependent);
        assert_eq!(rule.dependencies(), &[id("username"), id("domain"), id("tld")]);
        assert_eq!(rule.policy(), Some(DependencyPolicy::RequiresAnyFailure));
    }

    #[test]
    fn test_policy_ignored_on_other_variants() {
        let rule = min_total(1)
            .with_policy(DependencyPolicy::RequiresAnySuccess)
            .depends_on(id("x"));
        assert!(rule.policy().is_none());
        assert!(rule.dependencies().is_empty());
    }

    #[test]
    fn test_time_based_uses_supplied_time() {
        let captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        let rule = Rule::time_based(id("window"), TimeSource::Supplied, move |_: &Order, t, _| {
            *sink.lock().unwrap() = Some(t);
            true
        });

        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ctx = ValidationContext::at(expected);
        rule.evaluate(&Order { kind: "x", total: 0 }, &mut ctx).unwrap();
        assert_eq!(*captured.lock().unwrap(), Some(expected));
    }

    #[test]
    fn test_time_based_missing_time_fails() {
        let rule = Rule::time_based(id("window"), TimeSource::Supplied, |_: &Order, _, _| true)
            .with_name("Business hours");
        let mut ctx = ValidationContext::new();

        let failure = rule
            .evaluate(&Order { kind: "x", total: 0 }, &mut ctx)
            .unwrap_err();
        assert!(failure.message.contains("Business hours"));
        assert!(failure.message.contains("requires an evaluation time"));
        assert_eq!(failure.code.as_deref(), Some("EVALUATION_TIME_MISSING"));
    }

    #[test]
    fn test_time_based_uses_wall_clock() {
        let before = Utc::now();
        let rule = Rule::time_based(id("recent"), TimeSource::Now, move |_: &Order, t, _| t >= before);
        let mut ctx = ValidationContext::new();
        assert!(rule.evaluate(&Order { kind: "x", total: 0 }, &mut ctx).is_ok());
    }

    #[test]
    fn test_time_based_unsatisfied_message() {
        let time = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let rule = Rule::time_based(id("never"), TimeSource::Supplied, |_: &Order, _, _| false);
        let mut ctx = ValidationContext::at(time);

        let failure = rule
            .evaluate(&Order { kind: "x", total: 0 }, &mut ctx)
            .unwrap_err();
        assert!(failure.message.contains("not satisfied at 2024-06-01T12:00:00"));
    }

    #[test]
    fn test_inactive_rule_succeeds() {
        let rule = min_total(100).with_active(false);
        let mut ctx = ValidationContext::new();
        assert!(rule.evaluate(&Order { kind: "x", total: 0 }, &mut ctx).is_ok());
    }

    #[test]
    fn test_event_trigger_rule() {
        let fired = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&fired);
        let hub = crate::rules::EventHub::new().on("order.checked", move || {
            *counter.lock().unwrap() += 1;
        });
        let mut ctx = ValidationContext::new().with_events(hub);

        let rule = Rule::event_trigger(id("notify"), "order.checked");
        assert_eq!(rule.kind(), RuleKind::EventTrigger);
        assert_eq!(rule.severity(), Severity::Information);

        assert!(rule.evaluate(&Order { kind: "a", total: 1 }, &mut ctx).is_ok());
        assert!(rule.evaluate(&Order { kind: "b", total: 2 }, &mut ctx).is_ok());
        assert_eq!(*fired.lock().unwrap(), 2);
    }

    #[test]
    fn test_event_trigger_without_handlers_succeeds() {
        let rule = Rule::event_trigger(id("notify"), "unheard");
        let mut ctx = ValidationContext::new();
        assert!(rule.evaluate(&Order { kind: "a", total: 1 }, &mut ctx).is_ok());
    }

    #[test]
    fn test_failure_into_error() {
        let error = RuleFailure::from("bad")
            .with_code("E1")
            .into_error(&id("r"), Severity::Warning);
        assert_eq!(error.message, "bad");
        assert_eq!(error.severity, Severity::Warning);
        assert_eq!(error.code.as_deref(), Some("E1"));
        assert_eq!(error.rule_id, Some(id("r")));
    }

    #[test]
    fn test_rule_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Rule<Order>>();
        assert_sync::<Rule<Order>>();
    }
}
