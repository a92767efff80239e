#![forbid(unsafe_code)]

//! Per-call validation context
//!
//! A fresh [`ValidationContext`] is threaded explicitly through every rule
//! invocation of one validation call. Rules use it to share values and to
//! inspect the pass/fail status of rules that already ran in the same call.
//! The context also carries the [`EventHub`] that event-trigger rules fire.

use super::events::EventHub;
use crate::types::RuleId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// Outcome of a rule that has been evaluated in the current call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleExecutionResult {
    pub success: bool,
}

/// Values and rule outcomes visible to rules during one validation call
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    properties: HashMap<String, serde_json::Value>,
    rule_results: HashMap<RuleId, RuleExecutionResult>,
    evaluation_time: Option<DateTime<Utc>>,
    events: EventHub,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying a supplied evaluation time for time-based rules
    pub fn at(evaluation_time: DateTime<Utc>) -> Self {
        Self {
            evaluation_time: Some(evaluation_time),
            ..Self::default()
        }
    }

    /// Replaces the event hub used by event-trigger rules
    pub fn with_events(mut self, events: EventHub) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventHub {
        &mut self.events
    }

    pub fn evaluation_time(&self) -> Option<DateTime<Utc>> {
        self.evaluation_time
    }

    pub fn set_evaluation_time(&mut self, time: Option<DateTime<Utc>>) {
        self.evaluation_time = time;
    }

    /// Stores a property, replacing any previous value under `key`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Serializes `value` and stores it under `key`
    pub fn set_typed<V: Serialize>(&mut self, key: impl Into<String>, value: &V) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.properties.insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Reads a property back into a typed value
    ///
    /// Returns `None` when the key is absent or the stored value does not
    /// deserialize as `V`.
    pub fn get_typed<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.properties
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.properties.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Outcome of a rule evaluated earlier in this call, if any
    pub fn rule_result(&self, rule_id: &RuleId) -> Option<RuleExecutionResult> {
        self.rule_results.get(rule_id).copied()
    }

    /// True if the rule already ran in this call and succeeded
    pub fn rule_succeeded(&self, rule_id: &RuleId) -> bool {
        self.rule_result(rule_id).is_some_and(|r| r.success)
    }

    pub fn rule_results(&self) -> &HashMap<RuleId, RuleExecutionResult> {
        &self.rule_results
    }

    pub(crate) fn record_rule_result(&mut self, rule_id: RuleId, success: bool) {
        self.rule_results
            .insert(rule_id, RuleExecutionResult { success });
    }

    /// Forgets all rule outcomes; properties and evaluation time are kept
    pub(crate) fn reset_rule_results(&mut self) {
        self.rule_results.clear();
    }

    /// Clears properties, rule outcomes and the evaluation time
    ///
    /// Event handlers are kept; use [`EventHub::clear`] to drop them.
    pub fn clear(&mut self) {
        self.properties.clear();
        self.rule_results.clear();
        self.evaluation_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Limits {
        max_items: u32,
    }

    #[test]
    fn test_properties_roundtrip() {
        let mut ctx = ValidationContext::new();
        ctx.set("country", "CZ");
        ctx.set("retries", 3);

        assert_eq!(ctx.get("country"), Some(&serde_json::json!("CZ")));
        assert_eq!(ctx.get_typed::<u32>("retries"), Some(3));
        assert_eq!(ctx.get_typed::<String>("retries"), None);
        assert!(ctx.get("missing").is_none());
    }

    #[test]
    fn test_typed_properties() {
        let mut ctx = ValidationContext::new();
        ctx.set_typed("limits", &Limits { max_items: 10 }).unwrap();

        assert_eq!(ctx.get_typed::<Limits>("limits"), Some(Limits { max_items: 10 }));
        assert!(ctx.contains("limits"));
        assert!(ctx.remove("limits").is_some());
        assert!(!ctx.contains("limits"));
    }

    #[test]
    fn test_rule_results() {
        let mut ctx = ValidationContext::new();
        let id = RuleId::new("username").unwrap();

        assert!(ctx.rule_result(&id).is_none());
        assert!(!ctx.rule_succeeded(&id));

        ctx.record_rule_result(id.clone(), true);
        assert!(ctx.rule_succeeded(&id));

        ctx.record_rule_result(id.clone(), false);
        assert_eq!(ctx.rule_result(&id), Some(RuleExecutionResult { success: false }));
    }

    #[test]
    fn test_reset_keeps_properties_and_time() {
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ctx = ValidationContext::at(time);
        ctx.set("k", true);
        ctx.record_rule_result(RuleId::new("r").unwrap(), true);

        ctx.reset_rule_results();
        assert!(ctx.rule_results().is_empty());
        assert!(ctx.contains("k"));
        assert_eq!(ctx.evaluation_time(), Some(time));

        ctx.clear();
        assert!(!ctx.contains("k"));
        assert!(ctx.evaluation_time().is_none());
    }

    #[test]
    fn test_clear_keeps_event_handlers() {
        let mut ctx = ValidationContext::new().with_events(EventHub::new().on("saved", || {}));
        ctx.set("k", 1);

        ctx.clear();
        assert_eq!(ctx.events().handler_count("saved"), 1);

        ctx.events_mut().clear();
        assert!(ctx.events().is_empty());
    }
}
