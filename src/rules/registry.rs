#![forbid(unsafe_code)]

//! Rule registry for storing and querying rules
//!
//! The RuleRegistry is responsible for:
//! - Storing rules keyed by their unique RuleId
//! - Keeping secondary indices (internal id, name, type, priority, active flag)
//!   in step with every register/unregister
//! - Storing rule types and rule groups
//! - Applying configuration overrides
//!
//! It has no scheduling semantics; see
//! [`DependencyAwareValidator::from_registry`](crate::engine::DependencyAwareValidator::from_registry).

use crate::config::ruleflow_toml::{RuleValue, RulesConfig};
use crate::error::RuleError;
use crate::rules::Rule;
use crate::types::{RuleGroup, RuleId, RuleType};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

struct Entry<T> {
    rule: Rule<T>,
    seq: u64,
}

/// Registry for storing and managing all rules
///
/// Secondary indices hold ids only; the rule itself lives once, in the
/// primary map. Buckets keep registration order so that priority ties are
/// stable.
pub struct RuleRegistry<T> {
    rules: HashMap<RuleId, Entry<T>>,
    by_internal_id: HashMap<u64, RuleId>,
    by_name: HashMap<String, Vec<RuleId>>,
    by_type: HashMap<u32, Vec<RuleId>>,
    by_priority: BTreeMap<Reverse<i32>, Vec<RuleId>>,
    active: Vec<RuleId>,
    inactive: Vec<RuleId>,
    next_seq: u64,

    rule_types: HashMap<u32, RuleType>,
    rule_type_codes: HashMap<String, u32>,

    groups: HashMap<String, RuleGroup>,
}

impl<T> RuleRegistry<T> {
    /// Create a new empty RuleRegistry
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            by_internal_id: HashMap::new(),
            by_name: HashMap::new(),
            by_type: HashMap::new(),
            by_priority: BTreeMap::new(),
            active: Vec::new(),
            inactive: Vec::new(),
            next_seq: 0,
            rule_types: HashMap::new(),
            rule_type_codes: HashMap::new(),
            groups: HashMap::new(),
        }
    }

    /// Create a registry pre-populated with `rules`
    ///
    /// Rules whose id is already taken are skipped.
    pub fn with_rules(rules: impl IntoIterator<Item = Rule<T>>) -> Self {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule);
        }
        registry
    }

    /// Register a rule
    ///
    /// Returns `false` without touching any index if a rule with the same id
    /// is already registered.
    pub fn register(&mut self, rule: Rule<T>) -> bool {
        if self.rules.contains_key(rule.id()) {
            tracing::warn!(rule = %rule.id(), "rule already registered, ignoring");
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.insert(rule, seq);
        true
    }

    /// Indexes `rule` at registration position `seq`
    fn insert(&mut self, rule: Rule<T>, seq: u64) {
        let id = rule.id().clone();
        let rules = &self.rules;

        self.by_internal_id.insert(rule.internal_id(), id.clone());

        if let Some(name) = rule.name().filter(|n| !n.is_empty()) {
            let bucket = self.by_name.entry(name.to_string()).or_default();
            insert_by_seq(bucket, &id, seq, rules);
        }

        if let Some(type_id) = rule.type_id() {
            insert_by_seq(self.by_type.entry(type_id).or_default(), &id, seq, rules);
        }

        let bucket = self.by_priority.entry(Reverse(rule.priority())).or_default();
        insert_by_seq(bucket, &id, seq, rules);

        if rule.is_active() {
            insert_by_seq(&mut self.active, &id, seq, rules);
        } else {
            insert_by_seq(&mut self.inactive, &id, seq, rules);
        }

        self.rules.insert(id, Entry { rule, seq });
    }

    /// Unregister a rule by id
    ///
    /// Returns `false` if no such rule exists. Index buckets left empty are
    /// removed.
    pub fn unregister(&mut self, id: &RuleId) -> bool {
        let Some(entry) = self.rules.remove(id) else {
            return false;
        };
        let rule = entry.rule;

        self.by_internal_id.remove(&rule.internal_id());

        if let Some(name) = rule.name().filter(|n| !n.is_empty()) {
            remove_from_bucket(&mut self.by_name, name, id);
        }

        if let Some(type_id) = rule.type_id() {
            remove_from_bucket(&mut self.by_type, &type_id, id);
        }

        let priority_key = Reverse(rule.priority());
        if let Some(bucket) = self.by_priority.get_mut(&priority_key) {
            bucket.retain(|existing| existing != id);
            if bucket.is_empty() {
                self.by_priority.remove(&priority_key);
            }
        }

        if rule.is_active() {
            self.active.retain(|existing| existing != id);
        } else {
            self.inactive.retain(|existing| existing != id);
        }

        true
    }

    /// Replace a registered rule with a new version of the same id
    ///
    /// Returns `false` if no rule with that id was registered. The new
    /// version keeps the registration position of the old one, in
    /// [`all_rules`](Self::all_rules) and in every index bucket.
    pub fn update(&mut self, rule: Rule<T>) -> bool {
        let Some(seq) = self.rules.get(rule.id()).map(|entry| entry.seq) else {
            return false;
        };

        self.unregister(rule.id());
        self.insert(rule, seq);
        true
    }

    /// Get a rule by its ID
    ///
    /// Returns `None` if the rule is not found in the registry.
    pub fn get(&self, id: &RuleId) -> Option<&Rule<T>> {
        self.rules.get(id).map(|entry| &entry.rule)
    }

    pub fn contains(&self, id: &RuleId) -> bool {
        self.rules.contains_key(id)
    }

    pub fn get_by_internal_id(&self, internal_id: u64) -> Option<&Rule<T>> {
        self.by_internal_id
            .get(&internal_id)
            .and_then(|id| self.get(id))
    }

    pub fn rules_by_name(&self, name: &str) -> Vec<&Rule<T>> {
        self.resolve(self.by_name.get(name))
    }

    pub fn rules_by_type(&self, type_id: u32) -> Vec<&Rule<T>> {
        self.resolve(self.by_type.get(&type_id))
    }

    pub fn rules_by_priority(&self, priority: i32) -> Vec<&Rule<T>> {
        self.resolve(self.by_priority.get(&Reverse(priority)))
    }

    /// All rules, highest priority first, ties in registration order
    pub fn rules_by_priority_order(&self) -> Vec<&Rule<T>> {
        self.by_priority
            .values()
            .flatten()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn rules_by_active_status(&self, active: bool) -> Vec<&Rule<T>> {
        let ids = if active { &self.active } else { &self.inactive };
        self.resolve(Some(ids))
    }

    pub fn active_rules(&self) -> Vec<&Rule<T>> {
        self.rules_by_active_status(true)
    }

    /// Active rules, highest priority first, ties in registration order
    pub fn active_rules_by_priority_order(&self) -> Vec<&Rule<T>> {
        self.rules_by_priority_order()
            .into_iter()
            .filter(|rule| rule.is_active())
            .collect()
    }

    /// Rules matching `predicate`, in registration order
    pub fn rules_matching(&self, predicate: impl Fn(&Rule<T>) -> bool) -> Vec<&Rule<T>> {
        self.all_rules()
            .into_iter()
            .filter(|rule| predicate(rule))
            .collect()
    }

    /// All rules in registration order
    pub fn all_rules(&self) -> Vec<&Rule<T>> {
        let mut entries: Vec<&Entry<T>> = self.rules.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| &entry.rule).collect()
    }

    /// Iterate over all rules in arbitrary order
    pub fn iter_rules(&self) -> impl Iterator<Item = &Rule<T>> {
        self.rules.values().map(|entry| &entry.rule)
    }

    /// Get the number of rules in the registry
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Remove every rule, rule type and group
    pub fn clear(&mut self) {
        self.rules.clear();
        self.by_internal_id.clear();
        self.by_name.clear();
        self.by_type.clear();
        self.by_priority.clear();
        self.active.clear();
        self.inactive.clear();
        self.rule_types.clear();
        self.rule_type_codes.clear();
        self.groups.clear();
    }

    /// Register a rule type
    ///
    /// Returns `false` if the id or the code is already taken.
    pub fn register_rule_type(&mut self, rule_type: RuleType) -> bool {
        if self.rule_types.contains_key(&rule_type.id)
            || self.rule_type_codes.contains_key(&rule_type.code)
        {
            return false;
        }
        self.rule_type_codes
            .insert(rule_type.code.clone(), rule_type.id);
        self.rule_types.insert(rule_type.id, rule_type);
        true
    }

    /// Unregister a rule type
    ///
    /// # Errors
    ///
    /// Returns `RuleError::TypeInUse` while any registered rule still has
    /// this type.
    pub fn unregister_rule_type(&mut self, type_id: u32) -> Result<bool, RuleError> {
        if !self.rule_types.contains_key(&type_id) {
            return Ok(false);
        }

        let in_use = self.by_type.get(&type_id).map_or(0, Vec::len);
        if in_use > 0 {
            tracing::warn!(type_id, rules = in_use, "refusing to remove rule type in use");
            return Err(RuleError::TypeInUse {
                type_id,
                rules: in_use,
            });
        }

        if let Some(rule_type) = self.rule_types.remove(&type_id) {
            self.rule_type_codes.remove(&rule_type.code);
        }
        Ok(true)
    }

    pub fn rule_type(&self, type_id: u32) -> Option<&RuleType> {
        self.rule_types.get(&type_id)
    }

    pub fn rule_type_by_code(&self, code: &str) -> Option<&RuleType> {
        self.rule_type_codes
            .get(code)
            .and_then(|id| self.rule_types.get(id))
    }

    /// All rule types, ordered by id
    pub fn rule_types(&self) -> Vec<&RuleType> {
        let mut types: Vec<&RuleType> = self.rule_types.values().collect();
        types.sort_by_key(|t| t.id);
        types
    }

    /// Register a rule group; returns `false` if the group id is taken
    pub fn register_group(&mut self, group: RuleGroup) -> bool {
        if self.groups.contains_key(&group.id) {
            return false;
        }
        self.groups.insert(group.id.clone(), group);
        true
    }

    pub fn unregister_group(&mut self, group_id: &str) -> bool {
        self.groups.remove(group_id).is_some()
    }

    pub fn group(&self, group_id: &str) -> Option<&RuleGroup> {
        self.groups.get(group_id)
    }

    /// All groups, ordered by id
    pub fn groups(&self) -> Vec<&RuleGroup> {
        let mut groups: Vec<&RuleGroup> = self.groups.values().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        groups
    }

    /// Registered members of a group, in group order
    ///
    /// Member ids that are not registered are skipped; an unknown group
    /// yields an empty list.
    pub fn rules_in_group(&self, group_id: &str) -> Vec<&Rule<T>> {
        self.resolve(self.groups.get(group_id).map(|g| &g.rule_ids))
    }

    /// Apply per-rule configuration overrides
    ///
    /// Rules disabled in the configuration are unregistered. Settings tables
    /// override severity, priority and the active flag. Configured ids that
    /// are not registered are ignored.
    pub fn apply_config(&mut self, config: &RulesConfig) {
        let mut removed = 0usize;
        let mut updated = 0usize;

        for (rule_id, value) in config {
            let Some(current) = self.get(rule_id) else {
                continue;
            };

            match value {
                RuleValue::Enabled(true) => {}
                RuleValue::Enabled(false) => {
                    self.unregister(rule_id);
                    removed += 1;
                }
                RuleValue::Settings(settings) => {
                    let mut rule = current.clone();
                    if let Some(severity) = settings.severity {
                        rule = rule.with_severity(severity);
                    }
                    if let Some(priority) = settings.priority {
                        rule = rule.with_priority(priority);
                    }
                    if let Some(active) = settings.active {
                        rule = rule.with_active(active);
                    }
                    self.update(rule);
                    updated += 1;
                }
            }
        }

        tracing::info!(removed, updated, "applied rule configuration");
    }

    fn resolve(&self, ids: Option<&Vec<RuleId>>) -> Vec<&Rule<T>> {
        ids.map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }
}

impl<T> Default for RuleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Inserts `id` into `bucket`, keeping the bucket in registration order
fn insert_by_seq<T>(
    bucket: &mut Vec<RuleId>,
    id: &RuleId,
    seq: u64,
    rules: &HashMap<RuleId, Entry<T>>,
) {
    let position =
        bucket.partition_point(|existing| rules.get(existing).is_some_and(|e| e.seq < seq));
    bucket.insert(position, id.clone());
}

fn remove_from_bucket<K, Q>(index: &mut HashMap<K, Vec<RuleId>>, key: &Q, id: &RuleId)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(bucket) = index.get_mut(key) {
        bucket.retain(|existing| existing != id);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}
