#![forbid(unsafe_code)]

//! Dependency graph over a rule set
//!
//! Nodes are rule positions in the rule set; there is one edge per
//! `(dependent -> dependency)` pair declared by a dependent rule. Sub-rules of
//! conditional and switch rules are not nodes. Building the graph proves it is
//! acyclic and that every dependency id resolves.

use crate::error::RuleError;
use crate::rules::Rule;
use crate::types::RuleId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting,
    Visited,
}

/// Acyclic dependency graph of a rule set
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<RuleId>,
    index: HashMap<RuleId, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Builds the graph for `rules`
    ///
    /// # Errors
    ///
    /// - `RuleError::DuplicateId` if two rules share an id
    /// - `RuleError::UnknownDependency` if a dependency id names no rule in `rules`
    /// - `RuleError::CircularDependency` if the dependencies form a cycle; the
    ///   cycle lists the rules in traversal order and repeats the first one at
    ///   the end
    pub fn build<T>(rules: &[Rule<T>]) -> Result<Self, RuleError> {
        let mut index = HashMap::with_capacity(rules.len());
        for (position, rule) in rules.iter().enumerate() {
            if index.insert(rule.id().clone(), position).is_some() {
                return Err(RuleError::DuplicateId(rule.id().clone()));
            }
        }

        let mut dependencies = vec![Vec::new(); rules.len()];
        let mut dependents = vec![Vec::new(); rules.len()];
        for (position, rule) in rules.iter().enumerate() {
            for dependency in rule.dependencies() {
                let Some(&target) = index.get(dependency) else {
                    return Err(RuleError::UnknownDependency {
                        rule: rule.id().clone(),
                        dependency: dependency.clone(),
                    });
                };
                dependencies[position].push(target);
                dependents[target].push(position);
            }
        }

        let graph = Self {
            ids: rules.iter().map(|rule| rule.id().clone()).collect(),
            index,
            dependencies,
            dependents,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, id: &RuleId) -> bool {
        self.index.contains_key(id)
    }

    /// Position of `id` in the rule set the graph was built from
    pub fn index_of(&self, id: &RuleId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Direct dependencies of `id`, in declaration order
    pub fn dependencies_of(&self, id: &RuleId) -> Vec<&RuleId> {
        self.neighbours(&self.dependencies, id)
    }

    /// Rules that directly depend on `id`, in rule-set order
    pub fn dependents_of(&self, id: &RuleId) -> Vec<&RuleId> {
        self.neighbours(&self.dependents, id)
    }

    /// All rule ids with every dependency placed before its dependents
    ///
    /// Unrelated rules keep their rule-set order.
    pub fn topological_order(&self) -> Vec<&RuleId> {
        let mut state = vec![VisitState::None; self.ids.len()];
        let mut order = Vec::with_capacity(self.ids.len());

        fn visit(
            node: usize,
            graph: &DependencyGraph,
            state: &mut [VisitState],
            order: &mut Vec<usize>,
        ) {
            if state[node] != VisitState::None {
                return;
            }
            state[node] = VisitState::Visiting;
            for &dependency in &graph.dependencies[node] {
                visit(dependency, graph, state, order);
            }
            state[node] = VisitState::Visited;
            order.push(node);
        }

        for node in 0..self.ids.len() {
            visit(node, self, &mut state, &mut order);
        }

        order.into_iter().map(|node| &self.ids[node]).collect()
    }

    pub(crate) fn dependency_indices(&self, node: usize) -> &[usize] {
        &self.dependencies[node]
    }

    fn neighbours(&self, edges: &[Vec<usize>], id: &RuleId) -> Vec<&RuleId> {
        self.index_of(id)
            .map(|node| edges[node].iter().map(|&n| &self.ids[n]).collect())
            .unwrap_or_default()
    }

    fn check_acyclic(&self) -> Result<(), RuleError> {
        let mut state = vec![VisitState::None; self.ids.len()];
        let mut path = Vec::new();

        for node in 0..self.ids.len() {
            if state[node] == VisitState::None {
                self.visit(node, &mut state, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit(
        &self,
        node: usize,
        state: &mut [VisitState],
        path: &mut Vec<usize>,
    ) -> Result<(), RuleError> {
        match state[node] {
            VisitState::Visited => return Ok(()),
            VisitState::Visiting => {
                let start = path.iter().position(|&n| n == node).unwrap_or(0);
                let mut cycle: Vec<RuleId> =
                    path[start..].iter().map(|&n| self.ids[n].clone()).collect();
                cycle.push(self.ids[node].clone());
                return Err(RuleError::CircularDependency { cycle });
            }
            VisitState::None => state[node] = VisitState::Visiting,
        }

        path.push(node);
        for &dependency in &self.dependencies[node] {
            self.visit(dependency, state, path)?;
        }
        path.pop();

        state[node] = VisitState::Visited;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> RuleId {
        RuleId::new(s).unwrap()
    }

    fn action(name: &str) -> Rule<()> {
        Rule::action(id(name), |_: &(), _| Ok(()))
    }

    fn dependent(name: &str, deps: &[&str]) -> Rule<()> {
        Rule::dependent(id(name), deps.iter().map(|d| id(d)), |_: &(), _| Ok(()))
    }

    fn names(ids: Vec<&RuleId>) -> Vec<&str> {
        ids.into_iter().map(RuleId::as_str).collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::build::<()>(&[]).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.topological_order().is_empty());
    }

    #[test]
    fn test_diamond_dependencies() {
        // d depends on b and c, both depend on a
        let rules = vec![
            dependent("d", &["b", "c"]),
            dependent("b", &["a"]),
            dependent("c", &["a"]),
            action("a"),
        ];
        let graph = DependencyGraph::build(&rules).unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(names(graph.dependencies_of(&id("d"))), vec!["b", "c"]);
        assert_eq!(names(graph.dependents_of(&id("a"))), vec!["b", "c"]);

        let order = names(graph.topological_order());
        let pos = |name: &str| order.iter().position(|&n| n == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn test_unknown_lookups_are_empty() {
        let graph = DependencyGraph::build(&[action("a")]).unwrap();
        assert!(graph.dependencies_of(&id("zzz")).is_empty());
        assert!(graph.dependents_of(&id("zzz")).is_empty());
        assert!(graph.index_of(&id("zzz")).is_none());
        assert!(!graph.contains(&id("zzz")));
    }

    #[test]
    fn test_two_rule_cycle() {
        let rules = vec![dependent("a", &["b"]), dependent("b", &["a"])];
        match DependencyGraph::build(&rules) {
            Err(RuleError::CircularDependency { cycle }) => {
                assert_eq!(names(cycle.iter().collect()), vec!["a", "b", "a"]);
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let rules = vec![dependent("a", &["a"])];
        match DependencyGraph::build(&rules) {
            Err(RuleError::CircularDependency { cycle }) => {
                assert_eq!(names(cycle.iter().collect()), vec!["a", "a"]);
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_reported_without_leading_path() {
        let rules = vec![
            dependent("entry", &["x"]),
            dependent("x", &["y"]),
            dependent("y", &["z"]),
            dependent("z", &["x"]),
        ];
        match DependencyGraph::build(&rules) {
            Err(RuleError::CircularDependency { cycle }) => {
                assert_eq!(names(cycle.iter().collect()), vec!["x", "y", "z", "x"]);
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let rules = vec![dependent("a", &["missing"])];
        match DependencyGraph::build(&rules) {
            Err(RuleError::UnknownDependency { rule, dependency }) => {
                assert_eq!(rule.as_str(), "a");
                assert_eq!(dependency.as_str(), "missing");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_id() {
        let rules = vec![action("a"), action("a")];
        assert!(matches!(
            DependencyGraph::build(&rules),
            Err(RuleError::DuplicateId(dup)) if dup.as_str() == "a"
        ));
    }
}
