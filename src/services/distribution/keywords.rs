//! Keyword propagation: rules that assign virtual tags other rules filter on.
//!
//! Rules are ordered so every tag is assigned before anything reads it. Rules
//! caught in a dependency cycle are dropped from the run and logged; a single
//! forward pass over the remaining order is then enough.

use super::matcher::matching_indices;
use super::rule::{DistributionRule, RuleTarget};
use super::{is_cancelled, RunStatus};
use crate::services::game_data::NpcPopulation;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::AtomicBool;

/// Simulated tags per character, indexed like the population.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualTags {
    per_npc: Vec<HashSet<String>>,
}

impl VirtualTags {
    pub fn new(population_len: usize) -> Self {
        Self {
            per_npc: vec![HashSet::new(); population_len],
        }
    }

    /// Tags for one character; `None` when it has none.
    pub fn get(&self, index: usize) -> Option<&HashSet<String>> {
        self.per_npc.get(index).filter(|tags| !tags.is_empty())
    }

    pub fn has_tag(&self, index: usize, tag: &str) -> bool {
        self.get(index)
            .is_some_and(|tags| tags.contains(&tag.to_lowercase()))
    }

    pub fn assignment_count(&self) -> usize {
        self.per_npc.iter().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.assignment_count() == 0
    }

    fn insert(&mut self, index: usize, folded_tag: &str) {
        if let Some(tags) = self.per_npc.get_mut(index) {
            tags.insert(folded_tag.to_string());
        }
    }
}

/// Execution order over a list of keyword rules, by input index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordPlan {
    pub order: Vec<usize>,
    /// Rules on a dependency cycle, ascending.
    pub excluded: Vec<usize>,
}

fn assigned_tag(rule: &DistributionRule) -> Option<String> {
    match &rule.target {
        RuleTarget::Keyword { tag } => Some(tag.to_lowercase()),
        RuleTarget::Outfit { .. } => None,
    }
}

/// `edges[a]` holds every rule that reads a tag rule `a` assigns.
fn build_dependency_graph(rules: &[&DistributionRule]) -> Vec<Vec<usize>> {
    let mut assigners: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, rule) in rules.iter().enumerate() {
        if let Some(tag) = assigned_tag(rule) {
            assigners.entry(tag).or_default().push(index);
        }
    }

    let mut edges = vec![Vec::new(); rules.len()];
    for (reader, rule) in rules.iter().enumerate() {
        let mut seen = HashSet::new();
        for tag in rule.filters.named_tags() {
            let Some(writers) = assigners.get(tag) else {
                continue;
            };
            for &writer in writers {
                if seen.insert(writer) {
                    edges[writer].push(reader);
                }
            }
        }
    }
    edges
}

struct Tarjan<'g> {
    edges: &'g [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl<'g> Tarjan<'g> {
    fn run(edges: &'g [Vec<usize>]) -> Vec<Vec<usize>> {
        let len = edges.len();
        let mut tarjan = Self {
            edges,
            index: vec![None; len],
            lowlink: vec![0; len],
            on_stack: vec![false; len],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        };
        for node in 0..len {
            if tarjan.index[node].is_none() {
                tarjan.visit(node);
            }
        }
        tarjan.components
    }

    /// Depth-first walk with an explicit frame stack of (node, next edge).
    fn visit(&mut self, root: usize) {
        let edges = self.edges;
        let mut frames = vec![(root, 0usize)];
        self.open(root);

        while let Some(&(node, cursor)) = frames.last() {
            if let Some(&next) = edges[node].get(cursor) {
                if let Some(frame) = frames.last_mut() {
                    frame.1 += 1;
                }
                match self.index[next] {
                    None => {
                        self.open(next);
                        frames.push((next, 0));
                    }
                    Some(next_index) if self.on_stack[next] => {
                        self.lowlink[node] = self.lowlink[node].min(next_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[node]);
            }
            if Some(self.lowlink[node]) == self.index[node] {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }

    fn open(&mut self, node: usize) {
        self.index[node] = Some(self.next_index);
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }
}

/// Order keyword rules so assigners run before readers.
///
/// Among rules whose dependencies are satisfied, the one earliest in the
/// input runs first, so unrelated rules keep their processing order.
pub fn plan_keyword_order(rules: &[&DistributionRule]) -> KeywordPlan {
    let edges = build_dependency_graph(rules);

    let mut cyclic = vec![false; rules.len()];
    for component in Tarjan::run(&edges) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|&node| edges[node].contains(&node));
        if is_cycle {
            for node in component {
                cyclic[node] = true;
            }
        }
    }

    let mut in_degree = vec![0usize; rules.len()];
    for (from, targets) in edges.iter().enumerate() {
        if cyclic[from] {
            continue;
        }
        for &to in targets {
            if !cyclic[to] {
                in_degree[to] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..rules.len())
        .filter(|&node| !cyclic[node] && in_degree[node] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(rules.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &edges[node] {
            if cyclic[next] {
                continue;
            }
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    let excluded: Vec<usize> = (0..rules.len()).filter(|&node| cyclic[node]).collect();
    for &node in &excluded {
        let rule = rules[node];
        log::warn!(
            "Keyword rule at line {} ({}) is part of a dependency cycle; excluded from simulation",
            rule.line_number,
            rule.target.describe()
        );
    }

    KeywordPlan { order, excluded }
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub status: RunStatus,
    pub plan: KeywordPlan,
    pub tags: VirtualTags,
}

/// Replay keyword rules over the population. Chance is ignored: a
/// probabilistic rule counts as assigning its tag.
pub fn simulate_keywords(
    population: &NpcPopulation,
    rules: &[&DistributionRule],
    parallel: bool,
    cancel_flag: &AtomicBool,
) -> SimulationOutcome {
    let plan = plan_keyword_order(rules);
    let mut tags = VirtualTags::new(population.len());

    for &rule_index in &plan.order {
        if is_cancelled(cancel_flag) {
            log::info!("Keyword simulation cancelled");
            return SimulationOutcome {
                status: RunStatus::Cancelled,
                plan,
                tags: VirtualTags::default(),
            };
        }

        let rule = rules[rule_index];
        let Some(tag) = assigned_tag(rule) else {
            continue;
        };
        let matched = matching_indices(population, &tags, rule, parallel);
        log::debug!(
            "Keyword `{}` (line {}) assigned to {} character(s)",
            tag,
            rule.line_number,
            matched.len()
        );
        for index in matched {
            tags.insert(index, &tag);
        }
    }

    SimulationOutcome {
        status: RunStatus::Completed,
        plan,
        tags,
    }
}

#[cfg(test)]
#[path = "tests/keywords_tests.rs"]
mod tests;
