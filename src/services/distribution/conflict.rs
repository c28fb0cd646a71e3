//! Conflict and overlap detection for a rule file that is about to be saved.
//!
//! A proposed rule only "touches" characters it names outright (an NPC form
//! or an NPC editor id) or every character when it has no filters at all,
//! and only those its full filter set still matches.
//! Against each touched character's current winner it is either a hard
//! conflict (both sides certain) or a soft overlap (at least one side has a
//! chance below 100).

use super::keywords::VirtualTags;
use super::matcher::{matches, MatchSubject};
use super::resolution::{AssignmentResult, OutfitDistribution, ResolutionOutcome};
use super::rule::{Dialect, DistributionRule, OutfitSlot, RuleTarget};
use crate::services::config::EngineConfig;
use crate::services::game_data::{EntityId, FormKind, NpcPopulation};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Extra markers tried when the first suggestion still does not sort last.
const MAX_EXTRA_MARKERS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ConflictSeverity {
    None,
    SoftOverlap,
    HardConflict,
}

impl ConflictSeverity {
    pub fn classify(left_certain: bool, right_certain: bool) -> Self {
        if left_certain && right_certain {
            ConflictSeverity::HardConflict
        } else {
            ConflictSeverity::SoftOverlap
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConflictSeverity::None => "none",
            ConflictSeverity::SoftOverlap => "soft overlap",
            ConflictSeverity::HardConflict => "hard conflict",
        }
    }
}

/// A proposed rule against one character's current winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcConflict {
    pub npc: EntityId,
    pub npc_name: String,
    pub severity: ConflictSeverity,
    pub existing: OutfitDistribution,
    pub proposed_line: usize,
    pub proposed_outfit: String,
    pub proposed_chance: Option<u8>,
    pub summary: String,
}

/// What renaming the proposed file can do about the conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LoadOrderVerdict {
    NoConflicts,
    /// The proposed file already loads after everything it conflicts with.
    AlreadyResolved,
    Rename { suggested: String },
    /// A higher-tier file wins regardless of name, or no name sorts late enough.
    Unresolvable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub proposed_file_name: String,
    pub dialect: Dialect,
    pub conflicts: Vec<NpcConflict>,
    pub has_hard_conflict: bool,
    pub has_soft_overlap: bool,
    /// Distinct existing file names involved, in the order first seen.
    pub conflicting_files: Vec<String>,
    pub verdict: LoadOrderVerdict,
    pub summary: String,
}

impl ConflictReport {
    pub fn suggested_file_name(&self) -> Option<&str> {
        match &self.verdict {
            LoadOrderVerdict::Rename { suggested } => Some(suggested),
            _ => None,
        }
    }

    pub fn is_resolved_by_load_order(&self) -> bool {
        self.verdict == LoadOrderVerdict::AlreadyResolved
    }
}

/// One character two rules of the same proposed file both claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntraFileConflict {
    pub npc: EntityId,
    pub npc_name: String,
    pub severity: ConflictSeverity,
    pub first_line: usize,
    pub second_line: usize,
    pub summary: String,
}

/// Population indices a proposed rule names outright and still matches.
pub fn affected_indices(
    rule: &DistributionRule,
    population: &NpcPopulation,
    tags: &VirtualTags,
) -> Vec<usize> {
    if rule.filters.is_unfiltered() {
        return (0..population.len()).collect();
    }

    let by_form = rule
        .filters
        .forms
        .included()
        .filter(|part| part.value.kind() == Some(FormKind::Npc))
        .filter_map(|part| part.value.key())
        .filter_map(|key| population.index_of(key));
    let by_editor_id = rule
        .filters
        .strings
        .included()
        .filter(|part| !part.wildcard)
        .filter_map(|part| population.index_of_editor_id(part.value.text()));

    let mut indices: Vec<usize> = by_form
        .chain(by_editor_id)
        .filter(|&index| {
            MatchSubject::from_population(population, index, tags.get(index))
                .is_some_and(|subject| matches(&subject, &rule.filters))
        })
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

fn outfit_label(rule: &DistributionRule) -> String {
    match &rule.target {
        RuleTarget::Outfit { outfit, .. } => outfit
            .editor_id()
            .map(ToString::to_string)
            .unwrap_or_else(|| outfit.spid_literal()),
        RuleTarget::Keyword { tag } => tag.clone(),
    }
}

fn chance_label(chance: Option<u8>) -> String {
    match chance {
        Some(chance) if chance < 100 => format!(" ({chance}%)"),
        _ => String::new(),
    }
}

/// For each touched character, the last proposed rule that names it.
fn proposed_claims<'r>(
    proposed: &'r [DistributionRule],
    population: &NpcPopulation,
    tags: &VirtualTags,
    slot: OutfitSlot,
) -> BTreeMap<usize, &'r DistributionRule> {
    let mut claims = BTreeMap::new();
    for rule in proposed.iter().filter(|r| r.is_outfit_for(slot)) {
        for index in affected_indices(rule, population, tags) {
            claims.insert(index, rule);
        }
    }
    claims
}

/// Compare a proposed file against the resolved existing rule set.
pub fn detect_conflicts(
    proposed: &[DistributionRule],
    proposed_file_name: &str,
    dialect: Dialect,
    existing: &ResolutionOutcome,
    population: &NpcPopulation,
    tags: &VirtualTags,
    config: &EngineConfig,
) -> ConflictReport {
    let winners: HashMap<&EntityId, &AssignmentResult> =
        existing.results.iter().map(|r| (&r.npc, r)).collect();

    let mut conflicts = Vec::new();
    for (index, rule) in proposed_claims(proposed, population, tags, existing.slot) {
        let Some(npc) = population.get(index) else {
            continue;
        };
        let Some(current) = winners.get(&npc.id).and_then(|r| r.authored_winner()) else {
            continue;
        };
        if current.file_name.eq_ignore_ascii_case(proposed_file_name) {
            continue;
        }
        if rule.target.outfit_key() == Some(&current.outfit) {
            continue;
        }

        let severity = ConflictSeverity::classify(current.is_certain(), rule.is_certain());
        let proposed_outfit = outfit_label(rule);
        let summary = format!(
            "{}: {}{} from {} (line {}) vs {}{} (line {}): {}",
            npc.display_name(),
            current.outfit_label(),
            chance_label(current.chance),
            current.file_name,
            current.line_number.unwrap_or_default(),
            proposed_outfit,
            chance_label(rule.chance),
            rule.line_number,
            severity.label()
        );
        conflicts.push(NpcConflict {
            npc: npc.id.clone(),
            npc_name: npc.display_name(),
            severity,
            existing: current.clone(),
            proposed_line: rule.line_number,
            proposed_outfit,
            proposed_chance: rule.chance,
            summary,
        });
    }

    let mut conflicting_files: Vec<String> = Vec::new();
    for conflict in &conflicts {
        let name = &conflict.existing.file_name;
        if !conflicting_files.iter().any(|n| n == name) {
            conflicting_files.push(name.clone());
        }
    }

    let verdict = load_order_verdict(&conflicts, proposed_file_name, dialect, config);
    let hard = conflicts
        .iter()
        .filter(|c| c.severity == ConflictSeverity::HardConflict)
        .count();
    let soft = conflicts.len() - hard;
    let summary = match &verdict {
        LoadOrderVerdict::NoConflicts => "No conflicts with existing rules".to_string(),
        LoadOrderVerdict::AlreadyResolved => format!(
            "{hard} hard conflict(s), {soft} soft overlap(s); {proposed_file_name} already loads last"
        ),
        LoadOrderVerdict::Rename { suggested } => format!(
            "{hard} hard conflict(s), {soft} soft overlap(s); rename to {suggested} to load last"
        ),
        LoadOrderVerdict::Unresolvable { reason } => {
            format!("{hard} hard conflict(s), {soft} soft overlap(s); {reason}")
        }
    };

    ConflictReport {
        proposed_file_name: proposed_file_name.to_string(),
        dialect,
        has_hard_conflict: hard > 0,
        has_soft_overlap: soft > 0,
        conflicts,
        conflicting_files,
        verdict,
        summary,
    }
}

fn load_order_verdict(
    conflicts: &[NpcConflict],
    proposed_file_name: &str,
    dialect: Dialect,
    config: &EngineConfig,
) -> LoadOrderVerdict {
    if conflicts.is_empty() {
        return LoadOrderVerdict::NoConflicts;
    }

    let outranked: Vec<&str> = conflicts
        .iter()
        .filter(|c| c.existing.tier > dialect.tier())
        .map(|c| c.existing.file_name.as_str())
        .collect();
    if let Some(first) = outranked.first() {
        return LoadOrderVerdict::Unresolvable {
            reason: format!(
                "{first} is a higher-priority file type than {}; renaming cannot win",
                dialect.label()
            ),
        };
    }

    let mut same_tier: Vec<String> = Vec::new();
    for conflict in conflicts.iter().filter(|c| c.existing.tier == dialect.tier()) {
        if !same_tier.contains(&conflict.existing.file_name) {
            same_tier.push(conflict.existing.file_name.clone());
        }
    }
    if sorts_after_all(proposed_file_name, &same_tier) {
        return LoadOrderVerdict::AlreadyResolved;
    }

    match suggest_file_name(
        proposed_file_name,
        &same_tier,
        config.priority_marker,
        config.required_suffix(dialect),
    ) {
        Some(suggested) => LoadOrderVerdict::Rename { suggested },
        None => LoadOrderVerdict::Unresolvable {
            reason: "no file name sorts after every conflicting file".to_string(),
        },
    }
}

/// Load-order comparison: case-insensitive, ordinal.
pub fn sorts_after_all(name: &str, others: &[String]) -> bool {
    let folded = name.to_lowercase();
    others.iter().all(|other| folded > other.to_lowercase())
}

/// Length of the leading run of identical characters, case-sensitive.
fn leading_run(name: &str) -> usize {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => 1 + chars.take_while(|&c| c == first).count(),
        None => 0,
    }
}

fn ensure_suffix(name: String, suffix: &str) -> String {
    let has_suffix = name.len() >= suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix));
    if has_suffix {
        name
    } else {
        format!("{name}{suffix}")
    }
}

/// Prefix the proposed name with enough markers to sort after every
/// conflicting name: one more than the longest leading run found among them.
pub fn suggest_file_name(
    proposed: &str,
    conflicting: &[String],
    marker: char,
    required_suffix: &str,
) -> Option<String> {
    let stem = proposed.trim_start_matches(marker);
    let stem = if stem.is_empty() { proposed } else { stem };
    let base = ensure_suffix(sanitize_filename::sanitize(stem), required_suffix);

    let longest = conflicting
        .iter()
        .map(|name| leading_run(name))
        .max()
        .unwrap_or(0);

    for extra in 0..=MAX_EXTRA_MARKERS {
        let prefix: String = std::iter::repeat(marker).take(longest + 1 + extra).collect();
        let candidate = format!("{prefix}{base}");
        if sorts_after_all(&candidate, conflicting) {
            return Some(candidate);
        }
    }
    log::warn!("Could not find a file name for {proposed} that loads last");
    None
}

/// Pairs of rules in one proposed file that claim the same character.
///
/// The later line is the one that would win; reported per character.
pub fn detect_intra_file_conflicts(
    proposed: &[DistributionRule],
    population: &NpcPopulation,
    tags: &VirtualTags,
) -> Vec<IntraFileConflict> {
    let outfit_rules: Vec<(&DistributionRule, Vec<usize>)> = proposed
        .iter()
        .filter(|rule| rule.target.slot().is_some())
        .map(|rule| (rule, affected_indices(rule, population, tags)))
        .collect();

    let mut found = Vec::new();
    for (i, (first, first_hits)) in outfit_rules.iter().enumerate() {
        for (second, second_hits) in outfit_rules.iter().skip(i + 1) {
            if first.target.slot() != second.target.slot()
                || first.target.outfit_key() == second.target.outfit_key()
            {
                continue;
            }
            for index in first_hits.iter().filter(|idx| second_hits.contains(idx)) {
                let Some(npc) = population.get(*index) else {
                    continue;
                };
                let severity = ConflictSeverity::classify(first.is_certain(), second.is_certain());
                found.push(IntraFileConflict {
                    npc: npc.id.clone(),
                    npc_name: npc.display_name(),
                    severity,
                    first_line: first.line_number,
                    second_line: second.line_number,
                    summary: format!(
                        "{}: line {} ({}{}) and line {} ({}{}): {}",
                        npc.display_name(),
                        first.line_number,
                        outfit_label(first),
                        chance_label(first.chance),
                        second.line_number,
                        outfit_label(second),
                        chance_label(second.chance),
                        severity.label()
                    ),
                });
            }
        }
    }
    found
}

#[cfg(test)]
#[path = "tests/conflict_tests.rs"]
mod tests;
