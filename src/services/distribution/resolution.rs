//! Winner resolution: which outfit each character ends up with.
//!
//! Files are walked in processing order; every matching rule becomes one
//! distribution on the character. The last authored distribution wins, and
//! the game's own outfit only wins when nothing authored matched.

use super::document::DistributionFile;
use super::filter::FilterUsage;
use super::keywords::VirtualTags;
use super::matcher::matching_indices;
use super::rule::{Dialect, DistributionRule, OutfitSlot, RuleTarget};
use super::{is_cancelled, RunStatus};
use crate::services::game_data::{EntityId, FormLink, NpcPopulation, NpcRecord};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

pub const BASELINE_TIER: u8 = 0;
pub const BASELINE_ORDER: usize = 0;

/// One candidate assignment on one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitDistribution {
    /// `None` for the baseline record.
    pub source_path: Option<PathBuf>,
    pub file_name: String,
    pub dialect: Option<Dialect>,
    pub tier: u8,
    pub processing_order: usize,
    pub line_number: Option<usize>,
    pub outfit: EntityId,
    pub outfit_editor_id: Option<String>,
    pub raw: String,
    pub targeting: String,
    pub chance: Option<u8>,
    pub usage: FilterUsage,
}

impl OutfitDistribution {
    pub fn baseline(npc: &NpcRecord, link: &FormLink) -> Self {
        Self {
            source_path: None,
            file_name: npc.source_plugin.clone(),
            dialect: None,
            tier: BASELINE_TIER,
            processing_order: BASELINE_ORDER,
            line_number: None,
            outfit: link.key.clone(),
            outfit_editor_id: link.editor_id.clone(),
            raw: String::new(),
            targeting: "base record".to_string(),
            chance: None,
            usage: FilterUsage::default(),
        }
    }

    fn from_rule(
        file: &DistributionFile,
        processing_order: usize,
        rule: &DistributionRule,
        outfit: EntityId,
        outfit_editor_id: Option<String>,
    ) -> Self {
        Self {
            source_path: Some(file.path.clone()),
            file_name: file.file_name.clone(),
            dialect: Some(rule.dialect),
            tier: rule.dialect.tier(),
            processing_order,
            line_number: Some(rule.line_number),
            outfit,
            outfit_editor_id,
            raw: rule.raw.clone(),
            targeting: rule.describe_targeting(),
            chance: rule.chance,
            usage: rule.usage(),
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.tier == BASELINE_TIER
    }

    pub fn is_certain(&self) -> bool {
        self.chance.map_or(true, |chance| chance >= 100)
    }

    /// Editor id when known, otherwise the form key.
    pub fn outfit_label(&self) -> String {
        self.outfit_editor_id
            .clone()
            .unwrap_or_else(|| self.outfit.to_string())
    }
}

/// Every distribution on one character, with the winner fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub npc: EntityId,
    pub npc_name: String,
    pub npc_editor_id: Option<String>,
    /// Baseline first, then processing order.
    pub distributions: Vec<OutfitDistribution>,
    pub winner_index: usize,
    /// More than one authored distribution matched.
    pub has_conflict: bool,
}

impl AssignmentResult {
    /// `None` when `distributions` is empty.
    pub fn new(npc: &NpcRecord, distributions: Vec<OutfitDistribution>) -> Option<Self> {
        if distributions.is_empty() {
            return None;
        }
        let authored = distributions.iter().filter(|d| !d.is_baseline()).count();
        let winner_index = distributions
            .iter()
            .rposition(|d| !d.is_baseline())
            .unwrap_or(0);
        Some(Self {
            npc: npc.id.clone(),
            npc_name: npc.display_name(),
            npc_editor_id: npc.editor_id.clone(),
            distributions,
            winner_index,
            has_conflict: authored > 1,
        })
    }

    pub fn winner(&self) -> &OutfitDistribution {
        &self.distributions[self.winner_index]
    }

    pub fn is_winner(&self, index: usize) -> bool {
        index == self.winner_index
    }

    /// The winning distribution unless it is the baseline.
    pub fn authored_winner(&self) -> Option<&OutfitDistribution> {
        let winner = self.winner();
        (!winner.is_baseline()).then_some(winner)
    }

    pub fn authored(&self) -> impl Iterator<Item = &OutfitDistribution> {
        self.distributions.iter().filter(|d| !d.is_baseline())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub slot: OutfitSlot,
    pub parallel: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            slot: OutfitSlot::Default,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionOutcome {
    pub status: RunStatus,
    pub slot: OutfitSlot,
    /// Population order.
    pub results: Vec<AssignmentResult>,
}

impl ResolutionOutcome {
    pub fn cancelled(slot: OutfitSlot) -> Self {
        Self {
            status: RunStatus::Cancelled,
            slot,
            results: Vec::new(),
        }
    }

    pub fn for_npc(&self, npc: &EntityId) -> Option<&AssignmentResult> {
        self.results.iter().find(|result| &result.npc == npc)
    }

    pub fn conflict_count(&self) -> usize {
        self.results.iter().filter(|r| r.has_conflict).count()
    }
}

fn baseline_link(npc: &NpcRecord, slot: OutfitSlot) -> Option<&FormLink> {
    match slot {
        OutfitSlot::Default => npc.default_outfit.as_ref(),
        OutfitSlot::Sleep => npc.sleep_outfit.as_ref(),
    }
}

/// Resolve one outfit slot for every character.
///
/// `files` must already be in processing order; file `i` gets processing
/// order `i + 1`. The cancel flag is checked between files, and a cancelled
/// run publishes no results.
pub fn resolve_winners(
    population: &NpcPopulation,
    files: &[DistributionFile],
    tags: &VirtualTags,
    options: ResolveOptions,
    cancel_flag: &AtomicBool,
) -> ResolutionOutcome {
    let mut matched: Vec<Vec<OutfitDistribution>> = vec![Vec::new(); population.len()];

    for (file_index, file) in files.iter().enumerate() {
        if is_cancelled(cancel_flag) {
            log::info!("Winner resolution cancelled before {}", file.file_name);
            return ResolutionOutcome::cancelled(options.slot);
        }
        let processing_order = file_index + 1;

        for rule in file.rules.iter().filter(|r| r.is_outfit_for(options.slot)) {
            let RuleTarget::Outfit { outfit, .. } = &rule.target else {
                continue;
            };
            let Some(outfit_key) = outfit.key() else {
                continue;
            };
            let outfit_editor_id = outfit.editor_id().map(ToString::to_string);
            for index in matching_indices(population, tags, rule, options.parallel) {
                matched[index].push(OutfitDistribution::from_rule(
                    file,
                    processing_order,
                    rule,
                    outfit_key.clone(),
                    outfit_editor_id.clone(),
                ));
            }
        }
    }

    let mut results = Vec::new();
    for (index, authored) in matched.into_iter().enumerate() {
        if authored.is_empty() {
            continue;
        }
        let Some(npc) = population.get(index) else {
            continue;
        };
        let mut distributions = Vec::with_capacity(authored.len() + 1);
        if let Some(link) = baseline_link(npc, options.slot) {
            distributions.push(OutfitDistribution::baseline(npc, link));
        }
        distributions.extend(authored);
        results.extend(AssignmentResult::new(npc, distributions));
    }

    let outcome = ResolutionOutcome {
        status: RunStatus::Completed,
        slot: options.slot,
        results,
    };
    log::info!(
        "Resolved {} character(s) across {} file(s), {} with competing rules",
        outcome.results.len(),
        files.len(),
        outcome.conflict_count()
    );
    outcome
}

#[cfg(test)]
#[path = "tests/resolution_tests.rs"]
mod tests;
