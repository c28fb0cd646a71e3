//! End-to-end engine pass: discover, load, simulate keywords, resolve.
//!
//! Each stage honours the same cancel flag. A cancelled pass returns a
//! `Cancelled` run with nothing from the partial work attached.

use super::conflict::{
    detect_conflicts, detect_intra_file_conflicts, ConflictReport, IntraFileConflict,
};
use super::discovery::{discover_rule_files, load_rule_files, SkippedFile};
use super::document::DistributionFile;
use super::keywords::{simulate_keywords, KeywordPlan, VirtualTags};
use super::resolution::{resolve_winners, ResolutionOutcome, ResolveOptions};
use super::rule::{Dialect, DistributionRule, LineDiagnostic, OutfitSlot, RuleTarget};
use super::RunStatus;
use crate::services::config::EngineConfig;
use crate::services::game_data::GameData;
use crate::types::errors::EngineResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone)]
pub struct EngineRun {
    pub status: RunStatus,
    /// In processing order.
    pub files: Vec<DistributionFile>,
    pub skipped: Vec<SkippedFile>,
    pub keyword_plan: KeywordPlan,
    pub tags: VirtualTags,
    pub resolution: ResolutionOutcome,
}

impl EngineRun {
    fn cancelled(slot: OutfitSlot) -> Self {
        Self {
            status: RunStatus::Cancelled,
            files: Vec::new(),
            skipped: Vec::new(),
            keyword_plan: KeywordPlan::default(),
            tags: VirtualTags::default(),
            resolution: ResolutionOutcome::cancelled(slot),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    pub fn diagnostic_count(&self) -> usize {
        self.files.iter().map(DistributionFile::unparseable_count).sum()
    }

    pub fn rule_count(&self) -> usize {
        self.files.iter().map(|f| f.rules.len()).sum()
    }
}

/// Keyword rules across all files, in processing order.
pub fn keyword_rules(files: &[DistributionFile]) -> Vec<&DistributionRule> {
    files
        .iter()
        .flat_map(|file| file.rules.iter())
        .filter(|rule| matches!(rule.target, RuleTarget::Keyword { .. }))
        .collect()
}

/// Simulate keywords and resolve one slot over files already in processing order.
pub fn evaluate_files(
    files: Vec<DistributionFile>,
    skipped: Vec<SkippedFile>,
    game: &GameData,
    config: &EngineConfig,
    slot: OutfitSlot,
    cancel_flag: &AtomicBool,
) -> EngineRun {
    let simulation = simulate_keywords(
        &game.population,
        &keyword_rules(&files),
        config.parallel,
        cancel_flag,
    );
    if simulation.status == RunStatus::Cancelled {
        return EngineRun::cancelled(slot);
    }

    let resolution = resolve_winners(
        &game.population,
        &files,
        &simulation.tags,
        ResolveOptions {
            slot,
            parallel: config.parallel,
        },
        cancel_flag,
    );
    if resolution.status == RunStatus::Cancelled {
        return EngineRun::cancelled(slot);
    }

    EngineRun {
        status: RunStatus::Completed,
        files,
        skipped,
        keyword_plan: simulation.plan,
        tags: simulation.tags,
        resolution,
    }
}

/// Full pass over a data directory.
pub fn run_engine(
    data_dir: &Path,
    game: &GameData,
    config: &EngineConfig,
    slot: OutfitSlot,
    cancel_flag: &AtomicBool,
) -> EngineResult<EngineRun> {
    let candidates = discover_rule_files(data_dir, config)?;
    let loaded = load_rule_files(&candidates, &game.catalog, cancel_flag);
    if loaded.status == RunStatus::Cancelled {
        return Ok(EngineRun::cancelled(slot));
    }

    let run = evaluate_files(loaded.files, loaded.skipped, game, config, slot, cancel_flag);
    if !run.is_cancelled() {
        log::info!(
            "Engine pass: {} file(s), {} rule(s), {} diagnostic(s), {} skipped",
            run.files.len(),
            run.rule_count(),
            run.diagnostic_count(),
            run.skipped.len()
        );
    }
    Ok(run)
}

/// A not-yet-saved file checked against a completed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedCheck {
    pub rules: Vec<DistributionRule>,
    pub diagnostics: Vec<LineDiagnostic>,
    pub report: ConflictReport,
    pub intra_file: Vec<IntraFileConflict>,
}

pub fn check_proposed_file(
    run: &EngineRun,
    file_name: &str,
    dialect: Dialect,
    text: &str,
    game: &GameData,
    config: &EngineConfig,
) -> ProposedCheck {
    let file = DistributionFile::parse(PathBuf::from(file_name), dialect, text, &game.catalog);
    let report = detect_conflicts(
        &file.rules,
        file_name,
        dialect,
        &run.resolution,
        &game.population,
        &run.tags,
        config,
    );
    let intra_file = detect_intra_file_conflicts(&file.rules, &game.population, &run.tags);
    ProposedCheck {
        rules: file.rules,
        diagnostics: file.diagnostics,
        report,
        intra_file,
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
