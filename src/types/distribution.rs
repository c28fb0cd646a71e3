//! Caller-facing request and report shapes for the distribution engine.

use crate::services::distribution::discovery::SkippedFile;
use crate::services::distribution::document::{DistributionFile, TextEncoding};
use crate::services::distribution::pipeline::{keyword_rules, EngineRun};
use crate::services::distribution::rule::{Dialect, LineDiagnostic, OutfitSlot};
use crate::services::distribution::{AssignmentResult, RunStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Inputs for a full engine pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRequest {
    pub data_dir: PathBuf,
    pub snapshot_path: PathBuf,
    /// Engine config JSON; defaults when absent.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default)]
    pub slot: OutfitSlot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFileSummary {
    pub path: PathBuf,
    pub file_name: String,
    pub dialect: Dialect,
    pub processing_order: usize,
    pub rule_count: usize,
    pub line_count: usize,
    pub encoding: TextEncoding,
    pub diagnostics: Vec<LineDiagnostic>,
}

impl RuleFileSummary {
    pub fn new(file: &DistributionFile, processing_order: usize) -> Self {
        Self {
            path: file.path.clone(),
            file_name: file.file_name.clone(),
            dialect: file.dialect,
            processing_order,
            rule_count: file.rules.len(),
            line_count: file.lines.len(),
            encoding: file.encoding,
            diagnostics: file.diagnostics.clone(),
        }
    }
}

/// Keyword rule left out of simulation because it sits on a dependency cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedKeywordRule {
    pub line_number: usize,
    pub raw: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRunSummary {
    pub status: RunStatus,
    pub slot: OutfitSlot,
    pub files: Vec<RuleFileSummary>,
    pub skipped: Vec<SkippedFile>,
    pub diagnostic_count: usize,
    pub excluded_keyword_rules: Vec<ExcludedKeywordRule>,
    pub virtual_tag_assignments: usize,
    pub conflict_count: usize,
    pub assignments: Vec<AssignmentResult>,
}

impl EngineRunSummary {
    pub fn from_run(run: &EngineRun) -> Self {
        let keywords = keyword_rules(&run.files);
        let excluded_keyword_rules = run
            .keyword_plan
            .excluded
            .iter()
            .filter_map(|&index| keywords.get(index))
            .map(|rule| ExcludedKeywordRule {
                line_number: rule.line_number,
                raw: rule.raw.clone(),
            })
            .collect();

        Self {
            status: run.status,
            slot: run.resolution.slot,
            files: run
                .files
                .iter()
                .enumerate()
                .map(|(index, file)| RuleFileSummary::new(file, index + 1))
                .collect(),
            skipped: run.skipped.clone(),
            diagnostic_count: run.diagnostic_count(),
            excluded_keyword_rules,
            virtual_tag_assignments: run.tags.assignment_count(),
            conflict_count: run.resolution.conflict_count(),
            assignments: run.resolution.results.clone(),
        }
    }
}

/// A proposed file that has not been saved yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedFileRequest {
    pub file_name: String,
    pub dialect: Dialect,
    pub text: String,
}
