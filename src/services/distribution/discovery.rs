//! Rule-file discovery and parallel loading.

use super::document::{sort_load_order, DistributionFile};
use super::rule::Dialect;
use super::{is_cancelled, RunStatus};
use crate::services::config::EngineConfig;
use crate::services::game_data::FormResolver;
use crate::types::errors::{EngineError, EngineResult};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFileCandidate {
    pub path: PathBuf,
    pub dialect: Dialect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub status: RunStatus,
    /// In processing order.
    pub files: Vec<DistributionFile>,
    pub skipped: Vec<SkippedFile>,
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

/// SPID files sit directly in the data directory.
fn discover_spid(data_dir: &Path, config: &EngineConfig) -> Vec<RuleFileCandidate> {
    WalkDir::new(data_dir)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            file_name_of(entry.path())
                .is_some_and(|name| ends_with_ignore_case(&name, &config.spid_suffix))
        })
        .map(|entry| RuleFileCandidate {
            path: entry.into_path(),
            dialect: Dialect::Spid,
        })
        .collect()
}

/// SkyPatcher files may be nested anywhere below the NPC directory.
fn discover_skypatcher(data_dir: &Path, config: &EngineConfig) -> Vec<RuleFileCandidate> {
    let root = data_dir.join(&config.skypatcher_dir);
    if !root.is_dir() {
        log::debug!("No SkyPatcher directory at {}", root.display());
        return Vec::new();
    }

    WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            file_name_of(entry.path()).is_some_and(|name| {
                ends_with_ignore_case(&name, ".ini")
                    && !name.eq_ignore_ascii_case(&config.reserved_file_name)
            })
        })
        .map(|entry| RuleFileCandidate {
            path: entry.into_path(),
            dialect: Dialect::SkyPatcher,
        })
        .collect()
}

/// Find every rule file under `data_dir`, in processing order.
pub fn discover_rule_files(
    data_dir: &Path,
    config: &EngineConfig,
) -> EngineResult<Vec<RuleFileCandidate>> {
    if !data_dir.is_dir() {
        return Err(EngineError::MissingPath(data_dir.to_path_buf()));
    }

    let mut candidates = discover_skypatcher(data_dir, config);
    candidates.extend(discover_spid(data_dir, config));
    candidates.sort_by(|a, b| {
        let key = |c: &RuleFileCandidate| {
            (
                c.dialect.tier(),
                file_name_of(&c.path).unwrap_or_default().to_lowercase(),
            )
        };
        key(a).cmp(&key(b)).then_with(|| a.path.cmp(&b.path))
    });

    log::info!(
        "Discovered {} rule file(s) under {}",
        candidates.len(),
        data_dir.display()
    );
    Ok(candidates)
}

/// Parse candidates in parallel. Unreadable files are skipped with a warning;
/// the result is re-sorted so thread scheduling never affects order.
pub fn load_rule_files(
    candidates: &[RuleFileCandidate],
    resolver: &dyn FormResolver,
    cancel_flag: &AtomicBool,
) -> LoadOutcome {
    let results: Vec<Option<Result<DistributionFile, SkippedFile>>> = candidates
        .par_iter()
        .map(|candidate| {
            if is_cancelled(cancel_flag) {
                return None;
            }
            Some(
                DistributionFile::load(&candidate.path, candidate.dialect, resolver).map_err(
                    |e| SkippedFile {
                        path: candidate.path.clone(),
                        reason: e.to_string(),
                    },
                ),
            )
        })
        .collect();

    if is_cancelled(cancel_flag) {
        log::info!("Rule file loading cancelled");
        return LoadOutcome {
            status: RunStatus::Cancelled,
            files: Vec::new(),
            skipped: Vec::new(),
        };
    }

    let mut files = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for result in results.into_iter().flatten() {
        match result {
            Ok(file) => files.push(file),
            Err(skip) => {
                log::warn!("Skipping {}: {}", skip.path.display(), skip.reason);
                skipped.push(skip);
            }
        }
    }
    sort_load_order(&mut files);

    LoadOutcome {
        status: RunStatus::Completed,
        files,
        skipped,
    }
}

#[cfg(test)]
#[path = "tests/discovery_tests.rs"]
mod tests;
