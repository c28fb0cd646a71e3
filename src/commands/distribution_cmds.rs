//! Caller-facing engine commands.
//!
//! Engine work runs on the blocking pool; at most one full pass runs at a
//! time and it can be cancelled from another task.

use crate::services::config::{load_config, EngineConfig};
use crate::services::distribution::parser::{self, ParseOutcome};
use crate::services::distribution::pipeline::{
    check_proposed_file, run_engine, EngineRun, ProposedCheck,
};
use crate::services::distribution::rule::Dialect;
use crate::services::distribution::AssignmentResult;
use crate::services::game_data::{EntityId, GameData, GameSnapshot};
use crate::types::distribution::{EngineRequest, EngineRunSummary, ProposedFileRequest};
use crate::types::errors::{CommandError, CommandResult, EngineError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Everything a completed pass needs to answer follow-up queries.
#[derive(Debug)]
pub struct LoadedRun {
    pub game: GameData,
    pub config: EngineConfig,
    pub run: EngineRun,
}

pub struct EngineState {
    is_running: Arc<AtomicBool>,
    cancel_flag: Arc<AtomicBool>,
    last_run: Arc<Mutex<Option<Arc<LoadedRun>>>>,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    pub fn try_start(&self) -> CommandResult<()> {
        self.is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CommandError::Internal("Engine pass already running".to_string()))
            .map(|_| ())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn reset_cancel(&self) {
        self.cancel_flag.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.is_running)
    }

    pub fn last_run(&self) -> Option<Arc<LoadedRun>> {
        self.last_run.lock().ok().and_then(|guard| guard.clone())
    }

    fn store(&self, loaded: Arc<LoadedRun>) {
        if let Ok(mut guard) = self.last_run.lock() {
            *guard = Some(loaded);
        }
    }

    fn require_run(&self) -> CommandResult<Arc<LoadedRun>> {
        self.last_run()
            .ok_or_else(|| CommandError::NotFound("No completed engine pass".to_string()))
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

struct RunningGuard {
    running_flag: Arc<AtomicBool>,
}

impl RunningGuard {
    fn new(running_flag: Arc<AtomicBool>) -> Self {
        Self { running_flag }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running_flag.store(false, Ordering::SeqCst);
    }
}

fn load_and_run(
    request: &EngineRequest,
    cancel_flag: &AtomicBool,
) -> Result<LoadedRun, EngineError> {
    let config = request
        .config_path
        .as_deref()
        .map(load_config)
        .unwrap_or_default();
    let game = GameData::from(GameSnapshot::load(&request.snapshot_path)?);
    let run = run_engine(&request.data_dir, &game, &config, request.slot, cancel_flag)?;
    if run.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(LoadedRun { game, config, run })
}

/// Discover, parse and resolve every rule file under the data directory.
///
/// A cancelled pass leaves the previous result in place.
pub async fn resolve_distributions(
    state: &EngineState,
    request: EngineRequest,
) -> CommandResult<EngineRunSummary> {
    state.try_start()?;
    state.reset_cancel();

    let cancel_flag = state.cancel_flag();
    let running_flag = state.running_flag();
    let loaded = tokio::task::spawn_blocking(move || {
        let _running_guard = RunningGuard::new(running_flag);
        load_and_run(&request, &cancel_flag)
    })
    .await
    .map_err(|e| CommandError::Internal(format!("Engine worker failed: {e}")))??;

    let summary = EngineRunSummary::from_run(&loaded.run);
    state.store(Arc::new(loaded));
    Ok(summary)
}

pub fn cancel_distribution_pass(state: &EngineState) {
    log::info!("Cancellation requested for engine pass");
    state.cancel();
}

/// Check a not-yet-saved rule file against the last completed pass.
pub async fn check_proposed_distribution(
    state: &EngineState,
    request: ProposedFileRequest,
) -> CommandResult<ProposedCheck> {
    if request.file_name.trim().is_empty() {
        return Err(CommandError::Engine("Proposed file name is empty".to_string()));
    }
    let loaded = state.require_run()?;

    tokio::task::spawn_blocking(move || {
        check_proposed_file(
            &loaded.run,
            &request.file_name,
            request.dialect,
            &request.text,
            &loaded.game,
            &loaded.config,
        )
    })
    .await
    .map_err(|e| CommandError::Internal(format!("Conflict check failed: {e}")))
}

/// Every distribution on one character, winner marked.
pub fn npc_distributions(state: &EngineState, npc: &str) -> CommandResult<AssignmentResult> {
    let id = EntityId::parse(npc)
        .ok_or_else(|| CommandError::NotFound(format!("Not a form key: {npc}")))?;
    let loaded = state.require_run()?;
    loaded
        .run
        .resolution
        .for_npc(&id)
        .cloned()
        .ok_or_else(|| CommandError::NotFound(format!("No distributions for {id}")))
}

/// Rewrite one rule line in another dialect. Lines that hold no rule
/// (blank, comment, out-of-scope entries) convert to nothing.
pub fn convert_rule_line(
    state: &EngineState,
    from: Dialect,
    to: Dialect,
    line: &str,
) -> CommandResult<Vec<String>> {
    let loaded = state.require_run()?;
    match parser::parse_line(from, 1, line, &loaded.game.catalog) {
        ParseOutcome::Rules(rules) => rules
            .iter()
            .map(|rule| rule.render(to).map_err(CommandError::from))
            .collect(),
        ParseOutcome::Unparseable(reason) => Err(CommandError::Engine(reason)),
        ParseOutcome::Ignored(_) => Ok(Vec::new()),
    }
}

#[cfg(test)]
#[path = "tests/distribution_cmds_tests.rs"]
mod tests;
