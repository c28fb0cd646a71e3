use anyhow::Context;
use commands::distribution_cmds::{cancel_distribution_pass, resolve_distributions, EngineState};
use services::distribution::OutfitSlot;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use types::distribution::EngineRequest;

pub mod commands;
pub mod services;
pub mod types;
#[cfg(test)]
pub mod test_utils;

/// Game data directory holding the rule files.
pub const ENV_DATA_DIR: &str = "OUTFITDIST_DATA_DIR";
/// Game snapshot JSON exported by the game-data loader.
pub const ENV_SNAPSHOT: &str = "OUTFITDIST_SNAPSHOT";
/// Optional engine config JSON.
pub const ENV_CONFIG: &str = "OUTFITDIST_CONFIG";
/// `sleep` resolves sleep outfits instead of default outfits.
pub const ENV_SLOT: &str = "OUTFITDIST_SLOT";

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();
}

fn request_from_env() -> anyhow::Result<EngineRequest> {
    let data_dir =
        env::var(ENV_DATA_DIR).with_context(|| format!("{ENV_DATA_DIR} is not set"))?;
    let snapshot =
        env::var(ENV_SNAPSHOT).with_context(|| format!("{ENV_SNAPSHOT} is not set"))?;
    let slot = match env::var(ENV_SLOT) {
        Ok(value) if value.eq_ignore_ascii_case("sleep") => OutfitSlot::Sleep,
        _ => OutfitSlot::Default,
    };
    Ok(EngineRequest {
        data_dir: PathBuf::from(data_dir),
        snapshot_path: PathBuf::from(snapshot),
        config_path: env::var(ENV_CONFIG).ok().map(PathBuf::from),
        slot,
    })
}

/// Resolve every rule file under the configured data directory and print the
/// result as JSON. Ctrl-C cancels the pass.
pub async fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let request = request_from_env()?;
    log::info!("Resolving distributions under {}", request.data_dir.display());

    let state = Arc::new(EngineState::new());
    let interrupt = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel_distribution_pass(&state);
            }
        })
    };
    let result = resolve_distributions(&state, request).await;
    interrupt.abort();

    let summary = result.context("Engine pass failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
