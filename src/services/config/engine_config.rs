use crate::services::distribution::rule::Dialect;
use crate::types::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine settings. Every field has a default, so a partial JSON file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// File-name suffix that marks a SPID rule file.
    pub spid_suffix: String,
    /// SkyPatcher NPC rule directory, relative to the data directory.
    pub skypatcher_dir: PathBuf,
    /// File inside the SkyPatcher directory that is never a rule file.
    pub reserved_file_name: String,
    /// Character prepended to suggested file names to push them later in load order.
    pub priority_marker: char,
    /// Evaluate characters on the rayon pool.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spid_suffix: "_DISTR.ini".to_string(),
            skypatcher_dir: PathBuf::from("SKSE/Plugins/SkyPatcher/npc"),
            reserved_file_name: "SkyPatcher.ini".to_string(),
            priority_marker: 'Z',
            parallel: true,
        }
    }
}

impl EngineConfig {
    /// Extension a new file of this dialect must keep.
    pub fn required_suffix(&self, dialect: Dialect) -> &str {
        match dialect {
            Dialect::Spid => &self.spid_suffix,
            Dialect::SkyPatcher => ".ini",
        }
    }

    fn validate(self) -> Result<Self, String> {
        if self.spid_suffix.trim().is_empty() {
            return Err("spidSuffix must not be empty".to_string());
        }
        if !self.priority_marker.is_ascii_alphanumeric() {
            return Err(format!(
                "priorityMarker '{}' must be an ASCII letter or digit",
                self.priority_marker
            ));
        }
        Ok(self)
    }
}

pub fn parse_config(json: &str) -> EngineResult<EngineConfig> {
    serde_json::from_str::<EngineConfig>(json)
        .map_err(|e| e.to_string())
        .and_then(EngineConfig::validate)
        .map_err(EngineError::Config)
}

/// Load from a JSON file, falling back to defaults when missing or corrupt.
pub fn load_config(path: &Path) -> EngineConfig {
    log::info!("Loading engine config from: {}", path.display());

    match std::fs::read_to_string(path) {
        Ok(contents) => match parse_config(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Could not use engine config {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                EngineConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "Engine config not found at {}: {}. Using defaults.",
                path.display(),
                e
            );
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
#[path = "tests/engine_config_tests.rs"]
mod tests;
