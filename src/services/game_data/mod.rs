//! Game-data collaborator: NPC records, referenced forms, and lookups.

pub mod catalog;
pub mod population;
pub mod records;

pub use catalog::{FormCatalog, FormRef, FormResolver, ResolveStage, FILTER_STAGES};
pub use population::{MatchProfile, NpcPopulation};
pub use records::{
    EntityId, FactionMembership, FormKind, FormLink, FormRecord, NpcRecord, NpcTraits,
};

use crate::types::errors::{EngineError, EngineResult};
use serde::Deserialize;
use std::path::Path;

/// JSON hand-off from the game-data loader.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub forms: Vec<FormRecord>,
    #[serde(default)]
    pub npcs: Vec<NpcRecord>,
}

impl GameSnapshot {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::MissingPath(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_json(&contents)
    }
}

/// Population plus resolver, the two read-only inputs every engine pass needs.
#[derive(Debug, Clone, Default)]
pub struct GameData {
    pub population: NpcPopulation,
    pub catalog: FormCatalog,
}

impl GameData {
    pub fn new(npcs: Vec<NpcRecord>, forms: Vec<FormRecord>, plugins: &[String]) -> Self {
        let catalog = FormCatalog::new(forms, &npcs, plugins);
        Self {
            population: NpcPopulation::new(npcs),
            catalog,
        }
    }
}

impl From<GameSnapshot> for GameData {
    fn from(snapshot: GameSnapshot) -> Self {
        log::info!(
            "Game snapshot: {} NPCs, {} forms, {} plugins",
            snapshot.npcs.len(),
            snapshot.forms.len(),
            snapshot.plugins.len()
        );
        GameData::new(snapshot.npcs, snapshot.forms, &snapshot.plugins)
    }
}
