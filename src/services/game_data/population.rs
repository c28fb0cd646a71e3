//! Immutable NPC population with precomputed string-match data.

use super::records::{EntityId, NpcRecord};
use std::collections::{HashMap, HashSet};

/// Lower-cased text an NPC can be matched on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchProfile {
    /// Exact-match keys: name, editor id, faction and keyword editor ids.
    pub keys: HashSet<String>,
    /// Substring targets: name, editor id, template, faction and keyword editor ids.
    pub haystack: Vec<String>,
}

impl MatchProfile {
    pub fn build(npc: &NpcRecord) -> Self {
        let mut keys = HashSet::new();
        let mut haystack = Vec::new();

        let mut push = |text: &str, as_key: bool| {
            let folded = text.to_lowercase();
            if folded.is_empty() {
                return;
            }
            if as_key {
                keys.insert(folded.clone());
            }
            if !haystack.contains(&folded) {
                haystack.push(folded);
            }
        };

        if let Some(name) = &npc.name {
            push(name, true);
        }
        if let Some(edid) = &npc.editor_id {
            push(edid, true);
        }
        if let Some(template) = &npc.template {
            push(template, false);
        }
        let group_tags = npc
            .factions
            .iter()
            .filter_map(|membership| membership.faction.editor_id.as_deref())
            .chain(
                npc.keywords
                    .iter()
                    .filter_map(|link| link.editor_id.as_deref()),
            );
        for tag in group_tags {
            push(tag, true);
        }

        Self { keys, haystack }
    }
}

/// The character population, built once per load.
#[derive(Debug, Clone, Default)]
pub struct NpcPopulation {
    npcs: Vec<NpcRecord>,
    profiles: Vec<MatchProfile>,
    by_id: HashMap<EntityId, usize>,
    by_editor_id: HashMap<String, usize>,
}

impl NpcPopulation {
    pub fn new(npcs: Vec<NpcRecord>) -> Self {
        let profiles = npcs.iter().map(MatchProfile::build).collect();
        let mut by_id = HashMap::with_capacity(npcs.len());
        let mut by_editor_id = HashMap::new();
        for (index, npc) in npcs.iter().enumerate() {
            by_id.entry(npc.id.clone()).or_insert(index);
            if let Some(edid) = &npc.editor_id {
                by_editor_id.entry(edid.to_lowercase()).or_insert(index);
            }
        }
        Self {
            npcs,
            profiles,
            by_id,
            by_editor_id,
        }
    }

    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }

    pub fn npcs(&self) -> &[NpcRecord] {
        &self.npcs
    }

    pub fn get(&self, index: usize) -> Option<&NpcRecord> {
        self.npcs.get(index)
    }

    pub fn profile(&self, index: usize) -> &MatchProfile {
        &self.profiles[index]
    }

    pub fn index_of(&self, id: &EntityId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn index_of_editor_id(&self, editor_id: &str) -> Option<usize> {
        self.by_editor_id.get(&editor_id.to_lowercase()).copied()
    }
}

#[cfg(test)]
#[path = "tests/population_tests.rs"]
mod tests;
