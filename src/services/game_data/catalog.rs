//! Reference resolution: literals from rule text to typed records.
//!
//! A literal can be a plugin name, a form key in either dialect's spelling, or
//! an editor id. Editor ids are ambiguous across record types, so resolution
//! walks an ordered chain of lookups and stops at the first hit.

use super::records::{is_plugin_name, EntityId, FormKind, FormRecord, NpcRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Order in which editor ids are tried when a filter literal has no type.
pub const FILTER_KIND_PRIORITY: [FormKind; 8] = [
    FormKind::Npc,
    FormKind::Faction,
    FormKind::Race,
    FormKind::Class,
    FormKind::CombatStyle,
    FormKind::Outfit,
    FormKind::VoiceType,
    FormKind::Keyword,
];

/// A resolved, typed reference used by form filters and rule targets.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FormRef {
    #[serde(rename_all = "camelCase")]
    Form {
        kind: FormKind,
        key: EntityId,
        editor_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Plugin { name: String },
}

impl FormRef {
    pub fn kind(&self) -> Option<FormKind> {
        match self {
            FormRef::Form { kind, .. } => Some(*kind),
            FormRef::Plugin { .. } => None,
        }
    }

    pub fn key(&self) -> Option<&EntityId> {
        match self {
            FormRef::Form { key, .. } => Some(key),
            FormRef::Plugin { .. } => None,
        }
    }

    pub fn editor_id(&self) -> Option<&str> {
        match self {
            FormRef::Form { editor_id, .. } => editor_id.as_deref(),
            FormRef::Plugin { .. } => None,
        }
    }

    /// Text to write back into a SPID field: editor id when known.
    pub fn spid_literal(&self) -> String {
        match self {
            FormRef::Form { editor_id: Some(edid), .. } => edid.clone(),
            FormRef::Form { key, .. } => key.to_spid(),
            FormRef::Plugin { name } => name.clone(),
        }
    }

    /// Text to write back into a SkyPatcher value list.
    pub fn skypatcher_literal(&self) -> String {
        match self {
            FormRef::Form { key, .. } => key.to_skypatcher(),
            FormRef::Plugin { name } => name.clone(),
        }
    }

    /// Short human label, e.g. `faction BanditFaction`.
    pub fn describe(&self) -> String {
        match self {
            FormRef::Form {
                kind,
                key,
                editor_id,
            } => match editor_id {
                Some(edid) => format!("{} {}", kind.label(), edid),
                None => format!("{} {}", kind.label(), key),
            },
            FormRef::Plugin { name } => format!("plugin {name}"),
        }
    }
}

impl PartialEq for FormRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                FormRef::Form {
                    kind: a_kind,
                    key: a_key,
                    ..
                },
                FormRef::Form {
                    kind: b_kind,
                    key: b_key,
                    ..
                },
            ) => a_kind == b_kind && a_key == b_key,
            (FormRef::Plugin { name: a }, FormRef::Plugin { name: b }) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl Eq for FormRef {}

/// Read-only resolver handed to the dialect parsers.
pub trait FormResolver: Send + Sync {
    /// Resolve an untyped filter literal, trying record kinds in priority order.
    fn resolve_filter(&self, literal: &str) -> Option<FormRef>;

    /// Resolve a literal that must be of one specific kind.
    fn resolve_kind(&self, literal: &str, kind: FormKind) -> Option<FormRef>;
}

/// One lookup tried while resolving a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStage {
    Plugin,
    /// Form key, optionally restricted to one kind.
    Key(Option<FormKind>),
    EditorId(FormKind),
}

/// Chain for untyped filter literals: plugin name, form key, then editor id
/// by kind priority. The first stage that matches wins.
pub static FILTER_STAGES: [ResolveStage; 2 + FILTER_KIND_PRIORITY.len()] = filter_stages();

const fn filter_stages() -> [ResolveStage; 2 + FILTER_KIND_PRIORITY.len()] {
    let mut stages = [ResolveStage::Plugin; 2 + FILTER_KIND_PRIORITY.len()];
    stages[1] = ResolveStage::Key(None);
    let mut i = 0;
    while i < FILTER_KIND_PRIORITY.len() {
        stages[i + 2] = ResolveStage::EditorId(FILTER_KIND_PRIORITY[i]);
        i += 1;
    }
    stages
}

/// In-memory index over every record a rule can reference.
#[derive(Debug, Clone, Default)]
pub struct FormCatalog {
    forms: HashMap<EntityId, FormRecord>,
    editor_ids: HashMap<String, Vec<EntityId>>,
    plugins: HashSet<String>,
}

impl FormCatalog {
    /// Build from explicit records plus every record the NPCs link to.
    pub fn new(forms: Vec<FormRecord>, npcs: &[NpcRecord], plugins: &[String]) -> Self {
        let mut catalog = Self::default();
        for plugin in plugins {
            catalog.plugins.insert(plugin.to_ascii_lowercase());
        }
        for form in forms {
            catalog.insert(form);
        }
        for npc in npcs {
            catalog.insert(FormRecord {
                key: npc.id.clone(),
                kind: FormKind::Npc,
                editor_id: npc.editor_id.clone(),
                name: npc.name.clone(),
            });
            catalog
                .plugins
                .insert(npc.source_plugin.to_ascii_lowercase());

            let links = npc
                .factions
                .iter()
                .map(|membership| (FormKind::Faction, &membership.faction))
                .chain(npc.keywords.iter().map(|link| (FormKind::Keyword, link)))
                .chain(npc.race.iter().map(|link| (FormKind::Race, link)))
                .chain(npc.class.iter().map(|link| (FormKind::Class, link)))
                .chain(npc.default_outfit.iter().map(|link| (FormKind::Outfit, link)))
                .chain(npc.sleep_outfit.iter().map(|link| (FormKind::Outfit, link)))
                .chain(
                    npc.combat_style
                        .iter()
                        .map(|link| (FormKind::CombatStyle, link)),
                )
                .chain(npc.voice_type.iter().map(|link| (FormKind::VoiceType, link)));

            for (kind, link) in links {
                if catalog.forms.contains_key(&link.key) {
                    continue;
                }
                catalog.insert(FormRecord {
                    key: link.key.clone(),
                    kind,
                    editor_id: link.editor_id.clone(),
                    name: None,
                });
            }
        }
        catalog
    }

    fn insert(&mut self, form: FormRecord) {
        self.plugins.insert(form.key.plugin.to_ascii_lowercase());
        if let Some(edid) = &form.editor_id {
            let ids = self.editor_ids.entry(edid.to_lowercase()).or_default();
            if !ids.contains(&form.key) {
                ids.push(form.key.clone());
            }
        }
        self.forms.insert(form.key.clone(), form);
    }

    pub fn get(&self, key: &EntityId) -> Option<&FormRecord> {
        self.forms.get(key)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains(&name.to_ascii_lowercase())
    }

    fn to_ref(form: &FormRecord) -> FormRef {
        FormRef::Form {
            kind: form.kind,
            key: form.key.clone(),
            editor_id: form.editor_id.clone(),
        }
    }

    fn lookup_plugin(&self, literal: &str) -> Option<FormRef> {
        if is_plugin_name(literal) && self.has_plugin(literal) {
            return Some(FormRef::Plugin {
                name: literal.to_string(),
            });
        }
        None
    }

    fn lookup_key(&self, literal: &str, kind: Option<FormKind>) -> Option<FormRef> {
        let key = EntityId::parse(literal)?;
        let form = self.forms.get(&key)?;
        if kind.is_some_and(|wanted| wanted != form.kind) {
            return None;
        }
        Some(Self::to_ref(form))
    }

    fn lookup_editor_id(&self, literal: &str, kind: FormKind) -> Option<FormRef> {
        self.editor_ids
            .get(&literal.to_lowercase())?
            .iter()
            .filter_map(|key| self.forms.get(key))
            .find(|form| form.kind == kind)
            .map(Self::to_ref)
    }

    fn lookup(&self, stage: ResolveStage, literal: &str) -> Option<FormRef> {
        match stage {
            ResolveStage::Plugin => self.lookup_plugin(literal),
            ResolveStage::Key(kind) => self.lookup_key(literal, kind),
            ResolveStage::EditorId(kind) => self.lookup_editor_id(literal, kind),
        }
    }

    /// Walk `stages` in order and return the first hit.
    pub fn resolve_stages(&self, stages: &[ResolveStage], literal: &str) -> Option<FormRef> {
        let literal = literal.trim();
        if literal.is_empty() {
            return None;
        }
        stages
            .iter()
            .find_map(|&stage| self.lookup(stage, literal))
    }
}

impl FormResolver for FormCatalog {
    fn resolve_filter(&self, literal: &str) -> Option<FormRef> {
        self.resolve_stages(&FILTER_STAGES, literal)
    }

    fn resolve_kind(&self, literal: &str, kind: FormKind) -> Option<FormRef> {
        self.resolve_stages(
            &[ResolveStage::Key(Some(kind)), ResolveStage::EditorId(kind)],
            literal,
        )
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
