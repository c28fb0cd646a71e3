//! Read-only game records consumed by the distribution engine.
//!
//! The game-data loader builds these once per load; the engine never mutates
//! them. Everything here is serde-friendly so a snapshot can be handed over as
//! JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Plugin file extensions that identify a source-file literal.
pub const PLUGIN_EXTENSIONS: &[&str] = &[".esp", ".esm", ".esl"];

/// Two-part record identifier: `{source-file, local-id}`.
///
/// The plugin half compares case-insensitively, matching how the game treats
/// file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    pub plugin: String,
    pub local_id: u32,
}

impl EntityId {
    pub fn new(plugin: impl Into<String>, local_id: u32) -> Self {
        Self {
            plugin: plugin.into(),
            local_id,
        }
    }

    /// Parse either `0x800~Plugin.esp` or `Plugin.esp|0x800`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some((id, plugin)) = text.split_once('~') {
            return Self::from_parts(plugin, id);
        }
        if let Some((plugin, id)) = text.split_once('|') {
            return Self::from_parts(plugin, id);
        }
        None
    }

    fn from_parts(plugin: &str, id: &str) -> Option<Self> {
        let plugin = plugin.trim();
        if !is_plugin_name(plugin) {
            return None;
        }
        let id = id.trim();
        let digits = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .unwrap_or(id);
        if digits.is_empty() {
            return None;
        }
        let local_id = u32::from_str_radix(digits, 16).ok()?;
        Some(Self::new(plugin, local_id))
    }

    /// SPID spelling: `0x800~Plugin.esp`.
    pub fn to_spid(&self) -> String {
        format!("0x{:X}~{}", self.local_id, self.plugin)
    }

    /// SkyPatcher spelling: `Plugin.esp|0x800`.
    pub fn to_skypatcher(&self) -> String {
        format!("{}|0x{:X}", self.plugin, self.local_id)
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.local_id == other.local_id && self.plugin.eq_ignore_ascii_case(&other.plugin)
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.local_id.hash(state);
        for byte in self.plugin.bytes() {
            byte.to_ascii_lowercase().hash(state);
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_skypatcher())
    }
}

impl TryFrom<String> for EntityId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EntityId::parse(&value).ok_or_else(|| format!("Invalid form key: {value}"))
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.to_skypatcher()
    }
}

/// Whether `text` looks like a plugin file name.
pub fn is_plugin_name(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.len() > 4 && PLUGIN_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Record types a typed reference can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormKind {
    Npc,
    Faction,
    Race,
    Class,
    CombatStyle,
    Outfit,
    VoiceType,
    Keyword,
}

impl FormKind {
    pub fn label(self) -> &'static str {
        match self {
            FormKind::Npc => "NPC",
            FormKind::Faction => "faction",
            FormKind::Race => "race",
            FormKind::Class => "class",
            FormKind::CombatStyle => "combat style",
            FormKind::Outfit => "outfit",
            FormKind::VoiceType => "voice type",
            FormKind::Keyword => "keyword",
        }
    }
}

/// Pointer from an NPC to another record, carrying its editor id when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormLink {
    pub key: EntityId,
    #[serde(default)]
    pub editor_id: Option<String>,
}

impl FormLink {
    pub fn new(key: EntityId, editor_id: Option<&str>) -> Self {
        Self {
            key,
            editor_id: editor_id.map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactionMembership {
    pub faction: FormLink,
    #[serde(default)]
    pub rank: i8,
}

/// The five boolean traits rules can filter on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NpcTraits {
    pub female: bool,
    pub unique: bool,
    pub summonable: bool,
    pub child: bool,
    pub leveled: bool,
}

/// One matchable character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcRecord {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub editor_id: Option<String>,
    /// Plugin that provides the winning version of this record.
    pub source_plugin: String,
    #[serde(default)]
    pub factions: Vec<FactionMembership>,
    #[serde(default)]
    pub keywords: Vec<FormLink>,
    #[serde(default)]
    pub race: Option<FormLink>,
    #[serde(default)]
    pub class: Option<FormLink>,
    #[serde(default)]
    pub default_outfit: Option<FormLink>,
    #[serde(default)]
    pub sleep_outfit: Option<FormLink>,
    #[serde(default)]
    pub combat_style: Option<FormLink>,
    #[serde(default)]
    pub voice_type: Option<FormLink>,
    /// Editor id of the template this NPC inherits from, if any.
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub level: u16,
    /// Actor-value index to value.
    #[serde(default)]
    pub skills: BTreeMap<u8, u16>,
    #[serde(default)]
    pub traits: NpcTraits,
}

impl NpcRecord {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.editor_id.clone())
            .unwrap_or_else(|| self.id.to_string())
    }

    pub fn skill(&self, index: u8) -> u16 {
        self.skills.get(&index).copied().unwrap_or(0)
    }
}

/// Any non-NPC record the resolver can point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRecord {
    pub key: EntityId,
    pub kind: FormKind,
    #[serde(default)]
    pub editor_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
