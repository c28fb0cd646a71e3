//! Parsed distribution rules, shared by both dialects.

use super::filter::{FilterUsage, RuleFilters};
use super::parser::{skypatcher, spid};
use crate::services::game_data::{EntityId, FormRef};
use crate::types::errors::EngineResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule-file grammar. Ordering follows priority tier: SkyPatcher loads under SPID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dialect {
    SkyPatcher,
    Spid,
}

impl Dialect {
    /// Baseline game data is tier 0.
    pub fn tier(self) -> u8 {
        match self {
            Dialect::SkyPatcher => 1,
            Dialect::Spid => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dialect::SkyPatcher => "SkyPatcher",
            Dialect::Spid => "SPID",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutfitSlot {
    #[default]
    Default,
    Sleep,
}

/// What a rule assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleTarget {
    Outfit { slot: OutfitSlot, outfit: FormRef },
    /// Virtual tag visible to later rules' string filters.
    Keyword { tag: String },
}

impl RuleTarget {
    pub fn outfit_key(&self) -> Option<&EntityId> {
        match self {
            RuleTarget::Outfit { outfit, .. } => outfit.key(),
            RuleTarget::Keyword { .. } => None,
        }
    }

    pub fn slot(&self) -> Option<OutfitSlot> {
        match self {
            RuleTarget::Outfit { slot, .. } => Some(*slot),
            RuleTarget::Keyword { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            RuleTarget::Outfit { slot, outfit } => match slot {
                OutfitSlot::Default => outfit.describe(),
                OutfitSlot::Sleep => format!("sleep {}", outfit.describe()),
            },
            RuleTarget::Keyword { tag } => format!("keyword {tag}"),
        }
    }
}

/// One conditional assignment, created from one source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRule {
    pub dialect: Dialect,
    pub line_number: usize,
    pub raw: String,
    pub target: RuleTarget,
    pub filters: RuleFilters,
    /// 1..=100; `None` means certain.
    pub chance: Option<u8>,
    /// SPID's sixth field (count or package index), kept verbatim.
    pub extra: Option<String>,
}

impl DistributionRule {
    pub fn is_certain(&self) -> bool {
        self.chance.map_or(true, |chance| chance >= 100)
    }

    pub fn usage(&self) -> FilterUsage {
        self.filters.usage()
    }

    pub fn is_outfit_for(&self, slot: OutfitSlot) -> bool {
        self.target.slot() == Some(slot)
    }

    /// Human-readable summary of who the rule targets.
    pub fn describe_targeting(&self) -> String {
        let filters = &self.filters;
        if filters.is_unfiltered() {
            return "all NPCs".to_string();
        }

        let mut pieces = Vec::new();
        let strings: Vec<String> = filters
            .strings
            .included()
            .map(|part| {
                if part.wildcard {
                    format!("*{}*", part.value.text())
                } else {
                    part.value.text().to_string()
                }
            })
            .collect();
        if !strings.is_empty() {
            pieces.push(format!("names/tags {}", strings.join(", ")));
        }
        let forms: Vec<String> = filters
            .forms
            .included()
            .map(|part| part.value.describe())
            .collect();
        if !forms.is_empty() {
            pieces.push(forms.join(", "));
        }
        let excluded = filters.strings.excluded().count() + filters.forms.excluded().count();
        if excluded > 0 {
            pieces.push(format!("{excluded} exclusion(s)"));
        }
        if !filters.levels.is_empty() {
            let levels: Vec<String> = filters.levels.clauses.iter().map(|c| c.render()).collect();
            pieces.push(format!("levels {}", levels.join(",")));
        }
        if !filters.traits.is_empty() {
            pieces.push(format!("traits {}", spid::render_traits(&filters.traits)));
        }
        pieces.join("; ")
    }

    /// Rebuild the rule as a line of the given dialect.
    pub fn render(&self, dialect: Dialect) -> EngineResult<String> {
        match dialect {
            Dialect::Spid => Ok(spid::render_rule(self)),
            Dialect::SkyPatcher => skypatcher::render_rule(self),
        }
    }
}

/// Problem with one line that kept it from becoming a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDiagnostic {
    pub line_number: usize,
    pub raw: String,
    pub reason: String,
}
