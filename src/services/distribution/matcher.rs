//! Filter evaluation against one character.
//!
//! Everything here is a pure function of borrowed, immutable inputs and is
//! safe to call from any number of rayon workers at once.

use super::filter::{FormFilter, LevelClause, LevelFilter, RuleFilters, StringFilter, TraitFilter};
use super::keywords::VirtualTags;
use super::rule::DistributionRule;
use crate::services::game_data::{FormLink, FormRef, MatchProfile, NpcPopulation, NpcRecord};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;

/// One character as seen by the matcher: record, precomputed text, and any
/// tags assigned by simulated keyword rules.
#[derive(Debug, Clone, Copy)]
pub struct MatchSubject<'a> {
    pub npc: &'a NpcRecord,
    pub profile: &'a MatchProfile,
    pub virtual_tags: Option<&'a HashSet<String>>,
}

impl<'a> MatchSubject<'a> {
    pub fn new(
        npc: &'a NpcRecord,
        profile: &'a MatchProfile,
        virtual_tags: Option<&'a HashSet<String>>,
    ) -> Self {
        Self {
            npc,
            profile,
            virtual_tags,
        }
    }

    pub fn from_population(
        population: &'a NpcPopulation,
        index: usize,
        virtual_tags: Option<&'a HashSet<String>>,
    ) -> Option<Self> {
        let npc = population.get(index)?;
        Some(Self::new(npc, population.profile(index), virtual_tags))
    }

    fn has_key(&self, folded: &str) -> bool {
        self.profile.keys.contains(folded)
            || self
                .virtual_tags
                .is_some_and(|tags| tags.contains(folded))
    }

    fn contains_text(&self, folded: &str) -> bool {
        self.profile
            .haystack
            .iter()
            .any(|text| text.contains(folded))
            || self
                .virtual_tags
                .is_some_and(|tags| tags.iter().any(|tag| tag.contains(folded)))
    }
}

/// All four categories must hold.
pub fn matches(subject: &MatchSubject<'_>, filters: &RuleFilters) -> bool {
    matches_traits(subject.npc, &filters.traits)
        && matches_levels(subject.npc, &filters.levels)
        && matches_forms(subject.npc, &filters.forms)
        && matches_strings(subject, &filters.strings)
}

/// Case-insensitive. Exact parts check match keys; wildcard parts check
/// substrings of name, editor id, template and group tags.
pub fn matches_strings(subject: &MatchSubject<'_>, filter: &StringFilter) -> bool {
    filter.evaluate(|part| {
        let folded = part.value.folded();
        if part.wildcard {
            subject.contains_text(folded)
        } else {
            subject.has_key(folded)
        }
    })
}

pub fn matches_forms(npc: &NpcRecord, filter: &FormFilter) -> bool {
    filter.evaluate(|part| form_match_slot(npc, &part.value).is_some())
}

pub fn matches_levels(npc: &NpcRecord, filter: &LevelFilter) -> bool {
    filter.clauses.iter().all(|clause| level_clause_holds(npc, clause))
}

fn level_clause_holds(npc: &NpcRecord, clause: &LevelClause) -> bool {
    match clause.attribute {
        None => clause.contains(npc.level),
        Some(index) if LevelClause::is_checked_attribute(index) => u8::try_from(index)
            .map_or(true, |skill| clause.contains(npc.skill(skill))),
        // Out-of-range attribute indices never constrain.
        Some(_) => true,
    }
}

pub fn matches_traits(npc: &NpcRecord, filter: &TraitFilter) -> bool {
    let traits = &npc.traits;
    let holds = |wanted: Option<bool>, actual: bool| wanted.map_or(true, |w| w == actual);
    holds(filter.female, traits.female)
        && holds(filter.unique, traits.unique)
        && holds(filter.summonable, traits.summonable)
        && holds(filter.child, traits.child)
        && holds(filter.leveled, traits.leveled)
}

/// Where on a character a form reference matched, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum FormSlot {
    Own,
    Race,
    Class,
    DefaultOutfit,
    CombatStyle,
    VoiceType,
    SourcePlugin,
    Faction,
    Keyword,
}

/// First slot holding `reference`, or `None` when the character lacks it.
pub fn form_match_slot(npc: &NpcRecord, reference: &FormRef) -> Option<FormSlot> {
    let key = match reference {
        FormRef::Plugin { name } => {
            let from_plugin = npc.source_plugin.eq_ignore_ascii_case(name)
                || npc.id.plugin.eq_ignore_ascii_case(name);
            return from_plugin.then_some(FormSlot::SourcePlugin);
        }
        FormRef::Form { key, .. } => key,
    };

    let linked = |link: &Option<FormLink>| link.as_ref().is_some_and(|l| &l.key == key);

    if &npc.id == key {
        Some(FormSlot::Own)
    } else if linked(&npc.race) {
        Some(FormSlot::Race)
    } else if linked(&npc.class) {
        Some(FormSlot::Class)
    } else if linked(&npc.default_outfit) {
        Some(FormSlot::DefaultOutfit)
    } else if linked(&npc.combat_style) {
        Some(FormSlot::CombatStyle)
    } else if linked(&npc.voice_type) {
        Some(FormSlot::VoiceType)
    } else if npc.factions.iter().any(|m| &m.faction.key == key) {
        Some(FormSlot::Faction)
    } else if npc.keywords.iter().any(|l| &l.key == key) {
        Some(FormSlot::Keyword)
    } else {
        None
    }
}

/// Population indices the rule matches, ascending.
pub fn matching_indices(
    population: &NpcPopulation,
    tags: &VirtualTags,
    rule: &DistributionRule,
    parallel: bool,
) -> Vec<usize> {
    let check = |index: usize| {
        MatchSubject::from_population(population, index, tags.get(index))
            .is_some_and(|subject| matches(&subject, &rule.filters))
    };
    if parallel {
        (0..population.len())
            .into_par_iter()
            .filter(|&index| check(index))
            .collect()
    } else {
        (0..population.len()).filter(|&index| check(index)).collect()
    }
}

#[cfg(test)]
#[path = "tests/matcher_tests.rs"]
mod tests;
