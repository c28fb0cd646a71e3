//! SPID `_DISTR.ini` grammar.
//!
//! `Type = target|strings|forms|levels|traits|extra|chance`, trailing fields
//! optional, interior gaps filled with `NONE`. Filter fields use `,` between
//! alternatives and `+` inside one; `-` negates and `*` marks a substring match.

use super::{is_placeholder, LineKind, ParseOutcome, PLACEHOLDER};
use crate::services::distribution::filter::{
    FilterExpression, FilterPart, FilterSet, FormFilter, LevelClause, LevelFilter, RuleFilters,
    StringFilter, TextLiteral, TraitFilter,
};
use crate::services::distribution::rule::{Dialect, DistributionRule, OutfitSlot, RuleTarget};
use crate::services::game_data::{FormKind, FormRef, FormResolver};
use regex::Regex;
use std::sync::LazyLock;

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)\s*=\s*(.*)$").expect("valid SPID entry regex")
});
static SKILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*\(\s*(\d*)\s*(?:/\s*(\d*)\s*)?\)$").expect("valid skill regex")
});
static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*)\s*(?:/\s*(\d*))?$").expect("valid level regex"));

const MAX_FIELDS: usize = 7;

/// Distribution types SPID understands that do not touch outfits.
const OUT_OF_SCOPE_TYPES: &[&str] = &[
    "spell",
    "perk",
    "item",
    "shout",
    "levspell",
    "package",
    "faction",
    "deathitem",
    "skin",
    "exclusivegroup",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryType {
    Outfit(OutfitSlot),
    Keyword,
}

impl EntryType {
    fn name(self) -> &'static str {
        match self {
            EntryType::Outfit(OutfitSlot::Default) => "Outfit",
            EntryType::Outfit(OutfitSlot::Sleep) => "SleepOutfit",
            EntryType::Keyword => "Keyword",
        }
    }
}

pub fn parse_rule_line(
    line_number: usize,
    text: &str,
    resolver: &dyn FormResolver,
) -> ParseOutcome {
    let Some(caps) = ENTRY_RE.captures(text) else {
        return ParseOutcome::Unparseable("expected `Type = value`".to_string());
    };

    let entry_type = match caps[1].to_ascii_lowercase().as_str() {
        "outfit" => EntryType::Outfit(OutfitSlot::Default),
        "sleepoutfit" => EntryType::Outfit(OutfitSlot::Sleep),
        "keyword" => EntryType::Keyword,
        other if OUT_OF_SCOPE_TYPES.contains(&other) => {
            return ParseOutcome::Ignored(LineKind::KeyValue)
        }
        _ => {
            return ParseOutcome::Unparseable(format!(
                "unknown distribution type `{}`",
                &caps[1]
            ))
        }
    };

    match build_rule(line_number, text, entry_type, caps[2].trim(), resolver) {
        Ok(rule) => ParseOutcome::Rules(vec![rule]),
        Err(reason) => ParseOutcome::Unparseable(reason),
    }
}

fn build_rule(
    line_number: usize,
    text: &str,
    entry_type: EntryType,
    value: &str,
    resolver: &dyn FormResolver,
) -> Result<DistributionRule, String> {
    let fields: Vec<&str> = value.split('|').map(str::trim).collect();
    if fields.len() > MAX_FIELDS {
        return Err(format!(
            "too many fields ({}, at most {MAX_FIELDS})",
            fields.len()
        ));
    }
    let field = |idx: usize| fields.get(idx).copied().filter(|f| !is_placeholder(f));

    let target_text = field(0).ok_or_else(|| "missing distribution target".to_string())?;
    let target = match entry_type {
        EntryType::Outfit(slot) => {
            let outfit = resolver
                .resolve_kind(target_text, FormKind::Outfit)
                .ok_or_else(|| format!("outfit `{target_text}` could not be resolved"))?;
            RuleTarget::Outfit { slot, outfit }
        }
        EntryType::Keyword => RuleTarget::Keyword {
            tag: keyword_tag(target_text, resolver),
        },
    };

    let strings = match field(1) {
        Some(raw) => parse_string_filters(raw)?,
        None => StringFilter::default(),
    };
    let forms = match field(2) {
        Some(raw) => parse_form_filters(raw, resolver)?,
        None => FormFilter::default(),
    };
    let levels = match field(3) {
        Some(raw) => parse_level_filters(raw)?,
        None => LevelFilter::default(),
    };
    let traits = match field(4) {
        Some(raw) => parse_traits(raw)?,
        None => TraitFilter::default(),
    };
    let extra = field(5).map(ToString::to_string);
    let chance = field(6).map(parse_chance).transpose()?;

    Ok(DistributionRule {
        dialect: Dialect::Spid,
        line_number,
        raw: text.to_string(),
        target,
        filters: RuleFilters {
            strings,
            forms,
            levels,
            traits,
        },
        chance,
        extra,
    })
}

/// Keyword targets are created on demand; existing keywords keep their editor id.
fn keyword_tag(text: &str, resolver: &dyn FormResolver) -> String {
    match resolver.resolve_kind(text, FormKind::Keyword) {
        Some(FormRef::Form {
            editor_id: Some(edid),
            ..
        }) => edid,
        _ => text.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawPart<'a> {
    text: &'a str,
    negated: bool,
    wildcard: bool,
}

/// Split a filter field into OR-alternatives of AND-parts.
fn split_filter_field(field: &str) -> Result<Vec<Vec<RawPart<'_>>>, String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|alternative| !alternative.is_empty())
        .map(|alternative| {
            alternative
                .split('+')
                .map(|token| parse_raw_part(token.trim()))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}

fn parse_raw_part(token: &str) -> Result<RawPart<'_>, String> {
    let (negated, rest) = match token.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, token),
    };
    let mut text = rest;
    let mut wildcard = false;
    if let Some(stripped) = text.strip_prefix('*') {
        text = stripped;
        wildcard = true;
    }
    if let Some(stripped) = text.strip_suffix('*') {
        text = stripped;
        wildcard = true;
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(format!("empty filter value in `{token}`"));
    }
    Ok(RawPart {
        text,
        negated,
        wildcard,
    })
}

pub fn parse_string_filters(field: &str) -> Result<StringFilter, String> {
    let expressions = split_filter_field(field)?
        .into_iter()
        .map(|parts| {
            FilterExpression::new(
                parts
                    .into_iter()
                    .map(|raw| FilterPart {
                        value: TextLiteral::new(raw.text),
                        negated: raw.negated,
                        wildcard: raw.wildcard,
                    })
                    .collect(),
            )
        })
        .collect();
    Ok(FilterSet::new(expressions))
}

/// Unresolved literals are dropped; the field fails only when nothing resolves.
pub fn parse_form_filters(field: &str, resolver: &dyn FormResolver) -> Result<FormFilter, String> {
    let alternatives = split_filter_field(field)?;
    let mut total = 0usize;
    let mut unresolved = Vec::new();
    let mut expressions = Vec::new();

    for parts in alternatives {
        let mut resolved_parts = Vec::with_capacity(parts.len());
        for raw in parts {
            total += 1;
            if raw.wildcard {
                return Err(format!(
                    "wildcard `{}` is only valid in string filters",
                    raw.text
                ));
            }
            match resolver.resolve_filter(raw.text) {
                Some(reference) => resolved_parts.push(FilterPart {
                    value: reference,
                    negated: raw.negated,
                    wildcard: false,
                }),
                None => unresolved.push(raw.text.to_string()),
            }
        }
        expressions.push(FilterExpression::new(resolved_parts));
    }

    if total > 0 && unresolved.len() == total {
        return Err(format!(
            "none of the form filters could be resolved: {}",
            unresolved.join(", ")
        ));
    }
    if !unresolved.is_empty() {
        log::debug!(
            "Dropping unresolved form filters: {}",
            unresolved.join(", ")
        );
    }
    Ok(FilterSet::new(expressions))
}

pub fn parse_level_filters(field: &str) -> Result<LevelFilter, String> {
    let mut clauses = Vec::new();
    for clause in field.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(caps) = SKILL_RE.captures(clause) {
            // Digits only, so the parse fails on overflow alone.
            let index: u32 = caps[1].parse().unwrap_or(u32::MAX);
            let min = parse_bound(caps.get(2).map(|m| m.as_str()), clause)?.unwrap_or(0);
            let max = parse_bound(caps.get(3).map(|m| m.as_str()), clause)?;
            clauses.push(LevelClause::skill(index, min, max));
            continue;
        }
        if let Some(caps) = LEVEL_RE.captures(clause) {
            let min = parse_bound(caps.get(1).map(|m| m.as_str()), clause)?;
            let max = parse_bound(caps.get(2).map(|m| m.as_str()), clause)?;
            if min.is_none() && max.is_none() {
                return Err(format!("invalid level filter `{clause}`"));
            }
            clauses.push(LevelClause::level(min.unwrap_or(0), max));
            continue;
        }
        return Err(format!("invalid level filter `{clause}`"));
    }
    Ok(LevelFilter { clauses })
}

fn parse_bound(raw: Option<&str>, clause: &str) -> Result<Option<u16>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(digits) => digits
            .parse()
            .map(Some)
            .map_err(|_| format!("number out of range in `{clause}`")),
        None => Ok(None),
    }
}

pub fn parse_traits(field: &str) -> Result<TraitFilter, String> {
    let mut traits = TraitFilter::default();
    for token in field.split('/').map(str::trim).filter(|t| !t.is_empty()) {
        let (negated, flag) = match token.strip_prefix('-') {
            Some(rest) => (true, rest.trim()),
            None => (false, token),
        };
        let (slot, value) = match (flag.to_ascii_uppercase().as_str(), negated) {
            ("F", false) => (&mut traits.female, true),
            ("M", false) => (&mut traits.female, false),
            ("U", _) => (&mut traits.unique, !negated),
            ("S", _) => (&mut traits.summonable, !negated),
            ("C", _) => (&mut traits.child, !negated),
            ("L", _) => (&mut traits.leveled, !negated),
            _ => return Err(format!("unknown trait filter `{token}`")),
        };
        if slot.is_some_and(|existing| existing != value) {
            return Err(format!("conflicting trait filter `{token}`"));
        }
        *slot = Some(value);
    }
    Ok(traits)
}

fn parse_chance(raw: &str) -> Result<u8, String> {
    let value: f32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid chance `{raw}`"))?;
    if !(value > 0.0 && value <= 100.0) {
        return Err(format!("chance `{raw}` must be between 1 and 100"));
    }
    Ok(value.round().clamp(1.0, 100.0) as u8)
}

// ─── Rendering ─────────────────────────────────────────────────────

fn render_parts<T>(set: &FilterSet<T>, literal: impl Fn(&T) -> String) -> Option<String> {
    if set.expressions.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = set
        .expressions
        .iter()
        .map(|expression| {
            expression
                .parts
                .iter()
                .map(|part| {
                    let mut text = String::new();
                    if part.negated {
                        text.push('-');
                    }
                    text.push_str(&literal(&part.value));
                    if part.wildcard {
                        text.push('*');
                    }
                    text
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect();
    Some(alternatives.join(","))
}

pub fn render_traits(traits: &TraitFilter) -> String {
    let mut flags = Vec::new();
    if let Some(female) = traits.female {
        flags.push(if female { "F" } else { "M" });
    }
    let toggles = [
        (traits.unique, "U", "-U"),
        (traits.summonable, "S", "-S"),
        (traits.child, "C", "-C"),
        (traits.leveled, "L", "-L"),
    ];
    for (value, on, off) in toggles {
        if let Some(value) = value {
            flags.push(if value { on } else { off });
        }
    }
    flags.join("/")
}

pub fn render_rule(rule: &DistributionRule) -> String {
    let (entry_type, target) = match &rule.target {
        RuleTarget::Outfit { slot, outfit } => (EntryType::Outfit(*slot), outfit.spid_literal()),
        RuleTarget::Keyword { tag } => (EntryType::Keyword, tag.clone()),
    };
    let filters = &rule.filters;

    let mut fields = vec![
        Some(target),
        render_parts(&filters.strings, |v| v.text().to_string()),
        render_parts(&filters.forms, FormRef::spid_literal),
        (!filters.levels.is_empty()).then(|| {
            filters
                .levels
                .clauses
                .iter()
                .map(LevelClause::render)
                .collect::<Vec<_>>()
                .join(",")
        }),
        (!filters.traits.is_empty()).then(|| render_traits(&filters.traits)),
        rule.extra.clone(),
        rule.chance.map(|chance| chance.to_string()),
    ];

    while fields.len() > 1 && fields.last().is_some_and(Option::is_none) {
        fields.pop();
    }
    let value = fields
        .into_iter()
        .map(|field| field.unwrap_or_else(|| PLACEHOLDER.to_string()))
        .collect::<Vec<_>>()
        .join("|");

    format!("{} = {}", entry_type.name(), value)
}

#[cfg(test)]
#[path = "tests/spid_tests.rs"]
mod tests;
