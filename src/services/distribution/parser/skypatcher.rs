//! SkyPatcher `npc/*.ini` grammar.
//!
//! A line is `key=value` clauses joined by `:`. Filter clauses are
//! `filterByX=a,b`; an `Or` suffix turns an all-of field into any-of and an
//! `Excluded` suffix negates. The assignment itself is `outfitDefault=` or
//! `outfitSleep=`.

use super::{LineKind, ParseOutcome};
use crate::services::distribution::filter::{
    FilterPart, FilterSet, FormFilter, RuleFilters, StringFilter, TextLiteral, TraitFilter,
};
use crate::services::distribution::rule::{Dialect, DistributionRule, OutfitSlot, RuleTarget};
use crate::services::game_data::{FormKind, FormRef, FormResolver};
use crate::types::errors::{EngineError, EngineResult};

const FILTER_PREFIX: &str = "filterby";
const EXCLUDED_SUFFIX: &str = "excluded";
const OR_SUFFIX: &str = "or";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldSource {
    Form(FormKind),
    Plugin,
    EditorId,
    Gender,
}

/// How the values of the plain clause combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combine {
    /// Every value must hold; an `Or` variant exists.
    All,
    /// One value suffices.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Plain,
    Or,
    Excluded,
}

#[derive(Debug)]
struct FieldSpec {
    name: &'static str,
    source: FieldSource,
    combine: Combine,
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "Npcs",
        source: FieldSource::Form(FormKind::Npc),
        combine: Combine::Any,
    },
    FieldSpec {
        name: "Factions",
        source: FieldSource::Form(FormKind::Faction),
        combine: Combine::All,
    },
    FieldSpec {
        name: "Keywords",
        source: FieldSource::Form(FormKind::Keyword),
        combine: Combine::All,
    },
    FieldSpec {
        name: "Races",
        source: FieldSource::Form(FormKind::Race),
        combine: Combine::Any,
    },
    FieldSpec {
        name: "Classes",
        source: FieldSource::Form(FormKind::Class),
        combine: Combine::Any,
    },
    FieldSpec {
        name: "Outfits",
        source: FieldSource::Form(FormKind::Outfit),
        combine: Combine::Any,
    },
    FieldSpec {
        name: "CombatStyles",
        source: FieldSource::Form(FormKind::CombatStyle),
        combine: Combine::Any,
    },
    FieldSpec {
        name: "VoiceTypes",
        source: FieldSource::Form(FormKind::VoiceType),
        combine: Combine::Any,
    },
    FieldSpec {
        name: "ModNames",
        source: FieldSource::Plugin,
        combine: Combine::Any,
    },
    FieldSpec {
        name: "EditorIdContains",
        source: FieldSource::EditorId,
        combine: Combine::All,
    },
    FieldSpec {
        name: "Gender",
        source: FieldSource::Gender,
        combine: Combine::Any,
    },
];

fn lookup_filter_key(key: &str) -> Option<(&'static FieldSpec, Variant)> {
    let lower = key.to_ascii_lowercase();
    let base = lower.strip_prefix(FILTER_PREFIX)?;
    let find = |name: &str| FIELDS.iter().find(|f| f.name.eq_ignore_ascii_case(name));

    if let Some(field) = find(base) {
        return Some((field, Variant::Plain));
    }
    if let Some(field) = base.strip_suffix(EXCLUDED_SUFFIX).and_then(find) {
        return (field.source != FieldSource::Gender).then_some((field, Variant::Excluded));
    }
    let field = base.strip_suffix(OR_SUFFIX).and_then(find)?;
    (field.combine == Combine::All).then_some((field, Variant::Or))
}

fn outfit_slot_for_key(key: &str) -> Option<OutfitSlot> {
    if key.eq_ignore_ascii_case("outfitDefault") {
        Some(OutfitSlot::Default)
    } else if key.eq_ignore_ascii_case("outfitSleep") {
        Some(OutfitSlot::Sleep)
    } else {
        None
    }
}

fn split_values(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

/// Filters accumulated while walking a line's clauses.
#[derive(Default)]
struct ClauseAccumulator {
    strings: StringFilter,
    forms: FormFilter,
    traits: TraitFilter,
}

impl ClauseAccumulator {
    fn push_strings(&mut self, set: StringFilter) {
        self.strings = std::mem::take(&mut self.strings).and(set);
    }

    fn push_forms(&mut self, set: FormFilter) {
        self.forms = std::mem::take(&mut self.forms).and(set);
    }
}

fn combine_parts<T: Clone>(parts: Vec<FilterPart<T>>, combine: Combine, variant: Variant) -> FilterSet<T> {
    match (variant, combine) {
        (Variant::Or, _) | (Variant::Plain, Combine::Any) => FilterSet::any_of(parts),
        // Exclusions apply category-wide, so one conjunction holds them all.
        (Variant::Excluded, _) | (Variant::Plain, Combine::All) => FilterSet::all_of(parts),
    }
}

fn apply_clause(
    acc: &mut ClauseAccumulator,
    field: &FieldSpec,
    variant: Variant,
    raw_key: &str,
    value: &str,
    resolver: &dyn FormResolver,
) -> Result<(), String> {
    let values = split_values(value);
    if values.is_empty() {
        return Err(format!("`{raw_key}` has no values"));
    }
    let negated = variant == Variant::Excluded;

    match field.source {
        FieldSource::Gender => {
            let female = match values.as_slice() {
                [one] if one.eq_ignore_ascii_case("female") => true,
                [one] if one.eq_ignore_ascii_case("male") => false,
                _ => return Err(format!("`{raw_key}` expects `female` or `male`")),
            };
            acc.traits.female = Some(female);
        }
        FieldSource::EditorId => {
            let parts = values
                .into_iter()
                .map(|v| FilterPart {
                    value: TextLiteral::new(v),
                    negated,
                    wildcard: true,
                })
                .collect();
            acc.push_strings(combine_parts(parts, field.combine, variant));
        }
        FieldSource::Form(_) | FieldSource::Plugin => {
            let mut unresolved = Vec::new();
            let mut parts = Vec::with_capacity(values.len());
            for literal in values {
                let resolved = match field.source {
                    FieldSource::Form(kind) => resolver.resolve_kind(literal, kind),
                    _ => resolver
                        .resolve_filter(literal)
                        .filter(|r| matches!(r, FormRef::Plugin { .. })),
                };
                match resolved {
                    Some(reference) => parts.push(FilterPart {
                        value: reference,
                        negated,
                        wildcard: false,
                    }),
                    None => unresolved.push(literal),
                }
            }
            if parts.is_empty() {
                return Err(format!(
                    "no value of `{raw_key}` could be resolved: {}",
                    unresolved.join(", ")
                ));
            }
            if !unresolved.is_empty() {
                log::debug!(
                    "Dropping unresolved `{raw_key}` values: {}",
                    unresolved.join(", ")
                );
            }
            acc.push_forms(combine_parts(parts, field.combine, variant));
        }
    }
    Ok(())
}

pub fn parse_rule_line(
    line_number: usize,
    text: &str,
    resolver: &dyn FormResolver,
) -> ParseOutcome {
    let mut clauses = Vec::new();
    for clause in text.split(':').map(str::trim).filter(|c| !c.is_empty()) {
        match clause.split_once('=') {
            Some((key, value)) => clauses.push((key.trim(), value.trim())),
            None => return ParseOutcome::Unparseable(format!("expected `key=value` in `{clause}`")),
        }
    }

    let targets: Vec<(OutfitSlot, &str)> = clauses
        .iter()
        .filter_map(|(key, value)| outfit_slot_for_key(key).map(|slot| (slot, *value)))
        .collect();
    if targets.is_empty() {
        return ParseOutcome::Ignored(LineKind::KeyValue);
    }

    let mut acc = ClauseAccumulator::default();
    for (key, value) in &clauses {
        if outfit_slot_for_key(key).is_some() {
            continue;
        }
        if let Some((field, variant)) = lookup_filter_key(key) {
            if let Err(reason) = apply_clause(&mut acc, field, variant, key, value, resolver) {
                return ParseOutcome::Unparseable(reason);
            }
        } else if key.to_ascii_lowercase().starts_with(FILTER_PREFIX) {
            return ParseOutcome::Unparseable(format!("unknown filter `{key}`"));
        } else {
            log::debug!("Line {line_number}: ignoring non-outfit operation `{key}`");
        }
    }

    let filters = RuleFilters {
        strings: acc.strings,
        forms: acc.forms,
        traits: acc.traits,
        ..RuleFilters::default()
    };

    let mut rules = Vec::with_capacity(targets.len());
    for (slot, value) in targets {
        let Some(outfit) = resolver.resolve_kind(value, FormKind::Outfit) else {
            return ParseOutcome::Unparseable(format!("outfit `{value}` could not be resolved"));
        };
        rules.push(DistributionRule {
            dialect: Dialect::SkyPatcher,
            line_number,
            raw: text.to_string(),
            target: RuleTarget::Outfit { slot, outfit },
            filters: filters.clone(),
            chance: None,
            extra: None,
        });
    }
    ParseOutcome::Rules(rules)
}

// ─── Rendering ─────────────────────────────────────────────────────

fn unrepresentable(reason: impl Into<String>) -> EngineError {
    EngineError::Unrepresentable {
        dialect: Dialect::SkyPatcher.label().to_string(),
        reason: reason.into(),
    }
}

fn field_index_for_form(reference: &FormRef) -> usize {
    let source = match reference {
        FormRef::Form { kind, .. } => FieldSource::Form(*kind),
        FormRef::Plugin { .. } => FieldSource::Plugin,
    };
    FIELDS
        .iter()
        .position(|f| f.source == source)
        .unwrap_or(FIELDS.len())
}

fn editor_id_field_index() -> usize {
    FIELDS
        .iter()
        .position(|f| f.source == FieldSource::EditorId)
        .unwrap_or(FIELDS.len())
}

/// One filter value already reduced to the field it renders under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldValue {
    field: usize,
    literal: String,
}

/// Per-field clause values collected for output.
struct RenderedFields {
    plain: Vec<Vec<String>>,
    or: Vec<Vec<String>>,
    excluded: Vec<Vec<String>>,
}

impl RenderedFields {
    fn new() -> Self {
        Self {
            plain: vec![Vec::new(); FIELDS.len()],
            or: vec![Vec::new(); FIELDS.len()],
            excluded: vec![Vec::new(); FIELDS.len()],
        }
    }

    fn push_unique(list: &mut Vec<String>, literal: String) {
        if !list.iter().any(|existing| existing.eq_ignore_ascii_case(&literal)) {
            list.push(literal);
        }
    }
}

fn field_values<T: Clone>(
    set: &FilterSet<T>,
    to_field: &impl Fn(&FilterPart<T>) -> EngineResult<FieldValue>,
) -> EngineResult<(Vec<FieldValue>, Vec<Vec<FieldValue>>)> {
    let excluded = set.excluded().map(to_field).collect::<EngineResult<Vec<_>>>()?;
    let mut alternatives = Vec::new();
    for expression in &set.expressions {
        let included = expression
            .parts
            .iter()
            .filter(|p| !p.negated)
            .map(to_field)
            .collect::<EngineResult<Vec<_>>>()?;
        if !included.is_empty() {
            alternatives.push(included);
        }
    }
    Ok((excluded, alternatives))
}

/// Factor an OR-of-ANDs into shared all-of values plus independent any-of
/// lists, one per field. Fails unless the alternatives are exactly the
/// cross product of those lists.
fn factor_alternatives(
    alternatives: Vec<Vec<FieldValue>>,
    out: &mut RenderedFields,
) -> EngineResult<()> {
    if alternatives.is_empty() {
        return Ok(());
    }

    let common: Vec<FieldValue> = alternatives[0]
        .iter()
        .filter(|value| alternatives.iter().all(|alt| alt.contains(value)))
        .cloned()
        .collect();
    let residuals: Vec<Vec<FieldValue>> = alternatives
        .iter()
        .map(|alt| {
            let mut rest: Vec<FieldValue> = Vec::new();
            for value in alt.iter().filter(|v| !common.contains(v)) {
                if !rest.contains(value) {
                    rest.push(value.clone());
                }
            }
            rest.sort_by_key(|v| v.field);
            rest
        })
        .collect();

    for value in &common {
        RenderedFields::push_unique(&mut out.plain[value.field], value.literal.clone());
        let spec = &FIELDS[value.field];
        if spec.combine == Combine::Any && out.plain[value.field].len() > 1 {
            return Err(unrepresentable(format!(
                "`filterBy{}` cannot require several values at once",
                spec.name
            )));
        }
    }

    if residuals.iter().all(Vec::is_empty) {
        return Ok(());
    }

    // Every residual must name exactly one value in each of the same fields.
    let fields: Vec<usize> = residuals[0].iter().map(|v| v.field).collect();
    if fields.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(unrepresentable(
            "alternatives combine several values of one field",
        ));
    }
    let mut distinct_per_field: Vec<Vec<&FieldValue>> = vec![Vec::new(); fields.len()];
    let mut distinct_residuals: Vec<&Vec<FieldValue>> = Vec::new();
    for residual in &residuals {
        let shape: Vec<usize> = residual.iter().map(|v| v.field).collect();
        if shape != fields {
            return Err(unrepresentable(
                "alternatives constrain different fields",
            ));
        }
        for (slot, value) in residual.iter().enumerate() {
            if !distinct_per_field[slot].contains(&value) {
                distinct_per_field[slot].push(value);
            }
        }
        if !distinct_residuals.contains(&residual) {
            distinct_residuals.push(residual);
        }
    }
    let product: usize = distinct_per_field.iter().map(Vec::len).product();
    if product != distinct_residuals.len() {
        return Err(unrepresentable(
            "alternatives are not a cross product of per-field value lists",
        ));
    }

    for (slot, field) in fields.iter().enumerate() {
        let spec = &FIELDS[*field];
        let values = &distinct_per_field[slot];
        match spec.combine {
            Combine::All if values.len() > 1 => {
                for value in values {
                    RenderedFields::push_unique(&mut out.or[*field], value.literal.clone());
                }
            }
            _ => {
                if values.len() > 1 && !out.plain[*field].is_empty() {
                    return Err(unrepresentable(format!(
                        "`filterBy{}` cannot mix required and alternative values",
                        spec.name
                    )));
                }
                for value in values {
                    RenderedFields::push_unique(&mut out.plain[*field], value.literal.clone());
                }
            }
        }
    }
    Ok(())
}

pub fn render_rule(rule: &DistributionRule) -> EngineResult<String> {
    let (slot, outfit) = match &rule.target {
        RuleTarget::Outfit { slot, outfit } => (*slot, outfit),
        RuleTarget::Keyword { .. } => {
            return Err(unrepresentable("keyword distribution has no outfit clause"))
        }
    };
    if !rule.is_certain() {
        return Err(unrepresentable("chance is not supported"));
    }
    if rule.extra.is_some() {
        return Err(unrepresentable("extra field is not supported"));
    }
    let filters = &rule.filters;
    if !filters.levels.is_empty() {
        return Err(unrepresentable("level filters are not supported"));
    }
    let traits = filters.traits;
    if traits.unique.is_some()
        || traits.summonable.is_some()
        || traits.child.is_some()
        || traits.leveled.is_some()
    {
        return Err(unrepresentable("only the gender trait is supported"));
    }

    let editor_field = editor_id_field_index();
    let string_field = |part: &FilterPart<TextLiteral>| {
        if part.wildcard {
            Ok(FieldValue {
                field: editor_field,
                literal: part.value.text().to_string(),
            })
        } else {
            Err(unrepresentable(format!(
                "exact name `{}` has no equivalent",
                part.value.text()
            )))
        }
    };
    let form_field = |part: &FilterPart<FormRef>| {
        let field = field_index_for_form(&part.value);
        if field >= FIELDS.len() {
            return Err(unrepresentable(format!(
                "{} has no filter field",
                part.value.describe()
            )));
        }
        Ok(FieldValue {
            field,
            literal: part.value.skypatcher_literal(),
        })
    };

    let mut out = RenderedFields::new();
    let (string_excluded, string_alternatives) = field_values(&filters.strings, &string_field)?;
    let (form_excluded, form_alternatives) = field_values(&filters.forms, &form_field)?;
    for value in string_excluded.into_iter().chain(form_excluded) {
        RenderedFields::push_unique(&mut out.excluded[value.field], value.literal);
    }
    factor_alternatives(string_alternatives, &mut out)?;
    factor_alternatives(form_alternatives, &mut out)?;

    let mut clauses = Vec::new();
    for (idx, spec) in FIELDS.iter().enumerate() {
        if spec.source == FieldSource::Gender {
            if let Some(female) = traits.female {
                let gender = if female { "female" } else { "male" };
                clauses.push(format!("filterBy{}={gender}", spec.name));
            }
            continue;
        }
        if !out.plain[idx].is_empty() {
            clauses.push(format!("filterBy{}={}", spec.name, out.plain[idx].join(",")));
        }
        if !out.or[idx].is_empty() {
            clauses.push(format!("filterBy{}Or={}", spec.name, out.or[idx].join(",")));
        }
        if !out.excluded[idx].is_empty() {
            clauses.push(format!(
                "filterBy{}Excluded={}",
                spec.name,
                out.excluded[idx].join(",")
            ));
        }
    }
    let key = match slot {
        OutfitSlot::Default => "outfitDefault",
        OutfitSlot::Sleep => "outfitSleep",
    };
    clauses.push(format!("{key}={}", outfit.skypatcher_literal()));
    Ok(clauses.join(":"))
}

#[cfg(test)]
#[path = "tests/skypatcher_tests.rs"]
mod tests;
