use super::*;
use crate::services::distribution::filter::{FilterExpression, LevelClause};
use crate::test_utils::{key, sample_game_data, OUTFITS, SKYRIM};

fn parse_rules(text: &str) -> Vec<DistributionRule> {
    let data = sample_game_data();
    match parse_rule_line(3, text, &data.catalog) {
        ParseOutcome::Rules(rules) => rules,
        other => panic!("expected rules for `{text}`, got {other:?}"),
    }
}

fn parse_one(text: &str) -> DistributionRule {
    let mut rules = parse_rules(text);
    assert_eq!(rules.len(), 1);
    rules.remove(0)
}

fn unparseable(text: &str) -> String {
    let data = sample_game_data();
    match parse_rule_line(1, text, &data.catalog) {
        ParseOutcome::Unparseable(reason) => reason,
        other => panic!("expected `{text}` to be unparseable, got {other:?}"),
    }
}

#[test]
fn test_parse_outfit_without_filters() {
    let rule = parse_one("outfitDefault=MyOutfits.esp|0x800");

    assert_eq!(rule.dialect, Dialect::SkyPatcher);
    assert_eq!(rule.line_number, 3);
    assert_eq!(rule.target.outfit_key(), Some(&key(OUTFITS, 0x800)));
    assert!(rule.filters.is_unfiltered());
    assert_eq!(rule.chance, None);
}

#[test]
fn test_plain_faction_clause_requires_all_values() {
    let rule = parse_one(
        "filterByFactions=Skyrim.esm|0x1BCC0,GuardFactionWhiterun:outfitDefault=FancyOutfit",
    );
    let forms = &rule.filters.forms;
    assert_eq!(forms.expressions.len(), 1);
    assert_eq!(forms.expressions[0].parts.len(), 2);
}

#[test]
fn test_or_variant_and_any_fields_become_alternatives() {
    let rule = parse_one(
        "filterByFactionsOr=BanditFaction,GuardFactionWhiterun:filterByRaces=NordRace:outfitDefault=FancyOutfit",
    );
    let forms = &rule.filters.forms;
    // (bandit OR guard) AND nord, distributed.
    assert_eq!(forms.expressions.len(), 2);
    for expression in &forms.expressions {
        assert_eq!(expression.parts.len(), 2);
        assert_eq!(expression.parts[1].value.kind(), Some(FormKind::Race));
    }
}

#[test]
fn test_excluded_clause_negates_every_value() {
    let rule = parse_one(
        "filterByRaces=NordRace,ImperialRace:filterByNpcsExcluded=Lucia:outfitDefault=FancyOutfit",
    );
    let excluded: Vec<_> = rule.filters.forms.excluded().collect();
    assert!(!excluded.is_empty());
    assert!(excluded
        .iter()
        .all(|part| part.value.kind() == Some(FormKind::Npc)));
    assert_eq!(rule.filters.forms.included().count(), 2);
}

#[test]
fn test_editor_id_contains_is_a_wildcard_string_filter() {
    let rule = parse_one("filterByEditorIdContains=Bandit:outfitDefault=FancyOutfit");
    let part = &rule.filters.strings.expressions[0].parts[0];
    assert!(part.wildcard);
    assert_eq!(part.value.text(), "Bandit");
}

#[test]
fn test_gender_sets_trait() {
    let rule = parse_one("filterByGender=female:outfitDefault=FancyOutfit");
    assert_eq!(rule.filters.traits.female, Some(true));
    unparseable("filterByGender=sometimes:outfitDefault=FancyOutfit");
}

#[test]
fn test_mod_names_only_accept_known_plugins() {
    let rule = parse_one("filterByModNames=Skyrim.esm:outfitDefault=FancyOutfit");
    assert_eq!(
        rule.filters.forms.expressions[0].parts[0].value,
        FormRef::Plugin {
            name: SKYRIM.to_string()
        }
    );
    unparseable("filterByModNames=Missing.esp:outfitDefault=FancyOutfit");
}

#[test]
fn test_both_slots_produce_two_rules() {
    let rules = parse_rules(
        "filterByNpcs=WhiterunGuard:outfitDefault=FancyOutfit:outfitSleep=MyOutfits.esp|0x802",
    );
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].target.slot(), Some(OutfitSlot::Default));
    assert_eq!(rules[1].target.slot(), Some(OutfitSlot::Sleep));
    assert_eq!(rules[0].filters, rules[1].filters);
}

#[test]
fn test_clause_with_no_resolvable_values_is_unparseable() {
    let reason = unparseable("filterByFactions=NoSuchFaction:outfitDefault=FancyOutfit");
    assert!(reason.contains("NoSuchFaction"));
}

#[test]
fn test_partially_resolved_clause_keeps_resolved_values() {
    let rule = parse_one("filterByRaces=NordRace,MissingRace:outfitDefault=FancyOutfit");
    assert_eq!(rule.filters.forms.expressions.len(), 1);
}

#[test]
fn test_unknown_filter_and_missing_target() {
    unparseable("filterByHairColor=Red:outfitDefault=FancyOutfit");
    unparseable("filterByNpcs=Lucia:outfitDefault=NoSuchOutfit");
    unparseable("filterByNpcs=Lucia:outfitDefault");
    // Gender has no excluded variant.
    unparseable("filterByGenderExcluded=female:outfitDefault=FancyOutfit");
}

#[test]
fn test_lines_without_outfit_are_key_value() {
    let data = sample_game_data();
    assert_eq!(
        parse_rule_line(
            1,
            "filterByNpcs=Lucia:keywordsToAdd=Skyrim.esm|0x13794",
            &data.catalog
        ),
        ParseOutcome::Ignored(LineKind::KeyValue)
    );
}

#[test]
fn test_render_round_trips_through_parser() {
    let line = "filterByFactionsOr=Skyrim.esm|0x1BCC0,Skyrim.esm|0x2BE3B:filterByRaces=Skyrim.esm|0x13744:filterByNpcsExcluded=Skyrim.esm|0x4D6E3:filterByGender=female:outfitDefault=MyOutfits.esp|0x800";
    let rule = parse_one(line);
    let rendered = render_rule(&rule).unwrap();

    assert_eq!(
        rendered,
        "filterByNpcsExcluded=Skyrim.esm|0x4D6E3:filterByFactionsOr=Skyrim.esm|0x1BCC0,Skyrim.esm|0x2BE3B:filterByRaces=Skyrim.esm|0x13744:filterByGender=female:outfitDefault=MyOutfits.esp|0x800"
    );
    let reparsed = parse_one(&rendered);
    assert_eq!(render_rule(&reparsed).unwrap(), rendered);
    assert_eq!(reparsed.target, rule.target);
}

#[test]
fn test_render_factors_common_values() {
    let rule = parse_one(
        "filterByFactions=BanditFaction:filterByRaces=NordRace,ImperialRace:outfitSleep=SleepRobes",
    );
    assert_eq!(
        render_rule(&rule).unwrap(),
        "filterByFactions=Skyrim.esm|0x1BCC0:filterByRaces=Skyrim.esm|0x13746,Skyrim.esm|0x13744:outfitSleep=MyOutfits.esp|0x802"
    );
}

#[test]
fn test_render_rejects_what_skypatcher_cannot_express() {
    let base = parse_one("outfitDefault=FancyOutfit");

    let mut with_chance = base.clone();
    with_chance.chance = Some(50);
    assert!(render_rule(&with_chance).is_err());

    let mut with_levels = base.clone();
    with_levels.filters.levels.clauses.push(LevelClause::level(5, None));
    assert!(render_rule(&with_levels).is_err());

    let mut with_exact_name = base.clone();
    with_exact_name.filters.strings =
        FilterSet::all_of(vec![FilterPart::include(TextLiteral::new("Lydia"))]);
    assert!(render_rule(&with_exact_name).is_err());

    let mut with_unique = base.clone();
    with_unique.filters.traits.unique = Some(true);
    assert!(render_rule(&with_unique).is_err());
}

#[test]
fn test_render_rejects_non_product_alternatives() {
    let data = sample_game_data();
    let bandit = data.catalog.resolve_filter("BanditFaction").unwrap();
    let guard = data.catalog.resolve_filter("GuardFactionWhiterun").unwrap();
    let nord = data.catalog.resolve_filter("NordRace").unwrap();

    let mut rule = parse_one("outfitDefault=FancyOutfit");
    // (bandit AND nord) OR guard
    rule.filters.forms = FilterSet::new(vec![
        FilterExpression::new(vec![
            FilterPart::include(bandit),
            FilterPart::include(nord),
        ]),
        FilterExpression::new(vec![FilterPart::include(guard)]),
    ]);
    let err = render_rule(&rule).unwrap_err();
    assert!(matches!(err, EngineError::Unrepresentable { .. }));
}
