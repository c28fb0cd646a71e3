use super::*;
use crate::services::distribution::filter::{FilterPart, FilterSet, TextLiteral};
use crate::services::distribution::parser::{parse_line, ParseOutcome};
use crate::services::distribution::rule::{Dialect, DistributionRule};
use crate::services::game_data::{FormResolver, GameData};
use crate::test_utils::{sample_game_data, SKYRIM};

fn parse_spid(data: &GameData, line: &str) -> DistributionRule {
    match parse_line(Dialect::Spid, 1, line, &data.catalog) {
        ParseOutcome::Rules(mut rules) => rules.remove(0),
        other => panic!("`{line}` did not parse: {other:?}"),
    }
}

/// Editor ids of every sample NPC the filters match.
fn matched(data: &GameData, filters: &RuleFilters) -> Vec<String> {
    let population = &data.population;
    (0..population.len())
        .filter_map(|index| MatchSubject::from_population(population, index, None))
        .filter(|subject| matches(subject, filters))
        .filter_map(|subject| subject.npc.editor_id.clone())
        .collect()
}

fn matched_line(data: &GameData, line: &str) -> Vec<String> {
    matched(data, &parse_spid(data, line).filters)
}

#[test]
fn test_unfiltered_rule_matches_everyone() {
    let data = sample_game_data();
    assert_eq!(matched(&data, &RuleFilters::default()).len(), 5);
}

#[test]
fn test_exact_string_matches_name_editor_id_and_group_tags() {
    let data = sample_game_data();
    assert_eq!(matched_line(&data, "Outfit = FancyOutfit|lydia"), ["HousecarlWhiterun"]);
    assert_eq!(matched_line(&data, "Outfit = FancyOutfit|LUCIA"), ["Lucia"]);
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|BanditFaction"),
        ["EncBandit01Melee", "EncBanditBoss"]
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|ActorTypeNPC"),
        ["WhiterunGuard"]
    );
    // Exact matching never falls back to substrings.
    assert!(matched_line(&data, "Outfit = FancyOutfit|Chief").is_empty());
}

#[test]
fn test_wildcard_checks_substrings_including_template() {
    let data = sample_game_data();
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|*whiterun"),
        ["HousecarlWhiterun", "WhiterunGuard"]
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|Template*"),
        ["EncBandit01Melee"]
    );
}

#[test]
fn test_exclusion_wins_over_inclusion() {
    let data = sample_game_data();
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|*Bandit,-Bandit Chief"),
        ["EncBandit01Melee"]
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|BanditFaction+-ImperialRace"),
        ["EncBandit01Melee"]
    );
}

#[test]
fn test_form_filters_check_each_slot() {
    let data = sample_game_data();
    let npcs = data.population.npcs();
    let resolve = |literal: &str| data.catalog.resolve_filter(literal).unwrap();

    let guard = &npcs[4];
    assert_eq!(form_match_slot(guard, &resolve("WhiterunGuard")), Some(FormSlot::Own));
    assert_eq!(form_match_slot(guard, &resolve("ImperialRace")), Some(FormSlot::Race));
    assert_eq!(
        form_match_slot(guard, &resolve("GuardOutfit")),
        Some(FormSlot::DefaultOutfit)
    );
    assert_eq!(
        form_match_slot(guard, &resolve("csHumanMeleeLvl2")),
        Some(FormSlot::CombatStyle)
    );
    assert_eq!(
        form_match_slot(guard, &resolve("GuardFactionWhiterun")),
        Some(FormSlot::Faction)
    );
    assert_eq!(form_match_slot(guard, &resolve("ActorTypeNPC")), Some(FormSlot::Keyword));
    assert_eq!(form_match_slot(guard, &resolve(SKYRIM)), Some(FormSlot::SourcePlugin));
    assert_eq!(form_match_slot(guard, &resolve("NordRace")), None);

    let lydia = &npcs[0];
    assert_eq!(form_match_slot(lydia, &resolve("CombatWarrior1H")), Some(FormSlot::Class));
    assert_eq!(
        form_match_slot(lydia, &resolve("FemaleEvenToned")),
        Some(FormSlot::VoiceType)
    );
    assert_eq!(form_match_slot(lydia, &resolve("MyOutfits.esp")), None);
}

#[test]
fn test_level_and_skill_clauses() {
    let data = sample_game_data();
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|15/20"),
        ["HousecarlWhiterun", "WhiterunGuard"]
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|25"),
        ["EncBanditBoss"]
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|6(40/60),11(40)"),
        ["HousecarlWhiterun"]
    );
    // Every clause must hold.
    assert!(matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|25,7(80)").is_empty());
}

#[test]
fn test_out_of_range_skill_index_is_vacuously_true() {
    let data = sample_game_data();
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|5(999)").len(),
        5
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|24(999)").len(),
        5
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|300(999)").len(),
        5
    );
    assert!(matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|23(999)").is_empty());
}

#[test]
fn test_traits_must_match_exactly() {
    let data = sample_game_data();
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|NONE|F/-C"),
        ["HousecarlWhiterun", "EncBanditBoss"]
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|NONE|M/-L"),
        ["WhiterunGuard"]
    );
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|NONE|NONE|NONE|U/C"),
        ["Lucia"]
    );
}

#[test]
fn test_categories_are_anded() {
    let data = sample_game_data();
    assert_eq!(
        matched_line(&data, "Outfit = FancyOutfit|*Bandit|NordRace,ImperialRace|NONE|F"),
        ["EncBanditBoss"]
    );
}

#[test]
fn test_virtual_tags_match_exact_and_wildcard() {
    let data = sample_game_data();
    let population = &data.population;
    let tags: HashSet<String> = ["wearsfancy".to_string()].into_iter().collect();
    let tagged = MatchSubject::from_population(population, 3, Some(&tags)).unwrap();
    let untagged = MatchSubject::from_population(population, 3, None).unwrap();

    let exact = FilterSet::all_of(vec![FilterPart::include(TextLiteral::new("WearsFancy"))]);
    assert!(matches_strings(&tagged, &exact));
    assert!(!matches_strings(&untagged, &exact));

    let wildcard =
        FilterSet::all_of(vec![FilterPart::include(TextLiteral::new("Fancy")).wildcard()]);
    assert!(matches_strings(&tagged, &wildcard));
}

#[test]
fn test_rendered_spid_rule_matches_same_characters() {
    let data = sample_game_data();
    for line in [
        "Outfit = FancyOutfit|*Bandit+-Boss,Lydia",
        "Outfit = FancyOutfit|NONE|BanditFaction+-ImperialRace,Lucia",
        "Outfit = FancyOutfit|Bandit*|NONE|5/25,40(1)|-U/L|NONE|75",
        "SleepOutfit = SleepRobes|NONE|Skyrim.esm|10|M",
        "Outfit = 0x803~MyOutfits.esp|-Lucia|NONE|NONE|F",
    ] {
        let rule = parse_spid(&data, line);
        let rebuilt = parse_spid(&data, &rule.render(Dialect::Spid).unwrap());
        assert_eq!(
            matched(&data, &rule.filters),
            matched(&data, &rebuilt.filters),
            "{line}"
        );
        assert_eq!(rule.target, rebuilt.target);
        assert_eq!(rule.chance, rebuilt.chance);
    }
}
