use super::*;
use crate::services::distribution::conflict::{ConflictSeverity, LoadOrderVerdict};
use crate::test_utils::{init_test_logging, key, sample_game_data, write_file, OUTFITS, SKYRIM};
use std::sync::atomic::Ordering;
use tempfile::TempDir;

const NPC_DIR: &str = "SKSE/Plugins/SkyPatcher/npc";

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_file(
        root,
        "Guards_DISTR.ini",
        "Keyword = CityWatch|NONE|GuardFactionWhiterun\n\
         Outfit = SteelOutfit|CityWatch\n\
         SleepOutfit = SleepRobes|CityWatch",
    );
    write_file(root, "Lucia_DISTR.ini", "Outfit = FancyOutfit|Lucia");
    write_file(
        root,
        &format!("{NPC_DIR}/bandits.ini"),
        "filterByFactions=BanditFaction:outfitDefault=RaggedOutfit",
    );
    dir
}

#[test]
fn test_full_pass_resolves_across_dialects() {
    init_test_logging();
    let dir = data_dir();
    let game = sample_game_data();
    let run = run_engine(
        dir.path(),
        &game,
        &EngineConfig::default(),
        OutfitSlot::Default,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    let names: Vec<&str> = run.files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["bandits.ini", "Guards_DISTR.ini", "Lucia_DISTR.ini"]);
    assert_eq!(run.diagnostic_count(), 0);
    assert_eq!(run.keyword_plan.order, vec![0]);

    let guard = run.resolution.for_npc(&key(SKYRIM, 0x6A4F1)).unwrap();
    assert_eq!(guard.winner().outfit, key(OUTFITS, 0x803));
    let lucia = run.resolution.for_npc(&key(SKYRIM, 0x4D6E3)).unwrap();
    assert_eq!(lucia.winner().outfit, key(OUTFITS, 0x800));
    let bandit = run.resolution.for_npc(&key(SKYRIM, 0x3DF08)).unwrap();
    assert_eq!(bandit.winner().file_name, "bandits.ini");
    assert!(run.resolution.for_npc(&key(SKYRIM, 0xA2C94)).is_none());
}

#[test]
fn test_sleep_slot_pass() {
    let dir = data_dir();
    let game = sample_game_data();
    let run = run_engine(
        dir.path(),
        &game,
        &EngineConfig::default(),
        OutfitSlot::Sleep,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(run.resolution.slot, OutfitSlot::Sleep);
    assert_eq!(run.resolution.results.len(), 1);
    let guard = &run.resolution.results[0];
    assert_eq!(guard.npc, key(SKYRIM, 0x6A4F1));
    assert_eq!(guard.winner().outfit, key(OUTFITS, 0x802));
    assert!(guard.distributions[0].is_baseline());
}

#[test]
fn test_cancelled_pass_publishes_nothing() {
    let dir = data_dir();
    let game = sample_game_data();
    let cancel = AtomicBool::new(false);
    cancel.store(true, Ordering::Relaxed);

    let run = run_engine(
        dir.path(),
        &game,
        &EngineConfig::default(),
        OutfitSlot::Default,
        &cancel,
    )
    .unwrap();

    assert!(run.is_cancelled());
    assert!(run.files.is_empty());
    assert!(run.resolution.results.is_empty());
}

#[test]
fn test_missing_data_dir_fails() {
    let dir = TempDir::new().unwrap();
    let game = sample_game_data();
    let result = run_engine(
        &dir.path().join("missing"),
        &game,
        &EngineConfig::default(),
        OutfitSlot::Default,
        &AtomicBool::new(false),
    );
    assert!(result.is_err());
}

#[test]
fn test_keyword_rules_keep_processing_order() {
    let game = sample_game_data();
    let files = vec![
        DistributionFile::parse(
            "A_DISTR.ini",
            Dialect::Spid,
            "Keyword = First\nOutfit = FancyOutfit|First",
            &game.catalog,
        ),
        DistributionFile::parse("B_DISTR.ini", Dialect::Spid, "Keyword = Second", &game.catalog),
    ];
    let rules = keyword_rules(&files);
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].target, RuleTarget::Keyword { tag: "First".to_string() });
    assert_eq!(rules[1].target, RuleTarget::Keyword { tag: "Second".to_string() });
}

#[test]
fn test_check_proposed_file_against_run() {
    let dir = data_dir();
    let game = sample_game_data();
    let config = EngineConfig::default();
    let run = run_engine(
        dir.path(),
        &game,
        &config,
        OutfitSlot::Default,
        &AtomicBool::new(false),
    )
    .unwrap();

    let check = check_proposed_file(
        &run,
        "Alt_DISTR.ini",
        Dialect::Spid,
        "Outfit = RaggedOutfit|Lucia\nOutfit = NoSuchOutfit",
        &game,
        &config,
    );

    assert_eq!(check.rules.len(), 1);
    assert_eq!(check.diagnostics.len(), 1);
    assert!(check.intra_file.is_empty());
    assert_eq!(check.report.conflicts.len(), 1);
    assert_eq!(
        check.report.conflicts[0].severity,
        ConflictSeverity::HardConflict
    );
    assert_eq!(
        check.report.verdict,
        LoadOrderVerdict::Rename {
            suggested: "ZZAlt_DISTR.ini".to_string()
        }
    );
}
