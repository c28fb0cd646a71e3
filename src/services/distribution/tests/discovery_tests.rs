use super::*;
use crate::test_utils::{init_test_logging, sample_game_data, write_file};
use std::sync::atomic::Ordering;
use tempfile::TempDir;

const NPC_DIR: &str = "SKSE/Plugins/SkyPatcher/npc";

fn names(candidates: &[RuleFileCandidate]) -> Vec<String> {
    candidates
        .iter()
        .map(|c| file_name_of(&c.path).unwrap_or_default())
        .collect()
}

fn layout() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_file(root, "b_DISTR.ini", "Outfit = FancyOutfit|Lucia");
    write_file(root, "A_distr.INI", "Outfit = RaggedOutfit|Lucia");
    write_file(root, "Readme.txt", "not a rule file");
    write_file(root, "Nested/Deep_DISTR.ini", "Outfit = SteelOutfit");
    write_file(
        root,
        &format!("{NPC_DIR}/patch.ini"),
        "filterByNpcs=Skyrim.esm|0x4D6E3:outfitDefault=SteelOutfit",
    );
    write_file(
        root,
        &format!("{NPC_DIR}/sub/Another.ini"),
        "filterByFactions=BanditFaction:outfitDefault=RaggedOutfit",
    );
    write_file(root, &format!("{NPC_DIR}/SkyPatcher.ini"), "control file");
    write_file(root, &format!("{NPC_DIR}/notes.txt"), "ignored");
    dir
}

#[test]
fn test_discovers_both_dialects_in_processing_order() {
    init_test_logging();
    let dir = layout();
    let candidates = discover_rule_files(dir.path(), &EngineConfig::default()).unwrap();

    assert_eq!(
        names(&candidates),
        vec!["Another.ini", "patch.ini", "A_distr.INI", "b_DISTR.ini"]
    );
    assert_eq!(candidates[0].dialect, Dialect::SkyPatcher);
    assert_eq!(candidates[2].dialect, Dialect::Spid);
}

#[test]
fn test_reserved_name_is_configurable() {
    let dir = layout();
    let config = EngineConfig {
        reserved_file_name: "patch.ini".to_string(),
        ..EngineConfig::default()
    };
    let candidates = discover_rule_files(dir.path(), &config).unwrap();

    let found = names(&candidates);
    assert!(found.contains(&"SkyPatcher.ini".to_string()));
    assert!(!found.contains(&"patch.ini".to_string()));
}

#[test]
fn test_missing_data_dir_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = discover_rule_files(&dir.path().join("nope"), &EngineConfig::default());
    assert!(matches!(result, Err(EngineError::MissingPath(_))));
}

#[test]
fn test_no_skypatcher_directory_is_fine() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "Only_DISTR.ini", "");
    let candidates = discover_rule_files(dir.path(), &EngineConfig::default()).unwrap();
    assert_eq!(names(&candidates), vec!["Only_DISTR.ini"]);
}

#[test]
fn test_load_skips_unreadable_files() {
    let dir = layout();
    let data = sample_game_data();
    let mut candidates = discover_rule_files(dir.path(), &EngineConfig::default()).unwrap();
    candidates.push(RuleFileCandidate {
        path: dir.path().join("Vanished_DISTR.ini"),
        dialect: Dialect::Spid,
    });

    let outcome = load_rule_files(&candidates, &data.catalog, &AtomicBool::new(false));

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.files.len(), 4);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].path.ends_with("Vanished_DISTR.ini"));
    let loaded: Vec<&str> = outcome.files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(
        loaded,
        vec!["Another.ini", "patch.ini", "A_distr.INI", "b_DISTR.ini"]
    );
}

#[test]
fn test_cancelled_load_returns_nothing() {
    let dir = layout();
    let data = sample_game_data();
    let candidates = discover_rule_files(dir.path(), &EngineConfig::default()).unwrap();
    let cancel = AtomicBool::new(false);
    cancel.store(true, Ordering::Relaxed);

    let outcome = load_rule_files(&candidates, &data.catalog, &cancel);

    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert!(outcome.files.is_empty());
    assert!(outcome.skipped.is_empty());
}
