use crate::services::game_data::{
    EntityId, FactionMembership, FormKind, FormLink, FormRecord, GameData, NpcRecord, NpcTraits,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        // Initialize logger only once
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub const SKYRIM: &str = "Skyrim.esm";
pub const OUTFITS: &str = "MyOutfits.esp";

pub fn key(plugin: &str, local_id: u32) -> EntityId {
    EntityId::new(plugin, local_id)
}

pub fn link(plugin: &str, local_id: u32, editor_id: &str) -> FormLink {
    FormLink::new(key(plugin, local_id), Some(editor_id))
}

pub fn bandit_faction() -> FormLink {
    link(SKYRIM, 0x1BCC0, "BanditFaction")
}

pub fn guard_faction() -> FormLink {
    link(SKYRIM, 0x2BE3B, "GuardFactionWhiterun")
}

pub fn nord_race() -> FormLink {
    link(SKYRIM, 0x13746, "NordRace")
}

pub fn imperial_race() -> FormLink {
    link(SKYRIM, 0x13744, "ImperialRace")
}

pub fn bandit_outfit() -> FormLink {
    link(SKYRIM, 0x1000, "BanditOutfit")
}

pub fn guard_outfit() -> FormLink {
    link(SKYRIM, 0x1001, "GuardOutfit")
}

pub fn blank_npc(local_id: u32, editor_id: &str, name: &str) -> NpcRecord {
    NpcRecord {
        id: key(SKYRIM, local_id),
        name: Some(name.to_string()),
        editor_id: Some(editor_id.to_string()),
        source_plugin: SKYRIM.to_string(),
        factions: Vec::new(),
        keywords: Vec::new(),
        race: None,
        class: None,
        default_outfit: None,
        sleep_outfit: None,
        combat_style: None,
        voice_type: None,
        template: None,
        level: 1,
        skills: BTreeMap::new(),
        traits: NpcTraits::default(),
    }
}

/// Five NPCs covering every filter category.
///
/// Index order: Lydia, bandit, bandit chief, Lucia, Whiterun guard.
pub fn sample_npcs() -> Vec<NpcRecord> {
    let mut lydia = blank_npc(0xA2C94, "HousecarlWhiterun", "Lydia");
    lydia.race = Some(nord_race());
    lydia.class = Some(link(SKYRIM, 0x13176, "CombatWarrior1H"));
    lydia.default_outfit = Some(guard_outfit());
    lydia.voice_type = Some(link(SKYRIM, 0x13AE1, "FemaleEvenToned"));
    lydia.level = 20;
    lydia.skills = BTreeMap::from([(6, 50), (11, 40)]);
    lydia.traits = NpcTraits {
        female: true,
        unique: true,
        ..NpcTraits::default()
    };

    let mut bandit = blank_npc(0x3DF08, "EncBandit01Melee", "Bandit");
    bandit.race = Some(nord_race());
    bandit.factions = vec![FactionMembership {
        faction: bandit_faction(),
        rank: 0,
    }];
    bandit.default_outfit = Some(bandit_outfit());
    bandit.template = Some("EncBandit01Template".to_string());
    bandit.level = 10;
    bandit.traits = NpcTraits {
        leveled: true,
        ..NpcTraits::default()
    };

    let mut chief = blank_npc(0x3DF09, "EncBanditBoss", "Bandit Chief");
    chief.race = Some(imperial_race());
    chief.factions = vec![FactionMembership {
        faction: bandit_faction(),
        rank: 1,
    }];
    chief.default_outfit = Some(bandit_outfit());
    chief.level = 30;
    chief.skills = BTreeMap::from([(7, 75)]);
    chief.traits = NpcTraits {
        female: true,
        leveled: true,
        ..NpcTraits::default()
    };

    let mut lucia = blank_npc(0x4D6E3, "Lucia", "Lucia");
    lucia.race = Some(imperial_race());
    lucia.default_outfit = Some(link(SKYRIM, 0x1002, "ChildOutfit"));
    lucia.traits = NpcTraits {
        female: true,
        unique: true,
        child: true,
        ..NpcTraits::default()
    };

    let mut guard = blank_npc(0x6A4F1, "WhiterunGuard", "Whiterun Guard");
    guard.race = Some(imperial_race());
    guard.factions = vec![FactionMembership {
        faction: guard_faction(),
        rank: 0,
    }];
    guard.keywords = vec![link(SKYRIM, 0x13794, "ActorTypeNPC")];
    guard.default_outfit = Some(guard_outfit());
    guard.sleep_outfit = Some(link(SKYRIM, 0x1003, "GuardSleepOutfit"));
    guard.combat_style = Some(link(SKYRIM, 0x3BE1C, "csHumanMeleeLvl2"));
    guard.level = 15;

    vec![lydia, bandit, chief, lucia, guard]
}

/// Outfits shipped by the test mod, referenced as rule targets.
pub fn mod_outfits() -> Vec<FormRecord> {
    [
        (0x800, "FancyOutfit"),
        (0x801, "RaggedOutfit"),
        (0x802, "SleepRobes"),
        (0x803, "SteelOutfit"),
    ]
    .into_iter()
    .map(|(local_id, edid)| FormRecord {
        key: key(OUTFITS, local_id),
        kind: FormKind::Outfit,
        editor_id: Some(edid.to_string()),
        name: None,
    })
    .collect()
}

pub fn sample_game_data() -> GameData {
    GameData::new(
        sample_npcs(),
        mod_outfits(),
        &[SKYRIM.to_string(), OUTFITS.to_string()],
    )
}

pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Write the sample population as a game snapshot JSON file.
pub fn write_sample_snapshot(root: &Path) -> PathBuf {
    let snapshot = serde_json::json!({
        "plugins": [SKYRIM, OUTFITS],
        "forms": mod_outfits(),
        "npcs": sample_npcs(),
    });
    write_file(root, "snapshot.json", &snapshot.to_string())
}
