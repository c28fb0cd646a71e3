use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub const NPC_DIR: &str = "SKSE/Plugins/SkyPatcher/npc";

pub const SNAPSHOT: &str = r#"{
  "plugins": ["Skyrim.esm", "Rebellion.esp"],
  "forms": [
    { "key": "Rebellion.esp|0x800", "kind": "Outfit", "editorId": "RebelArmor" },
    { "key": "Rebellion.esp|0x801", "kind": "Outfit", "editorId": "KingArmor" },
    { "key": "Rebellion.esp|0x802", "kind": "Outfit", "editorId": "FarmClothes" }
  ],
  "npcs": [
    {
      "id": "Skyrim.esm|0x100",
      "name": "Ulfric",
      "editorId": "UlfricStormcloak",
      "sourcePlugin": "Skyrim.esm",
      "factions": [{ "faction": { "key": "Skyrim.esm|0x200", "editorId": "StormcloakFaction" }, "rank": 3 }],
      "defaultOutfit": { "key": "Skyrim.esm|0x300", "editorId": "UlfricOutfit" },
      "level": 40,
      "traits": { "unique": true }
    },
    {
      "id": "Skyrim.esm|0x101",
      "name": "Stormcloak Soldier",
      "editorId": "EncStormcloakSoldier",
      "sourcePlugin": "Skyrim.esm",
      "factions": [{ "faction": { "key": "Skyrim.esm|0x200", "editorId": "StormcloakFaction" } }],
      "level": 12,
      "traits": { "leveled": true }
    },
    {
      "id": "Skyrim.esm|0x102",
      "name": "Farmer",
      "editorId": "FarmerNPC",
      "sourcePlugin": "Skyrim.esm",
      "keywords": [{ "key": "Skyrim.esm|0x400", "editorId": "ActorTypeNPC" }],
      "level": 5,
      "traits": { "female": true }
    }
  ]
}"#;

pub fn write_bytes(root: &Path, relative: &str, content: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Data directory with both dialects, a keyword chain, a keyword cycle, a
/// BOM-prefixed file and a Windows-1252 file.
pub fn build_data_dir(root: &Path) -> PathBuf {
    let data = root.join("Data");
    write_bytes(
        &data,
        "Rebels_DISTR.ini",
        b"\xEF\xBB\xBFKeyword = RebelTag|NONE|StormcloakFaction\nOutfit = RebelArmor|RebelTag\n",
    );
    write_bytes(
        &data,
        "Cycle_DISTR.ini",
        b"Keyword = LoopA|LoopB\nKeyword = LoopB|LoopA\nOutfit = FarmClothes|LoopA\n",
    );
    write_bytes(
        &data,
        "Legacy_DISTR.ini",
        b"; r\xE9gion\nOutfit = KingArmor|UlfricStormcloak\n",
    );
    write_bytes(
        &data,
        &format!("{NPC_DIR}/base.ini"),
        b"filterByKeywords=ActorTypeNPC:outfitDefault=FarmClothes\n",
    );
    write_bytes(&data, &format!("{NPC_DIR}/SkyPatcher.ini"), b"[control]\n");
    data
}

pub fn write_snapshot(root: &Path) -> PathBuf {
    write_bytes(root, "snapshot.json", SNAPSHOT.as_bytes())
}
