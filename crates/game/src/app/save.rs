use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use lemsim_engine::sim::state_digest;
use lemsim_engine::{replace_save_slot, SimulationWorld, WorldSnapshot};
use serde::{Deserialize, Serialize};

pub(crate) const SAVE_VERSION: u32 = 1;
const SAVES_DIR: &str = "saves";

pub(crate) type SaveLoadResult<T> = Result<T, String>;

/// Quick-save file: one slot per level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SaveGame {
    pub(crate) save_version: u32,
    pub(crate) level_name: String,
    pub(crate) tick: u64,
    pub(crate) digest: String,
    pub(crate) world: WorldSnapshot,
}

pub(crate) fn save_file_path(cache_dir: &Path, level_name: &str) -> PathBuf {
    cache_dir
        .join(SAVES_DIR)
        .join(format!("{level_name}.save.json"))
}

pub(crate) fn build_save_game(world: &SimulationWorld) -> SaveGame {
    SaveGame {
        save_version: SAVE_VERSION,
        level_name: world.level_name().to_string(),
        tick: world.clock().elapsed_ticks(),
        digest: world.state_digest(),
        world: world.snapshot(),
    }
}

pub(crate) fn write_save(path: &Path, save: &SaveGame) -> SaveLoadResult<()> {
    let json =
        serde_json::to_string_pretty(save).map_err(|error| format!("encode save json: {error}"))?;
    replace_save_slot(path, &json)
        .map_err(|error| format!("write save '{}': {error}", path.display()))
}

pub(crate) fn load_and_validate_save(path: &Path, expected_level: &str) -> SaveLoadResult<SaveGame> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read save '{}': {error}", path.display()))?;
    let save = parse_save_game_json(&raw)?;
    validate_save_game(&save, expected_level)?;
    Ok(save)
}

fn parse_save_game_json(raw: &str) -> SaveLoadResult<SaveGame> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveGame>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            format!("parse save json: {source}")
        } else {
            format!("parse save json at {path}: {source}")
        }
    })
}

fn validation_err(path: &str, message: impl Into<String>) -> String {
    format!("validation failed at {path}: {}", message.into())
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> String {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

fn validate_save_game(save: &SaveGame, expected_level: &str) -> SaveLoadResult<()> {
    if save.save_version != SAVE_VERSION {
        return Err(expected_actual(
            "save_version",
            SAVE_VERSION,
            save.save_version,
        ));
    }
    if save.level_name != expected_level {
        return Err(expected_actual("level_name", expected_level, &save.level_name));
    }
    if save.world.level_name != save.level_name {
        return Err(expected_actual(
            "world.level_name",
            &save.level_name,
            &save.world.level_name,
        ));
    }
    for (index, agent) in save.world.agents.iter().enumerate() {
        for (field, value) in [("x", agent.x), ("y", agent.y)] {
            if !value.is_finite() {
                return Err(expected_actual(
                    &format!("world.agents[{index}].{field}"),
                    "finite number",
                    value,
                ));
            }
        }
    }
    let digest = state_digest(&save.world.collision, &save.world.agents);
    if digest != save.digest {
        return Err(expected_actual("digest", &save.digest, digest));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use lemsim_engine::sim::{Facing, LevelData, Raster, Rgba, ToolInventory};
    use tempfile::TempDir;

    use super::*;

    fn small_world() -> SimulationWorld {
        let mut collision = Raster::filled(120, 80, Rgba::TRANSPARENT);
        for y in 60..80 {
            for x in 0..120 {
                collision.set(x, y, Rgba::rgb(90, 60, 30));
            }
        }
        collision.set(20, 10, Rgba::SPAWN_MARKER);
        SimulationWorld::from_level(LevelData {
            name: "meadow".into(),
            label: "Meadow".into(),
            agent_count: 2,
            release_rate: 10,
            facing: Facing::Right,
            tools: ToolInventory::default(),
            collision,
            visual: None,
        })
        .expect("world")
    }

    #[test]
    fn save_round_trip_restores_the_same_digest() {
        let temp = TempDir::new().expect("temp");
        let mut world = small_world();
        for _ in 0..20 {
            world.tick(33.0);
        }
        let path = save_file_path(temp.path(), world.level_name());
        let save = build_save_game(&world);
        write_save(&path, &save).expect("write");

        let expected = world.state_digest();
        for _ in 0..20 {
            world.tick(33.0);
        }
        assert_ne!(world.state_digest(), expected);

        let loaded = load_and_validate_save(&path, "meadow").expect("load");
        world.restore(loaded.world).expect("restore");
        assert_eq!(world.state_digest(), expected);
    }

    #[test]
    fn saving_again_keeps_the_previous_save_as_backup() {
        let temp = TempDir::new().expect("temp");
        let mut world = small_world();
        let path = save_file_path(temp.path(), world.level_name());
        write_save(&path, &build_save_game(&world)).expect("first");
        let first_digest = world.state_digest();
        for _ in 0..10 {
            world.tick(33.0);
        }
        write_save(&path, &build_save_game(&world)).expect("second");

        let current = load_and_validate_save(&path, "meadow").expect("current");
        assert_eq!(current.digest, world.state_digest());
        let backup =
            load_and_validate_save(&lemsim_engine::content::backup_path(&path), "meadow")
                .expect("backup");
        assert_eq!(backup.digest, first_digest);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let world = small_world();
        let mut save = build_save_game(&world);
        save.save_version = SAVE_VERSION + 1;
        let err = validate_save_game(&save, "meadow").expect_err("err");
        assert!(err.starts_with("validation failed at save_version"));
    }

    #[test]
    fn save_for_another_level_is_rejected() {
        let world = small_world();
        let save = build_save_game(&world);
        let err = validate_save_game(&save, "tundra").expect_err("err");
        assert!(err.contains("level_name"));
    }

    #[test]
    fn tampered_terrain_fails_digest_check() {
        let world = small_world();
        let mut save = build_save_game(&world);
        save.world.collision.set(5, 5, Rgba::WHITE);
        let err = validate_save_game(&save, "meadow").expect_err("err");
        assert!(err.contains("digest"));
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        let world = small_world();
        let json = serde_json::to_string(&build_save_game(&world)).expect("encode");
        let broken = json.replacen("\"tick\":0", "\"tick\":\"soon\"", 1);
        let err = parse_save_game_json(&broken).expect_err("err");
        assert!(err.starts_with("parse save json at tick"), "{err}");
    }

    #[test]
    fn missing_file_reports_its_path() {
        let temp = TempDir::new().expect("temp");
        let path = save_file_path(temp.path(), "meadow");
        let err = load_and_validate_save(&path, "meadow").expect_err("err");
        assert!(err.contains("meadow.save.json"));
    }
}
