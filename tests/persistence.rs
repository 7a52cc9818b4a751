//! State and configuration files on disk.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::fs;

use tempfile::TempDir;

use furrow::config::{ConfigError, SimConfig};
use furrow::render::render_state;
use furrow::scheduler::ManualClock;
use furrow::{Allowlist, Entity, Farm, GameState, Item, RunOptions, StateStore, StoreError, run_script};

#[test]
fn test_state_survives_a_save_between_runs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("farm.json");

    let mut farm = Farm::new(GameState::default(), ManualClock::new(), SimConfig::default(), 5);
    let outcome = run_script(&mut farm, "delay(3)\nharvest()\nmove(East)\n", &Allowlist::default(), &RunOptions::default());
    assert!(outcome.succeeded());
    farm.store().save(&path).unwrap();

    let loaded = GameState::load(&path).unwrap();
    assert_eq!(loaded.drone, farm.store().drone);
    assert_eq!(loaded.settings, farm.store().settings);
    assert!((loaded.item_count(Item::Hay) - 1.0).abs() < 1e-9);
    assert_eq!(loaded.drone.position.x, 1);

    let mut farm = Farm::new(loaded, ManualClock::new(), SimConfig::default(), 5);
    run_script(&mut farm, "move(West)\nharvest()\n", &Allowlist::default(), &RunOptions::default());
    assert_eq!(farm.store().drone.position.x, 0);
    assert!(render_state(farm.store()).contains("- Hay: 1\n"));
}

#[test]
fn test_state_documents_use_store_identifiers() {
    let mut state = GameState::new(2, 2).unwrap();
    state.set_item_count(Item::CarrotSeed, 2.0);
    let json = state.to_json().unwrap();
    assert!(json.contains("\"CARROT_SEED\""));
    assert!(json.contains("\"HAY\""));
    assert!(json.contains("\"DIRT\""));
}

#[test]
fn test_corrupt_state_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(GameState::load(&path), Err(StoreError::Corrupt(_))));

    let mut state = GameState::new(3, 3).unwrap();
    state.field.pop();
    fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();
    assert!(matches!(GameState::load(&path), Err(StoreError::Corrupt(_))));
    assert!(GameState::load(&dir.path().join("missing.json")).is_err());
}

#[test]
fn test_partial_config_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sim.toml");
    fs::write(&path, "ops_per_second = 500.0\n\n[costs]\nprint_ops = 10\n").unwrap();

    let config = SimConfig::try_load(&path).unwrap();
    assert!((config.ops_per_second - 500.0).abs() < f64::EPSILON);
    assert_eq!(config.costs.print_ops, 10);
    assert_eq!(config.costs.default_ops, 200);
    assert!((config.water_decay - SimConfig::default().water_decay).abs() < f64::EPSILON);
}

#[test]
fn test_config_drives_the_simulation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sim.toml");
    fs::write(&path, "ops_per_second = 100.0\n").unwrap();
    let config = SimConfig::try_load(&path).unwrap();

    let mut farm = Farm::new(GameState::default(), ManualClock::new(), config, 1);
    let outcome = run_script(&mut farm, "move(North)\n", &Allowlist::default(), &RunOptions::default());
    assert!(outcome.succeeded());
    // 200 operations at 100 per second.
    assert!((farm.clock_time() - 2.0).abs() < 1e-9);
}

#[test]
fn test_bad_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sim.toml");
    fs::write(&path, "ops_per_second = \"fast\"\n").unwrap();
    assert!(matches!(SimConfig::try_load(&path), Err(ConfigError::Parse { .. })));
    assert_eq!(SimConfig::load_from_path(&path), SimConfig::default());
    assert_eq!(SimConfig::load_from_path(&dir.path().join("none.toml")), SimConfig::default());
}

#[test]
fn test_world_resize_keeps_field() {
    let mut state = GameState::new(6, 6).unwrap();
    state.drone.position = furrow::Coord::new(5, 5);
    state.resize_world(3).unwrap();
    assert_eq!(state.drone.position, furrow::Coord::new(2, 2));
    assert_eq!(state.cells().count(), 9);
    assert!(state.cells().all(|(_, cell)| cell.entity == Entity::Hay));
    assert!(state.resize_world(7).is_err());
}
