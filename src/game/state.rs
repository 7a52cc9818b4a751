//! The shared state store.
//!
//! The simulation core only talks to state through [`StateStore`]. [`GameState`]
//! is the in-memory implementation; its serde layout is the JSON document the
//! presentation layer exchanges with the core.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::game::{Cell, Coord, Item, coords};

/// Largest supported world edge.
pub const MAX_WORLD_SIZE: u16 = 256;

/// Player-facing settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Script speed multiplier.
    pub speedup: f64,
    /// Edge length of the allocated field.
    pub max_world_size: u16,
    /// Edge length of the active play area.
    pub current_world_size: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speedup: 1.0,
            max_world_size: 3,
            current_world_size: 3,
        }
    }
}

/// Drone position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Drone {
    /// Current cell.
    pub position: Coord,
    /// Cell before the last move.
    pub last_position: Coord,
}

/// Flags shared with whoever launched the script.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Communication {
    /// A script is executing.
    pub running: bool,
    /// Cooperative stop request, checked at every tick.
    pub stop_running: bool,
    /// Message of the last failed run.
    pub error: Option<String>,
}

/// Typed access to the shared state.
///
/// Implementations must keep the field addressable for every coordinate inside
/// the current world and must reject anything outside it.
pub trait StateStore {
    /// Current settings.
    fn settings(&self) -> Settings;

    /// Drone position and previous position.
    fn drone(&self) -> Drone;

    /// Move the drone, recording the previous position.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfBounds`] outside the current world.
    fn set_drone_position(&mut self, position: Coord) -> Result<(), StoreError>;

    /// The cell at `position`, unclamped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfBounds`] outside the current world.
    fn cell(&self, position: Coord) -> Result<Cell, StoreError>;

    /// Overwrite the cell at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfBounds`] outside the current world.
    fn set_cell(&mut self, position: Coord, cell: Cell) -> Result<(), StoreError>;

    /// Raw inventory amount.
    fn item_count(&self, item: Item) -> f64;

    /// Overwrite an inventory amount.
    fn set_item_count(&mut self, item: Item, amount: f64);

    /// Whether a stop has been requested.
    fn stop_requested(&self) -> bool;

    /// Request the running script to stop at its next tick.
    fn request_stop(&mut self);

    /// Withdraw a stop request before a new run.
    fn clear_stop(&mut self);

    /// Total simulated play time in seconds.
    fn play_time(&self) -> f64;

    /// Advance simulated play time.
    fn add_play_time(&mut self, seconds: f64);

    /// Mark a script as running or finished.
    fn set_running(&mut self, running: bool);

    /// Record or clear the last failure message.
    fn set_error(&mut self, error: Option<String>);

    /// Edge length of the active world.
    fn world_size(&self) -> u16 {
        self.settings().current_world_size
    }

    /// Add to an inventory amount.
    fn add_items(&mut self, item: Item, amount: f64) {
        let current = self.item_count(item);
        self.set_item_count(item, current + amount);
    }

    /// Subtract from an inventory amount.
    fn remove_items(&mut self, item: Item, amount: f64) {
        let current = self.item_count(item);
        self.set_item_count(item, current - amount);
    }

    /// Read-modify-write a cell.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfBounds`] outside the current world.
    fn update_cell<F>(&mut self, position: Coord, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Cell),
        Self: Sized,
    {
        let mut cell = self.cell(position)?;
        f(&mut cell);
        self.set_cell(position, cell)
    }
}

/// In-memory game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Total simulated play time in seconds.
    pub time: f64,
    /// Run flags.
    pub communication: Communication,
    /// Settings.
    pub settings: Settings,
    /// Drone.
    pub drone: Drone,
    /// `max_world_size²` cells, row-major.
    pub field: Vec<Cell>,
    /// Item amounts; missing items count as zero.
    pub inventory: BTreeMap<Item, f64>,
}

impl Default for GameState {
    fn default() -> Self {
        let settings = Settings::default();
        Self::with_settings(settings)
    }
}

impl GameState {
    /// Create a fresh state: Hay on dirt everywhere, empty inventory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the sizes are zero, too large, or the
    /// current size exceeds the maximum.
    pub fn new(max_world_size: u16, current_world_size: u16) -> Result<Self, StoreError> {
        let settings = Settings {
            max_world_size,
            current_world_size,
            ..Settings::default()
        };
        validate_settings(&settings)?;
        Ok(Self::with_settings(settings))
    }

    fn with_settings(settings: Settings) -> Self {
        let cells = usize::from(settings.max_world_size) * usize::from(settings.max_world_size);
        Self {
            time: 0.0,
            communication: Communication::default(),
            settings,
            drone: Drone::default(),
            field: vec![Cell::default(); cells],
            inventory: Item::ALL.into_iter().map(|item| (item, 0.0)).collect(),
        }
    }

    /// Parse and validate a state document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the JSON is malformed or inconsistent.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let state: Self =
            serde_json::from_str(json).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        state.validate()?;
        Ok(state)
    }

    /// Serialize to a pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if serialization fails.
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Load a state document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = fs::read_to_string(path)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Write the state document to disk.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))
    }

    /// Check structural invariants of a loaded document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] describing the first inconsistency.
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_settings(&self.settings)?;
        let expected =
            usize::from(self.settings.max_world_size) * usize::from(self.settings.max_world_size);
        if self.field.len() != expected {
            return Err(StoreError::Corrupt(format!(
                "field has {} cells, expected {expected}",
                self.field.len()
            )));
        }
        let size = self.settings.current_world_size;
        if !self.drone.position.in_world(size) {
            return Err(StoreError::Corrupt(format!(
                "drone at {:?} outside world of size {size}",
                self.drone.position
            )));
        }
        Ok(())
    }

    /// Iterate the active world's cells with their coordinates, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (Coord, &Cell)> {
        let stride = self.settings.max_world_size;
        coords(self.settings.current_world_size)
            .filter_map(move |coord| self.field.get(coord.index(stride)).map(|cell| (coord, cell)))
    }

    /// Change the active world size, clamping the drone into the new bounds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if `size` is zero or exceeds the maximum.
    pub fn resize_world(&mut self, size: u16) -> Result<(), StoreError> {
        let settings = Settings {
            current_world_size: size,
            ..self.settings
        };
        validate_settings(&settings)?;
        self.settings = settings;
        let clamp = |c: Coord| Coord::new(c.x.min(size - 1), c.y.min(size - 1));
        self.drone.position = clamp(self.drone.position);
        self.drone.last_position = clamp(self.drone.last_position);
        Ok(())
    }

    fn index_of(&self, position: Coord) -> Result<usize, StoreError> {
        let size = self.settings.current_world_size;
        if position.in_world(size) {
            Ok(position.index(self.settings.max_world_size))
        } else {
            Err(StoreError::OutOfBounds {
                x: i64::from(position.x),
                y: i64::from(position.y),
                size,
            })
        }
    }
}

fn validate_settings(settings: &Settings) -> Result<(), StoreError> {
    if settings.max_world_size == 0 || settings.max_world_size > MAX_WORLD_SIZE {
        return Err(StoreError::Corrupt(format!(
            "max world size {} outside 1..={MAX_WORLD_SIZE}",
            settings.max_world_size
        )));
    }
    if settings.current_world_size == 0
        || settings.current_world_size > settings.max_world_size
    {
        return Err(StoreError::Corrupt(format!(
            "current world size {} outside 1..={}",
            settings.current_world_size, settings.max_world_size
        )));
    }
    if !settings.speedup.is_finite() || settings.speedup <= 0.0 {
        return Err(StoreError::Corrupt(format!(
            "speedup {} must be positive",
            settings.speedup
        )));
    }
    Ok(())
}

impl StateStore for GameState {
    fn settings(&self) -> Settings {
        self.settings
    }

    fn drone(&self) -> Drone {
        self.drone
    }

    fn set_drone_position(&mut self, position: Coord) -> Result<(), StoreError> {
        self.index_of(position)?;
        self.drone.last_position = self.drone.position;
        self.drone.position = position;
        Ok(())
    }

    fn cell(&self, position: Coord) -> Result<Cell, StoreError> {
        let idx = self.index_of(position)?;
        self.field
            .get(idx)
            .copied()
            .ok_or_else(|| StoreError::Corrupt(format!("missing cell {idx}")))
    }

    fn set_cell(&mut self, position: Coord, cell: Cell) -> Result<(), StoreError> {
        let idx = self.index_of(position)?;
        let slot = self
            .field
            .get_mut(idx)
            .ok_or_else(|| StoreError::Corrupt(format!("missing cell {idx}")))?;
        *slot = cell;
        Ok(())
    }

    fn item_count(&self, item: Item) -> f64 {
        self.inventory.get(&item).copied().unwrap_or(0.0)
    }

    fn set_item_count(&mut self, item: Item, amount: f64) {
        self.inventory.insert(item, amount);
    }

    fn stop_requested(&self) -> bool {
        self.communication.stop_running
    }

    fn request_stop(&mut self) {
        self.communication.stop_running = true;
    }

    fn clear_stop(&mut self) {
        self.communication.stop_running = false;
    }

    fn play_time(&self) -> f64 {
        self.time
    }

    fn add_play_time(&mut self, seconds: f64) {
        self.time += seconds;
    }

    fn set_running(&mut self, running: bool) {
        self.communication.running = running;
    }

    fn set_error(&mut self, error: Option<String>) {
        self.communication.error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Entity, Ground};

    #[test]
    fn test_new_state_is_hay_on_dirt() {
        let state = GameState::new(4, 3).unwrap();
        assert_eq!(state.field.len(), 16);
        assert_eq!(state.cells().count(), 9);
        for (_, cell) in state.cells() {
            assert_eq!(cell.entity, Entity::Hay);
            assert_eq!(cell.ground, Ground::Dirt);
        }
        assert!(state.item_count(Item::Power).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(GameState::new(0, 0).is_err());
        assert!(GameState::new(3, 4).is_err());
        assert!(GameState::new(MAX_WORLD_SIZE + 1, 1).is_err());
    }

    #[test]
    fn test_cell_access_uses_max_stride() {
        let mut state = GameState::new(5, 3).unwrap();
        let pos = Coord::new(1, 2);
        state.set_cell(pos, Cell::new(Entity::Tree, Ground::Dirt)).unwrap();
        assert_eq!(state.field[2 * 5 + 1].entity, Entity::Tree);
        assert_eq!(state.cell(pos).unwrap().entity, Entity::Tree);
    }

    #[test]
    fn test_out_of_current_world_rejected() {
        let mut state = GameState::new(5, 3).unwrap();
        let outside = Coord::new(3, 0);
        assert!(matches!(
            state.cell(outside),
            Err(StoreError::OutOfBounds { x: 3, y: 0, size: 3 })
        ));
        assert!(state.set_drone_position(outside).is_err());
        assert_eq!(state.drone().position, Coord::new(0, 0));
    }

    #[test]
    fn test_drone_records_last_position() {
        let mut state = GameState::new(3, 3).unwrap();
        state.set_drone_position(Coord::new(1, 0)).unwrap();
        state.set_drone_position(Coord::new(1, 1)).unwrap();
        let drone = state.drone();
        assert_eq!(drone.position, Coord::new(1, 1));
        assert_eq!(drone.last_position, Coord::new(1, 0));
    }

    #[test]
    fn test_json_round_trip_and_validation() {
        let mut state = GameState::new(3, 2).unwrap();
        state.add_items(Item::CarrotSeed, 2.5);
        let json = state.to_json().unwrap();
        assert!(json.contains("\"CARROT_SEED\": 2.5"));
        let loaded = GameState::from_json(&json).unwrap();
        assert_eq!(loaded, state);

        let mut broken = state.clone();
        broken.field.pop();
        let json = serde_json::to_string(&broken).unwrap();
        assert!(matches!(GameState::from_json(&json), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = GameState::new(3, 3).unwrap();
        state.add_items(Item::Wood, 4.0);
        state.save(&path).unwrap();
        let loaded = GameState::load(&path).unwrap();
        assert!((loaded.item_count(Item::Wood) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resize_clamps_drone() {
        let mut state = GameState::new(6, 6).unwrap();
        state.set_drone_position(Coord::new(5, 4)).unwrap();
        state.resize_world(3).unwrap();
        assert_eq!(state.drone().position, Coord::new(2, 2));
        assert!(state.resize_world(7).is_err());
    }
}
