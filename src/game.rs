//! Farm layer.
//!
//! Implements the game rules on top of the state store:
//! - Static catalogs of items, entities and ground
//! - The field grid and its cells
//! - Growth and water decay
//! - Harvest resolution
//! - Drone and inventory primitives

mod catalog;
mod field;
mod growth;
pub mod harvest;
pub mod invariants;
mod primitives;
mod state;

pub use catalog::{Direction, Entity, Ground, Item};
pub use field::{Cell, Coord, coords};
pub use growth::{growth_rate, step_cell, step_field};
pub use harvest::{Coloring, HarvestOutcome, Verdict};
pub use primitives::{Farm, MAX_TRANSCRIPT_LINES, Primitive};
pub use state::{Communication, Drone, GameState, MAX_WORLD_SIZE, Settings, StateStore};
