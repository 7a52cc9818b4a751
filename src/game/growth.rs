//! Per-cell growth and water decay.

use crate::config::SimConfig;
use crate::error::StoreError;
use crate::game::{Cell, Entity, StateStore, coords};

/// Effective growth rate of `cell` given how many cardinal neighbors are trees.
#[must_use]
pub fn growth_rate(cell: &Cell, adjacent_trees: u32, config: &SimConfig) -> f64 {
    let base = cell.entity.growth_rate();
    let mut rate = base * (1.0 + config.max_water_speedup * cell.water());
    if cell.entity == Entity::Tree {
        rate /= 2f64.powi(i32::try_from(adjacent_trees).unwrap_or(i32::MAX));
    }
    rate
}

/// Advance a single cell by `dt` seconds.
pub fn step_cell(cell: &mut Cell, adjacent_trees: u32, dt: f64, config: &SimConfig) {
    if cell.entity != Entity::Nothing {
        let rate = growth_rate(cell, adjacent_trees, config);
        cell.set_growth(cell.growth() + rate * dt);
    }
    let water = cell.water();
    cell.set_water(water - config.water_decay * water * dt);
}

/// Advance every cell of the current world by `dt` seconds.
///
/// Entities never change during a step, so neighbor counts are taken from the
/// same snapshot the cell is read from.
///
/// # Errors
///
/// Propagates store errors.
pub fn step_field<S: StateStore>(store: &mut S, dt: f64, config: &SimConfig) -> Result<(), StoreError> {
    let size = store.world_size();
    for pos in coords(size) {
        let mut cell = store.cell(pos)?;
        let mut adjacent_trees = 0;
        if cell.entity == Entity::Tree {
            for neighbor in pos.neighbors(size) {
                if store.cell(neighbor)?.entity == Entity::Tree {
                    adjacent_trees += 1;
                }
            }
        }
        step_cell(&mut cell, adjacent_trees, dt, config);
        store.set_cell(pos, cell)?;
    }
    Ok(())
}
