//! Plain-text rendering of a game state.
//!
//! ```text
//! === FIELD 3x3, 12.40s ===
//!      0   1   2
//!   2  h   h   h
//!   1  h   H   p~
//!   0 @H   h   .~
//!
//! INVENTORY:
//! - Hay: 3
//! ```
//!
//! Letters are upper case once the occupant is fully grown, `~` marks tilled
//! ground and `@` the drone. North is up.

#![allow(clippy::format_push_string)]

use crate::game::{Cell, Coord, Entity, GameState, Ground, Item};

/// Render field, inventory and run status.
#[must_use]
pub fn render_state(state: &GameState) -> String {
    let mut output = String::new();
    render_field(&mut output, state);
    output.push('\n');
    render_inventory(&mut output, state);
    render_status(&mut output, state);
    output
}

fn render_field(output: &mut String, state: &GameState) {
    let size = state.settings.current_world_size;
    let stride = state.settings.max_world_size;
    output.push_str(&format!("=== FIELD {size}x{size}, {:.2}s ===\n", state.time));

    let mut header = String::from("   ");
    for x in 0..size {
        header.push_str(&format!("  {x:<2}"));
    }
    output.push_str(header.trim_end());
    output.push('\n');

    for y in (0..size).rev() {
        let mut row = format!("{y:>3}");
        for x in 0..size {
            let pos = Coord::new(x, y);
            let Some(cell) = state.field.get(pos.index(stride)) else {
                row.push_str("  ? ");
                continue;
            };
            let drone = if state.drone.position == pos { '@' } else { ' ' };
            let ground = if cell.ground == Ground::Tilled { '~' } else { ' ' };
            row.push_str(&format!(" {drone}{}{ground}", cell_symbol(cell)));
        }
        output.push_str(row.trim_end());
        output.push('\n');
    }
}

/// One-letter code for a cell's occupant.
#[must_use]
pub fn cell_symbol(cell: &Cell) -> char {
    let letter = match cell.entity {
        Entity::Nothing => return '.',
        Entity::Hay => 'h',
        Entity::Bush => 'b',
        Entity::Tree => 't',
        Entity::Carrot => 'c',
        Entity::Pumpkin => 'p',
        Entity::Sunflower => 's',
        Entity::Cactus => 'x',
    };
    if cell.is_grown() {
        letter.to_ascii_uppercase()
    } else {
        letter
    }
}

fn render_inventory(output: &mut String, state: &GameState) {
    output.push_str("INVENTORY:\n");
    let mut empty = true;
    for item in Item::ALL {
        let amount = state.inventory.get(&item).copied().unwrap_or(0.0);
        if amount > 0.0 {
            empty = false;
            output.push_str(&format!("- {}: {}\n", item.display_name(), format_amount(amount)));
        }
    }
    if empty {
        output.push_str("- (empty)\n");
    }
}

fn render_status(output: &mut String, state: &GameState) {
    let communication = &state.communication;
    if communication.running {
        output.push_str("\nA script is running.\n");
    }
    if let Some(error) = &communication.error {
        output.push_str(&format!("\nLAST ERROR:\n{error}\n"));
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
