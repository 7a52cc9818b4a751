//! Show command implementation.

use super::CliError;
use furrow::GameState;
use furrow::render::render_state;
use std::path::Path;

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if the state file cannot be loaded.
pub(crate) fn execute(state: &Path) -> Result<(), CliError> {
    let state = GameState::load(state)?;
    print!("{}", render_state(&state));
    Ok(())
}
