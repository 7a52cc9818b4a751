//! Check command implementation.

use super::{CliError, read_script};
use furrow::script::{Allowlist, compile};
use std::path::Path;

/// Execute the check command.
///
/// # Errors
///
/// Returns an error if the script cannot be read or is rejected.
pub(crate) fn execute(script: &Path) -> Result<(), CliError> {
    let source = read_script(script)?;
    match compile(&source, &Allowlist::default()) {
        Ok(program) => {
            let defs = program.defined_functions().len();
            println!(
                "OK: {} ({} statements, {defs} functions)",
                script.display(),
                program.body.len()
            );
            Ok(())
        }
        Err(err) => {
            println!("{err}");
            Err(CliError::new(format!("{} was rejected", script.display())))
        }
    }
}
