//! Script admission and execution.
//!
//! Source text goes through four stages:
//! - [`lexer`]: tokens with physical line/column positions
//! - [`validate`]: the allow-list scan, then [`parser`] into an [`ast::Program`]
//! - [`transform`]: calls resolved to primitives, the `print` alias, builtins
//!   or user functions
//! - [`interp`]: a tree walker that suspends at every primitive call
//!
//! [`compile`] runs the first three; the host runs the last.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;
use crate::game::Primitive;

pub mod ast;
pub mod builtins;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod transform;
pub mod validate;
pub mod value;

pub use ast::Program;
pub use builtins::Builtin;
pub use interp::{Interpreter, MAX_CALL_DEPTH};
pub use value::Value;

/// Names a script may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowlist {
    /// Standard names routed to internal aliases (`print`).
    pub standard: BTreeSet<String>,
    /// Farm primitives.
    pub library: BTreeSet<String>,
    /// Pure builtins.
    pub builtins: BTreeSet<String>,
}

impl Default for Allowlist {
    fn default() -> Self {
        Self {
            standard: BTreeSet::from(["print".to_string()]),
            library: Primitive::ALL.iter().map(|p| p.name().to_string()).collect(),
            builtins: Builtin::ALL.iter().map(|b| b.name().to_string()).collect(),
        }
    }
}

impl Allowlist {
    /// Whether `name` may be called.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.standard.contains(name) || self.library.contains(name) || self.builtins.contains(name)
    }
}

/// Validate, parse and resolve `source`.
///
/// # Errors
///
/// The first admission fault, formatted for display with the offending line
/// and a caret under the column.
pub fn compile(source: &str, allowlist: &Allowlist) -> Result<Program, ScriptError> {
    let program = validate::validate(source, allowlist)?;
    transform::transform(source, program, allowlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdmissionKind;

    #[test]
    fn test_default_allowlist() {
        let allowlist = Allowlist::default();
        assert!(allowlist.contains("print"));
        assert!(allowlist.contains("harvest"));
        assert!(allowlist.contains("sorted"));
        assert!(!allowlist.contains("open"));
        assert!(!allowlist.contains("eval"));
        assert_eq!(allowlist.library.len(), Primitive::ALL.len());
    }

    #[test]
    fn test_compile_reports_first_fault() {
        let err = compile("move(North)\nimport os\n", &Allowlist::default()).unwrap_err();
        assert_eq!(err.kind, AdmissionKind::Forbidden);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_program_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Program>();
    }

    #[test]
    fn test_allowlist_serde() {
        let json = serde_json::to_string(&Allowlist::default()).unwrap();
        let back: Allowlist = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Allowlist::default());
    }
}
