//! Error types shared across the farm, the scheduler and the script host.
//!
//! Three families exist:
//! - [`ScriptError`]: admission faults. Execution never starts.
//! - [`Fault`]: runtime faults. Caught once by the host, always followed by teardown.
//! - [`StoreError`]: the state store refused an access. Surfaces as a [`Fault`].
//!
//! Game-rule rejections (not enough seeds, wrong ground) are not errors at all;
//! primitives report them as `false`.

use std::fmt;

use thiserror::Error;

/// Errors raised by a state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Coordinates outside the active world.
    #[error("coordinates ({x}, {y}) out of bounds for world size {size}")]
    OutOfBounds {
        /// Requested column.
        x: i64,
        /// Requested row.
        y: i64,
        /// Current world size.
        size: u16,
    },
    /// The stored data violates a structural invariant.
    #[error("corrupt game state: {0}")]
    Corrupt(String),
}

/// Category of an admission fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionKind {
    /// A forbidden keyword or token.
    Forbidden,
    /// A call to a name outside the allow-list.
    DisallowedCall,
    /// A `.` outside of the `Item`/`Entity`/`Ground` qualifiers.
    MemberAccess,
    /// The script does not parse.
    Syntax,
    /// The script parses but names something that does not exist.
    Unresolved,
}

/// A script rejected before execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ScriptError {
    /// Category of the fault.
    pub kind: AdmissionKind,
    /// 1-based line number.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    /// The offending physical line.
    pub source_line: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ScriptError {
    /// Create an admission fault, capturing the offending line from `source`.
    #[must_use]
    pub fn new(
        kind: AdmissionKind,
        source: &str,
        line: usize,
        column: usize,
        reason: impl Into<String>,
    ) -> Self {
        let source_line = source
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or_default()
            .to_string();
        Self {
            kind,
            line,
            column,
            source_line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Syntax Error:")?;
        writeln!(f, "Line {}", self.line)?;
        writeln!(f, "{}", self.source_line)?;
        writeln!(f, "{}^", " ".repeat(self.column))?;
        write!(f, "    -> {}", self.reason)
    }
}

/// A fault raised while a script is running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    /// The cooperative stop flag was set.
    #[error("Stopping execution")]
    Stopped,
    /// The state store rejected an access.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The script itself failed (type error, unknown name, ...).
    #[error("line {line}: {message}")]
    Script {
        /// Line of the statement that failed.
        line: usize,
        /// Description, prefixed with the error class.
        message: String,
    },
    /// The interpreter step budget ran out.
    #[error("step budget of {0} exhausted")]
    BudgetExhausted(u64),
}

impl Fault {
    /// Create a script fault.
    #[must_use]
    pub fn script(line: usize, message: impl Into<String>) -> Self {
        Self::Script {
            line,
            message: message.into(),
        }
    }

    /// Whether the fault came from the stop flag rather than from the script.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Result type for primitives and interpreter steps.
pub type FaultResult<T> = Result<T, Fault>;
