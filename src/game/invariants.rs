//! Farm invariants - sanity checks that detect bugs.
//!
//! No sequence of primitives should ever break these. They are bug detectors,
//! not gameplay limits.

use crate::game::{GameState, Item};

/// Inventory amounts may dip below zero by rounding noise, never further.
pub const INVENTORY_TOLERANCE: f64 = 1e-9;

/// Invariant violation error.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// Check all farm invariants.
///
/// Returns a list of violations found, or empty if all invariants hold.
#[must_use]
pub fn check_invariants(state: &GameState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if let Err(err) = state.validate() {
        violations.push(InvariantViolation {
            message: err.to_string(),
        });
        return violations;
    }

    for (coord, cell) in state.cells() {
        if !cell.raw_growth().is_finite() || !cell.raw_water().is_finite() {
            violations.push(InvariantViolation {
                message: format!("Cell at {coord:?} has non-finite growth or water"),
            });
        }

        // Seeded plants cannot stand on dirt; untilling clears them.
        if cell.entity.requires_tilled() && cell.ground != crate::game::Ground::Tilled {
            violations.push(InvariantViolation {
                message: format!("{} at {coord:?} stands on untilled ground", cell.entity),
            });
        }

        match (cell.measure, cell.entity.measure_ranks()) {
            (Some(rank), Some(ranks)) if !ranks.contains(&rank) => {
                violations.push(InvariantViolation {
                    message: format!("{} at {coord:?} has measure {rank} outside {ranks:?}", cell.entity),
                });
            }
            (Some(rank), None) => {
                violations.push(InvariantViolation {
                    message: format!("{} at {coord:?} has unexpected measure {rank}", cell.entity),
                });
            }
            _ => {}
        }
    }

    for item in Item::ALL {
        let amount = state.inventory.get(&item).copied().unwrap_or(0.0);
        if !amount.is_finite() || amount < -INVENTORY_TOLERANCE {
            violations.push(InvariantViolation {
                message: format!("Inventory holds {amount} {item}"),
            });
        }
    }

    violations
}

/// Assert all farm invariants hold, panicking if any are violated.
///
/// Only active in debug builds. No-op in release builds.
///
/// # Panics
///
/// Panics with detailed message if any invariant is violated.
#[cfg(debug_assertions)]
pub fn assert_invariants(state: &GameState) {
    let violations = check_invariants(state);
    if !violations.is_empty() {
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        panic!("Farm invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants(_state: &GameState) {}
