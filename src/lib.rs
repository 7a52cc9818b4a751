// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Furrow: a drone-scripting farm simulation.
//!
//! Player scripts in a restricted Python-like language drive a drone over a
//! toroidal field. Every drone or inventory call suspends the script for a
//! real-time duration derived from its operation cost, while the field grows
//! in between.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   CLI / trial runner / host         │
//! ├─────────────────────────────────────┤
//! │   Script: validate → transform →    │
//! │           interpret                 │
//! ├─────────────────────────────────────┤
//! │   Farm primitives + harvest rules   │
//! ├─────────────────────────────────────┤
//! │   Scheduler (throttle, growth)      │
//! ├─────────────────────────────────────┤
//! │   State store                       │
//! └─────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod host;
pub mod render;
pub mod scheduler;
pub mod script;
pub mod trial;

pub use config::{RunOptions, SimConfig};
pub use error::{Fault, FaultResult, ScriptError, StoreError};

// Re-export key game types at crate root for convenience
pub use game::{Cell, Coord, Direction, Entity, Farm, GameState, Ground, Item, StateStore};
pub use host::{RunOutcome, Termination, run_program, run_script};
pub use script::{Allowlist, Program, compile};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualClock;

    #[test]
    fn test_end_to_end_from_root() {
        let mut farm = Farm::new(GameState::default(), ManualClock::new(), SimConfig::default(), 1);
        let outcome = run_script(&mut farm, "delay(3)\nharvest()\n", &Allowlist::default(), &RunOptions::default());
        assert_eq!(outcome.termination, Termination::Completed);
        assert!((farm.store().item_count(Item::Hay) - 1.0).abs() < 1e-9);
    }
}
