//! Output formatting utilities for CLI.

use furrow::trial::TrialStats;
use furrow::{GameState, Item, RunOutcome};
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON-serializable run result.
#[derive(Debug, Serialize)]
pub(super) struct JsonRunResult<'a> {
    /// Seed used.
    pub(super) seed: u64,
    /// How the run ended.
    pub(super) outcome: &'a RunOutcome,
    /// Printed lines.
    pub(super) transcript: &'a [String],
    /// Final inventory.
    pub(super) inventory: &'a BTreeMap<Item, f64>,
}

impl<'a> JsonRunResult<'a> {
    /// Create from a finished run.
    pub(super) fn new(seed: u64, outcome: &'a RunOutcome, transcript: &'a [String], state: &'a GameState) -> Self {
        Self {
            seed,
            outcome,
            transcript,
            inventory: &state.inventory,
        }
    }
}

/// Format a run summary as human-readable text.
pub(super) fn format_run_text(outcome: &RunOutcome) -> String {
    let mut output = String::new();
    output.push_str(&format!("Run {:?}\n", outcome.termination));
    output.push_str(&format!("  Play time: {:.2}s\n", outcome.play_time));
    output.push_str(&format!(
        "  Steps: {}  Ticks: {}  Operations: {}\n",
        outcome.steps, outcome.ticks, outcome.operations
    ));
    if let Some(error) = &outcome.error {
        output.push('\n');
        output.push_str(error);
        output.push('\n');
    }
    output
}

/// JSON-serializable trial summary.
#[derive(Debug, Serialize)]
pub(super) struct JsonTrialResult {
    /// Trials completed.
    pub(super) runs: u64,
    /// Trials that reached the end of the script.
    pub(super) completed: u64,
    /// Trials ended by the time limit.
    pub(super) stopped: u64,
    /// Trials that failed.
    pub(super) faults: u64,
    /// First failure message.
    pub(super) first_fault: Option<String>,
    /// Mean interpreter steps.
    pub(super) avg_steps: f64,
    /// Mean play time in seconds.
    pub(super) avg_play_time: f64,
    /// Per-item results.
    pub(super) items: Vec<JsonItemResult>,
}

/// JSON-serializable per-item result.
#[derive(Debug, Serialize)]
pub(super) struct JsonItemResult {
    /// Store identifier.
    pub(super) item: &'static str,
    /// Mean final amount.
    pub(super) mean: f64,
    /// Standard deviation of the final amount.
    pub(super) std_dev: f64,
}

impl JsonTrialResult {
    /// Create from aggregated stats.
    pub(super) fn from_stats(stats: &TrialStats) -> Self {
        Self {
            runs: stats.runs,
            completed: stats.completed,
            stopped: stats.stopped,
            faults: stats.faults,
            first_fault: stats.first_fault.clone(),
            avg_steps: stats.avg_steps(),
            avg_play_time: stats.avg_play_time(),
            items: stats
                .items()
                .map(|item| JsonItemResult {
                    item: item.identifier(),
                    mean: stats.avg_item(item),
                    std_dev: stats.std_dev(item),
                })
                .collect(),
        }
    }
}

/// Format trial results as human-readable text.
pub(super) fn format_trial_text(stats: &TrialStats) -> String {
    let mut output = String::new();
    output.push_str(&format!("Trial Results ({} runs)\n", stats.runs));
    output.push_str(&format!(
        "  Completed: {}  Stopped: {}  Faults: {}\n",
        stats.completed, stats.stopped, stats.faults
    ));
    output.push_str(&format!(
        "  Avg steps: {:.0}  Avg play time: {:.2}s\n\n",
        stats.avg_steps(),
        stats.avg_play_time()
    ));

    output.push_str("Item              Mean      Std Dev\n");
    output.push_str("------------------------------------\n");
    for item in stats.items() {
        output.push_str(&format!(
            "{:<15} {:>8.2} {:>10.2}\n",
            item.display_name(),
            stats.avg_item(item),
            stats.std_dev(item)
        ));
    }

    if let Some(fault) = &stats.first_fault {
        output.push_str(&format!("\nFirst fault:\n{fault}\n"));
    }
    output
}

/// Format trial results as CSV.
pub(super) fn format_trial_csv(stats: &TrialStats) -> String {
    let mut output = String::from("item,mean,std_dev,runs\n");
    for item in stats.items() {
        output.push_str(&format!(
            "{},{:.4},{:.4},{}\n",
            item.identifier(),
            stats.avg_item(item),
            stats.std_dev(item),
            stats.runs
        ));
    }
    output
}
