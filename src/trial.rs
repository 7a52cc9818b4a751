//! Parallel trial runner.
//!
//! A trial is one independent run of a compiled script on a fresh farm with a
//! virtual clock: `(seed, program) -> TrialResult`. Trials share nothing but
//! the immutable [`Program`], so many of them run in parallel on a rayon pool
//! and their results fold into [`TrialStats`].

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{RunOptions, SimConfig};
use crate::error::StoreError;
use crate::game::{Farm, GameState, Item, Settings};
use crate::host::{RunOutcome, SCRIPT_STACK_SIZE, Termination, run_program};
use crate::scheduler::ManualClock;
use crate::script::Program;

/// Errors raised before any trial runs.
#[derive(Debug, Error)]
pub enum TrialError {
    /// The requested field cannot be built.
    #[error("invalid trial field: {0}")]
    Field(#[from] StoreError),
    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    /// Nothing to run.
    #[error("at least one run is required")]
    NoRuns,
}

/// Trial parameters shared by every run.
#[derive(Debug, Clone, Copy)]
pub struct TrialConfig {
    /// Number of independent runs.
    pub runs: u64,
    /// Seed of the first run; run `i` uses `base_seed + i`.
    pub base_seed: u64,
    /// Field edge length.
    pub world_size: u16,
    /// Script speed multiplier.
    pub speedup: f64,
    /// Worker threads; `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Per-run limits.
    pub options: RunOptions,
    /// Simulation constants.
    pub sim: SimConfig,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            runs: 16,
            base_seed: 0,
            world_size: Settings::default().current_world_size,
            speedup: 1.0,
            threads: None,
            options: RunOptions {
                step_budget: Some(10_000_000),
                time_limit: Some(600.0),
            },
            sim: SimConfig::default(),
        }
    }
}

/// Result of a single trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    /// Seed used for planting ranks and the script's random builtins.
    pub seed: u64,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Final inventory.
    pub inventory: BTreeMap<Item, f64>,
}

/// Build a fresh farm for one trial.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] for an unusable world size.
pub fn trial_farm(seed: u64, config: &TrialConfig) -> Result<Farm<GameState, ManualClock>, StoreError> {
    let mut state = GameState::new(config.world_size, config.world_size)?;
    state.settings.speedup = config.speedup;
    Ok(Farm::new(state, ManualClock::new(), config.sim, seed))
}

/// Run `program` once on a fresh farm.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] for an unusable world size.
pub fn run_trial(seed: u64, program: &Program, config: &TrialConfig) -> Result<TrialResult, StoreError> {
    let mut farm = trial_farm(seed, config)?;
    let outcome = run_program(&mut farm, program, &config.options);
    debug!(seed, termination = ?outcome.termination, "trial finished");
    Ok(TrialResult {
        seed,
        outcome,
        inventory: farm.into_store().inventory,
    })
}

/// Run `config.runs` trials in parallel, calling `on_done` after each one.
///
/// # Errors
///
/// Returns an error if there are no runs, the field is invalid, or the worker
/// pool cannot be built.
pub fn run_trials<F>(program: &Program, config: &TrialConfig, on_done: F) -> Result<TrialStats, TrialError>
where
    F: Fn() + Sync,
{
    if config.runs == 0 {
        return Err(TrialError::NoRuns);
    }
    // Fail fast on a bad field before spawning anything.
    trial_farm(config.base_seed, config)?;

    let mut builder = rayon::ThreadPoolBuilder::new().stack_size(SCRIPT_STACK_SIZE);
    if let Some(threads) = config.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;
    info!(runs = config.runs, threads = pool.current_num_threads(), "trials started");

    // Each worker folds into its own stats; partial stats merge at the end.
    let stats = pool.install(|| {
        (0..config.runs)
            .into_par_iter()
            .fold(TrialStats::new, |mut local, i| {
                let seed = config.base_seed.wrapping_add(i);
                if let Ok(result) = run_trial(seed, program, config) {
                    local.add_result(&result);
                }
                on_done();
                local
            })
            .reduce(TrialStats::new, |mut a, b| {
                a.merge(&b);
                a
            })
    });
    info!(runs = stats.runs, faults = stats.faults, "trials finished");
    Ok(stats)
}

/// Aggregated trial results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialStats {
    /// Trials completed.
    pub runs: u64,
    /// Trials that ran to the end of the script.
    pub completed: u64,
    /// Trials ended by the stop flag or the time limit.
    pub stopped: u64,
    /// Trials that faulted, were rejected or ran out of steps.
    pub faults: u64,
    /// First fault message seen, for reporting.
    pub first_fault: Option<String>,
    total_steps: u64,
    total_play_time: f64,
    item_sums: BTreeMap<Item, f64>,
    item_sq_sums: BTreeMap<Item, f64>,
}

impl TrialStats {
    /// Empty stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one trial into the stats.
    pub fn add_result(&mut self, result: &TrialResult) {
        self.runs += 1;
        match result.outcome.termination {
            Termination::Completed => self.completed += 1,
            Termination::Stopped => self.stopped += 1,
            Termination::Rejected | Termination::Faulted | Termination::BudgetExhausted => {
                self.faults += 1;
                if self.first_fault.is_none() {
                    self.first_fault.clone_from(&result.outcome.error);
                }
            }
        }
        self.total_steps += result.outcome.steps;
        self.total_play_time += result.outcome.play_time;
        for (&item, &amount) in &result.inventory {
            *self.item_sums.entry(item).or_default() += amount;
            *self.item_sq_sums.entry(item).or_default() += amount * amount;
        }
    }

    /// Merge stats gathered on another worker.
    pub fn merge(&mut self, other: &TrialStats) {
        self.runs += other.runs;
        self.completed += other.completed;
        self.stopped += other.stopped;
        self.faults += other.faults;
        if self.first_fault.is_none() {
            self.first_fault.clone_from(&other.first_fault);
        }
        self.total_steps += other.total_steps;
        self.total_play_time += other.total_play_time;
        for (&item, &sum) in &other.item_sums {
            *self.item_sums.entry(item).or_default() += sum;
        }
        for (&item, &sum) in &other.item_sq_sums {
            *self.item_sq_sums.entry(item).or_default() += sum;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn count(&self) -> f64 {
        self.runs as f64
    }

    /// Mean interpreter steps per trial.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_steps(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.total_steps as f64 / self.count()
    }

    /// Mean play time per trial, in seconds.
    #[must_use]
    pub fn avg_play_time(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.total_play_time / self.count()
    }

    /// Mean final amount of `item`.
    #[must_use]
    pub fn avg_item(&self, item: Item) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.item_sums.get(&item).copied().unwrap_or(0.0) / self.count()
    }

    /// Population standard deviation of the final amount of `item`.
    #[must_use]
    pub fn std_dev(&self, item: Item) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        let mean = self.avg_item(item);
        let sq = self.item_sq_sums.get(&item).copied().unwrap_or(0.0) / self.count();
        (sq - mean * mean).max(0.0).sqrt()
    }

    /// Items that ended non-zero in at least one trial.
    pub fn items(&self) -> impl Iterator<Item = Item> + '_ {
        Item::ALL
            .into_iter()
            .filter(|item| self.item_sums.get(item).is_some_and(|&sum| sum > 0.0))
    }
}
