//! The system tick.
//!
//! Every game-affecting primitive ends with one call to [`Scheduler::tick`],
//! which is the only place a running script yields. A tick:
//!
//! 1. faults with [`Fault::Stopped`] if the stop flag is set;
//! 2. runs one field simulation step and bucket refill if a frame has passed;
//! 3. drains Power for the operations charged;
//! 4. sleeps in proportion to the operations, halved while Power remains.

mod clock;

pub use clock::{Clock, MAX_SLEEP_SECONDS, ManualClock, SystemClock};

use tracing::{info, trace};

use crate::config::SimConfig;
use crate::error::{Fault, FaultResult};
use crate::game::{Item, StateStore, step_field};

/// Counters describing the work a scheduler has done.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    /// Ticks performed.
    pub ticks: u64,
    /// Operations charged.
    pub operations: u64,
    /// Field simulation steps run.
    pub frames: u64,
    /// Seconds spent suspended.
    pub suspended: f64,
}

/// Scheduler state for one simulation.
#[derive(Debug)]
pub struct Scheduler<C: Clock> {
    clock: C,
    config: SimConfig,
    last_tick: f64,
    last_fill: f64,
    deadline: Option<f64>,
    stats: TickStats,
}

impl<C: Clock> Scheduler<C> {
    /// Create a scheduler whose frame and fill timers start now.
    pub fn new(clock: C, config: SimConfig) -> Self {
        let now = clock.now();
        Self {
            clock,
            config,
            last_tick: now,
            last_fill: now,
            deadline: None,
            stats: TickStats::default(),
        }
    }

    /// Restart the frame and fill timers at the current time and clear counters.
    pub fn reset(&mut self) {
        let now = self.clock.now();
        self.last_tick = now;
        self.last_fill = now;
        self.deadline = None;
        self.stats = TickStats::default();
    }

    /// Raise the stop flag once play time reaches `deadline`.
    pub fn set_deadline(&mut self, deadline: Option<f64>) {
        self.deadline = deadline;
    }

    /// Simulation constants.
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The underlying clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Counters since creation or the last reset.
    pub const fn stats(&self) -> TickStats {
        self.stats
    }

    /// Seconds a tick charging `operations` would sleep right now.
    pub fn suspend_duration<S: StateStore>(&self, store: &S, operations: u32) -> f64 {
        let mut speedup = store.settings().speedup;
        if store.item_count(Item::Power) > 0.0 {
            speedup *= self.config.power_speedup;
        }
        f64::from(operations) / (self.config.ops_per_second * speedup)
    }

    /// Suspend without charging operations.
    pub fn sleep(&mut self, seconds: f64) {
        if seconds > 0.0 {
            let seconds = seconds.min(MAX_SLEEP_SECONDS);
            self.clock.sleep(seconds);
            self.stats.suspended += seconds;
        }
    }

    /// Run one system tick charging `operations`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Stopped`] if the stop flag is set, or a store fault.
    pub fn tick<S: StateStore>(&mut self, store: &mut S, operations: u32) -> FaultResult<()> {
        if let Some(deadline) = self.deadline
            && store.play_time() >= deadline
            && !store.stop_requested()
        {
            info!(play_time = store.play_time(), "time limit reached, stopping");
            store.request_stop();
        }
        if store.stop_requested() {
            return Err(Fault::Stopped);
        }

        let now = self.clock.now();
        let elapsed = now - self.last_tick;
        if elapsed > self.config.frame_time {
            self.last_tick = now;
            store.add_play_time(elapsed);
            step_field(store, elapsed, &self.config)?;
            self.fill_buckets(store, now);
            self.stats.frames += 1;
            trace!(elapsed, play_time = store.play_time(), "frame");
        }

        self.drain_power(store, operations);
        let duration = self.suspend_duration(store, operations);
        self.stats.ticks += 1;
        self.stats.operations += u64::from(operations);
        trace!(operations, duration, "tick");
        self.sleep(duration);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn fill_buckets<S: StateStore>(&mut self, store: &mut S, now: f64) {
        let rate = self.config.bucket_fill_rate;
        let whole = ((now - self.last_fill) * rate).floor().max(0.0);
        self.last_fill += whole / rate;
        let filled = whole.min(store.item_count(Item::EmptyBucket).floor().max(0.0));
        if filled > 0.0 {
            store.remove_items(Item::EmptyBucket, filled);
            store.add_items(Item::FullBucket, filled);
            trace!(filled = filled as u64, "buckets filled");
        }
    }

    fn drain_power<S: StateStore>(&self, store: &mut S, operations: u32) {
        let power = store.item_count(Item::Power);
        let drained = (power - f64::from(operations) * self.config.power_per_op).max(0.0);
        store.set_item_count(Item::Power, drained);
    }
}
