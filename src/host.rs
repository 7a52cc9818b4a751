//! Execution host.
//!
//! Runs a compiled program on a farm, catches the first fault, records it in
//! the store and always clears the `running` flag on the way out.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::RunOptions;
use crate::error::Fault;
use crate::game::{Farm, StateStore};
use crate::scheduler::Clock;
use crate::script::{Allowlist, Interpreter, Program, compile};

/// Stack size for threads that run scripts. Deep user recursion needs more
/// than the platform default.
pub const SCRIPT_STACK_SIZE: usize = 256 * 1024 * 1024;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The script ran to its end.
    Completed,
    /// The stop flag or the time limit ended the run.
    Stopped,
    /// The script was rejected before it started.
    Rejected,
    /// A runtime fault ended the run.
    Faulted,
    /// The step budget ran out.
    BudgetExhausted,
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// How the run ended.
    pub termination: Termination,
    /// Message shown to the player when the run failed or was stopped.
    pub error: Option<String>,
    /// Interpreter steps executed.
    pub steps: u64,
    /// Play time consumed by this run, in seconds.
    pub play_time: f64,
    /// Scheduler ticks.
    pub ticks: u64,
    /// Operations charged.
    pub operations: u64,
}

impl RunOutcome {
    /// Whether the run completed or was stopped on request.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.termination, Termination::Completed | Termination::Stopped)
    }
}

/// Run `program` on `farm`.
///
/// The store's `running` flag is set for the duration of the run and cleared
/// on every exit path; its `error` holds the failure message, if any.
pub fn run_program<S: StateStore, C: Clock>(
    farm: &mut Farm<S, C>,
    program: &Program,
    options: &RunOptions,
) -> RunOutcome {
    let start_time = farm.store().play_time();
    {
        let store = farm.store_mut();
        store.clear_stop();
        store.set_error(None);
        store.set_running(true);
    }
    let deadline = options.time_limit.map(|limit| start_time + limit);
    let scheduler = farm.scheduler_mut();
    scheduler.reset();
    scheduler.set_deadline(deadline);
    info!(statements = program.body.len(), ?deadline, "run started");

    let mut interpreter = Interpreter::new(farm).with_step_budget(options.step_budget);
    let result = interpreter.run(program);
    let steps = interpreter.steps();

    let (termination, error) = match result {
        Ok(()) => (Termination::Completed, None),
        Err(fault @ Fault::Stopped) => (Termination::Stopped, Some(fault_message(&fault))),
        Err(fault @ Fault::BudgetExhausted(_)) => (Termination::BudgetExhausted, Some(fault_message(&fault))),
        Err(fault) => (Termination::Faulted, Some(fault_message(&fault))),
    };
    match (&error, termination) {
        (Some(message), Termination::Stopped) => info!(%message, "run stopped"),
        (Some(message), _) => warn!(%message, "run failed"),
        (None, _) => {}
    }

    farm.scheduler_mut().set_deadline(None);
    let store = farm.store_mut();
    store.set_error(error.clone());
    store.set_running(false);
    let play_time = farm.store().play_time() - start_time;
    let stats = farm.scheduler().stats();
    let outcome = RunOutcome {
        termination,
        error,
        steps,
        play_time,
        ticks: stats.ticks,
        operations: stats.operations,
    };
    info!(
        termination = ?outcome.termination,
        steps,
        play_time,
        ticks = outcome.ticks,
        "run finished"
    );
    outcome
}

/// Admit `source` and run it.
///
/// Admission faults are reported like runtime faults: `running` ends false
/// and `error` holds the formatted message.
pub fn run_script<S: StateStore, C: Clock>(
    farm: &mut Farm<S, C>,
    source: &str,
    allowlist: &Allowlist,
    options: &RunOptions,
) -> RunOutcome {
    match compile(source, allowlist) {
        Ok(program) => run_program(farm, &program, options),
        Err(err) => {
            let message = err.to_string();
            warn!(line = err.line, reason = %err.reason, "script rejected");
            let store = farm.store_mut();
            store.set_error(Some(message.clone()));
            store.set_running(false);
            RunOutcome {
                termination: Termination::Rejected,
                error: Some(message),
                steps: 0,
                play_time: 0.0,
                ticks: 0,
                operations: 0,
            }
        }
    }
}

/// Player-facing text for a fault.
#[must_use]
pub fn fault_message(fault: &Fault) -> String {
    match fault {
        Fault::Script { line, message } => format!("Error on line {line}: {message}"),
        other => format!("Error: {other}"),
    }
}
