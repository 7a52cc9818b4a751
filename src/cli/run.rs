//! Run command implementation.

use super::output::{JsonRunResult, format_run_text};
use super::{CliError, OutputFormat, default_seed, read_script};
use furrow::config::{RunOptions, SimConfig};
use furrow::host::{SCRIPT_STACK_SIZE, run_script};
use furrow::render::render_state;
use furrow::scheduler::{Clock, ManualClock, SystemClock};
use furrow::script::Allowlist;
use furrow::{Farm, GameState, RunOutcome};
use std::path::PathBuf;
use std::thread;

/// Arguments for the run command.
#[derive(Debug)]
pub(crate) struct RunArgs {
    pub(crate) script: PathBuf,
    pub(crate) state: Option<PathBuf>,
    pub(crate) save: Option<PathBuf>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) speedup: Option<f64>,
    pub(crate) world_size: Option<u16>,
    pub(crate) seed: Option<u64>,
    pub(crate) budget: Option<u64>,
    pub(crate) time_limit: Option<f64>,
    pub(crate) virtual_clock: bool,
    pub(crate) format: OutputFormat,
}

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the inputs cannot be loaded or the script fails.
pub(crate) fn execute(args: RunArgs) -> Result<(), CliError> {
    let source = read_script(&args.script)?;
    let config = match &args.config {
        Some(path) => SimConfig::try_load(path)?,
        None => SimConfig::default(),
    };
    let mut state = match &args.state {
        Some(path) => GameState::load(path)?,
        None => GameState::default(),
    };
    if let Some(size) = args.world_size {
        if size > state.settings.max_world_size {
            state = GameState::new(size, size)?;
        } else {
            state.resize_world(size)?;
        }
    }
    if let Some(speedup) = args.speedup {
        state.settings.speedup = speedup;
    }
    let seed = args.seed.unwrap_or_else(default_seed);
    let options = RunOptions {
        step_budget: args.budget,
        time_limit: args.time_limit,
    };
    let echo = args.format == OutputFormat::Text;

    let (outcome, transcript, state) = if args.virtual_clock {
        run_on_thread(Farm::new(state, ManualClock::new(), config, seed), source, options, echo)?
    } else {
        run_on_thread(Farm::new(state, SystemClock::new(), config, seed), source, options, echo)?
    };

    if let Some(path) = &args.save {
        state.save(path)?;
    }

    match args.format {
        OutputFormat::Text => {
            println!();
            print!("{}", render_state(&state));
            println!();
            print!("{}", format_run_text(&outcome));
        }
        OutputFormat::Json => {
            let json_result = JsonRunResult::new(seed, &outcome, &transcript, &state);
            let json = serde_json::to_string_pretty(&json_result)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    if outcome.succeeded() {
        Ok(())
    } else {
        Err(CliError::new("script failed"))
    }
}

/// Run on a thread with a stack deep enough for recursive scripts.
fn run_on_thread<C>(
    mut farm: Farm<GameState, C>,
    source: String,
    options: RunOptions,
    echo: bool,
) -> Result<(RunOutcome, Vec<String>, GameState), CliError>
where
    C: Clock + Send + 'static,
{
    if echo {
        farm.set_echo(|line| println!("{line}"));
    }
    let handle = thread::Builder::new()
        .name("script".to_string())
        .stack_size(SCRIPT_STACK_SIZE)
        .spawn(move || {
            let outcome = run_script(&mut farm, &source, &Allowlist::default(), &options);
            let transcript = farm.take_transcript();
            (outcome, transcript, farm.into_store())
        })?;
    handle
        .join()
        .map_err(|_| CliError::new("script thread panicked"))
}
