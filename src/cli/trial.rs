//! Trial command implementation.

use super::output::{JsonTrialResult, format_trial_csv, format_trial_text};
use super::{CliError, TrialFormat, default_seed, read_script};
use furrow::config::RunOptions;
use furrow::script::{Allowlist, compile};
use furrow::trial::{TrialConfig, run_trials};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;

/// Arguments for the trial command.
#[derive(Debug)]
pub(crate) struct TrialArgs<'a> {
    pub(crate) script: &'a Path,
    pub(crate) runs: u64,
    pub(crate) seed: Option<u64>,
    pub(crate) world_size: u16,
    pub(crate) time_limit: f64,
    pub(crate) budget: Option<u64>,
    pub(crate) threads: Option<usize>,
    pub(crate) format: TrialFormat,
    pub(crate) progress: bool,
}

/// Execute the trial command.
///
/// # Errors
///
/// Returns an error if the script is rejected or the trials cannot start.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn execute(args: &TrialArgs<'_>) -> Result<(), CliError> {
    let source = read_script(args.script)?;
    // Compile once; every trial shares the program.
    let program = compile(&source, &Allowlist::default()).map_err(|err| CliError::new(err.to_string()))?;

    let defaults = TrialConfig::default();
    let config = TrialConfig {
        runs: args.runs,
        base_seed: args.seed.unwrap_or_else(default_seed),
        world_size: args.world_size,
        threads: args.threads,
        options: RunOptions {
            step_budget: args.budget.or(defaults.options.step_budget),
            time_limit: Some(args.time_limit),
        },
        ..defaults
    };

    let pb = if args.progress {
        let pb = ProgressBar::new(args.runs);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} runs ({per_sec})")
                .map_err(|e| CliError::new(format!("invalid progress template: {e}")))?
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let stats = run_trials(&program, &config, || {
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    })?;
    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }
    let duration = start.elapsed();

    let runs_per_sec = if duration.as_secs_f64() > 0.0 {
        stats.runs as f64 / duration.as_secs_f64()
    } else {
        0.0
    };

    match args.format {
        TrialFormat::Text => {
            println!();
            println!("Seed: {}", config.base_seed);
            print!("{}", format_trial_text(&stats));
            println!();
            println!("Duration: {:.2}s ({runs_per_sec:.0} runs/sec)", duration.as_secs_f64());
        }
        TrialFormat::Json => {
            let json_result = JsonTrialResult::from_stats(&stats);
            let json = serde_json::to_string_pretty(&json_result)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
        TrialFormat::Csv => {
            print!("{}", format_trial_csv(&stats));
        }
    }

    Ok(())
}
