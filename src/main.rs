//! Furrow CLI - check, run and trial farm scripts.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Furrow - a drone-scripting farm simulation
#[derive(Parser, Debug)]
#[command(name = "furrow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a script without running it
    Check {
        /// Script file
        #[arg(required = true)]
        script: PathBuf,
    },

    /// Run a script on a farm
    Run {
        /// Script file
        #[arg(required = true)]
        script: PathBuf,

        /// Load the farm from a saved state (default: fresh 3x3 farm)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Save the final state to a file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Simulation constants (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Script speed multiplier
        #[arg(long)]
        speedup: Option<f64>,

        /// Active field edge length
        #[arg(short, long)]
        world_size: Option<u16>,

        /// Random seed (default: random)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Interpreter step budget
        #[arg(short, long)]
        budget: Option<u64>,

        /// Stop after this many seconds of play time
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Use a virtual clock instead of sleeping
        #[arg(long = "virtual")]
        virtual_clock: bool,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },

    /// Run many independent virtual-clock simulations and aggregate results
    Trial {
        /// Script file
        #[arg(required = true)]
        script: PathBuf,

        /// Number of runs (default: 100)
        #[arg(short, long, default_value = "100")]
        runs: u64,

        /// Starting seed (increments for each run)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Field edge length (default: 3)
        #[arg(short, long, default_value = "3")]
        world_size: u16,

        /// Play-time limit per run in seconds (default: 600)
        #[arg(short, long, default_value = "600")]
        time_limit: f64,

        /// Interpreter step budget per run
        #[arg(short, long)]
        budget: Option<u64>,

        /// Parallel threads (default: CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Output format: text, json, or csv
        #[arg(short, long, default_value = "text")]
        format: cli::TrialFormat,

        /// Show progress bar
        #[arg(short, long)]
        progress: bool,
    },

    /// Render a saved state
    Show {
        /// State file (JSON)
        #[arg(required = true)]
        state: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG overrides the verbosity flag.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Commands::Check { script } => cli::check::execute(&script),

        Commands::Run {
            script,
            state,
            save,
            config,
            speedup,
            world_size,
            seed,
            budget,
            time_limit,
            virtual_clock,
            format,
        } => cli::run::execute(cli::run::RunArgs {
            script,
            state,
            save,
            config,
            speedup,
            world_size,
            seed,
            budget,
            time_limit,
            virtual_clock,
            format,
        }),

        Commands::Trial {
            script,
            runs,
            seed,
            world_size,
            time_limit,
            budget,
            threads,
            format,
            progress,
        } => cli::trial::execute(&cli::trial::TrialArgs {
            script: &script,
            runs,
            seed,
            world_size,
            time_limit,
            budget,
            threads,
            format,
            progress,
        }),

        Commands::Show { state } => cli::show::execute(&state),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
