//! Unit Test Playback Runner
//!
//! Runs each catalog executable in playback mode and compares its output against a baseline.
//!
//! Usage:
//!   run-unit-tests metal|gl|d3d11 /path/to/built/exes /path/to/json_files \
//!       /path/to/binary_output [/path/to/old_cmp_binary_output]
//!
//! The last argument can be skipped when generating the output (i.e. the first run).
//!
//! Exit codes: 0 success, -1 usage error, -2 discrepancies found, -3 fatal error.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use ut_harness::{
    exit_code, AggregateOutcome, ApiBackend, HarnessConfig, RunContext, TestInvoker, TestRunner,
};

#[derive(Parser)]
#[command(name = "run-unit-tests")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run engine unit tests in playback mode and compare against a baseline", long_about = None)]
#[command(after_help = "The baseline folder can be skipped when generating the output (i.e. first run)")]
struct Cli {
    /// Graphics API the executables were built for
    #[arg(value_enum)]
    api: ApiBackend,

    /// Folder containing the built test executables
    exe_folder: PathBuf,

    /// Folder containing the playback (json) files
    playback_folder: PathBuf,

    /// Folder the fresh output is written to
    output_folder: PathBuf,

    /// Previously captured output to compare against
    baseline_folder: Option<PathBuf>,

    /// Harness config file (TOML) with the test catalog and run options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of tests to run at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Per-test timeout in seconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// Source of the gl backend configuration file
    #[arg(long)]
    gl_config: Option<PathBuf>,

    /// Only run tests whose name contains this pattern
    #[arg(long)]
    filter: Option<String>,

    /// Write a JSON report of the run
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Printing can only fail if stdout/stderr is gone
            let _ = e.print();
            std::process::exit(usage_exit_code(e.kind()));
        }
    };

    init_logging(cli.verbose);
    tracing::info!("Launched with {:?}", std::env::args().collect::<Vec<_>>());

    let result = run(cli);
    if let Err(ref e) = result {
        tracing::error!("Fatal: {:#}", e);
    }
    std::process::exit(exit_code_for(&result));
}

/// Exit code for a command line that clap refused
fn usage_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_code::SUCCESS,
        _ => exit_code::USAGE,
    }
}

/// Exit code for a finished (or aborted) run
fn exit_code_for(result: &Result<AggregateOutcome>) -> i32 {
    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(_) => exit_code::FATAL,
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<AggregateOutcome> {
    let config = match cli.config {
        Some(ref path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    let catalog = config.catalog()?;

    let context = RunContext::new(
        cli.api,
        &cli.exe_folder,
        &cli.playback_folder,
        &cli.output_folder,
        cli.baseline_folder.as_deref(),
    )
    .context("Failed to resolve run folders")?;

    let timeout = match cli.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.run.timeout(),
    };

    let mut runner = TestRunner::new(catalog, context)
        .with_invoker(TestInvoker::new().with_timeout(timeout))
        .with_jobs(cli.jobs.unwrap_or(config.run.jobs))
        .with_gl_config(cli.gl_config.unwrap_or(config.run.gl_config));

    if let Some(ref pattern) = cli.filter {
        tracing::info!("Running tests matching: {}", pattern);
        runner.filter(pattern);
    }

    let outcome = runner.run()?;
    outcome.print_summary();

    if let Some(ref path) = cli.report {
        outcome.write_report(path)?;
        tracing::info!("Report written to {}", path.display());
    }

    if outcome.discrepancies_found {
        tracing::warn!("Discrepancies found against the baseline");
    } else if runner.context().is_comparing() {
        println!("\nAll tests match the baseline!");
    }

    Ok(outcome)
}
