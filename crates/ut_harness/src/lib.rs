//! Unit Test Playback Harness
//!
//! Drives externally built engine test executables in playback mode, captures the files
//! each one writes into a fresh output tree, and optionally compares that tree against a
//! previously captured baseline.
//!
//! # Pipeline
//!
//! - **Catalog**: ordered list of test executables and their playback files
//! - **Invoker**: launches one executable with `--ut_playback=` / `--ut_output=`
//! - **Comparator**: classifies baseline vs. fresh differences (missing, extraneous, changed)
//! - **Runner**: walks the catalog, invoking and comparing each test
//! - **Aggregator**: folds comparisons into the final pass/fail signal
//!
//! Comparison is byte-for-byte; file contents are never interpreted.

pub mod aggregate;
pub mod catalog;
pub mod compare;
pub mod config;
pub mod context;
pub mod error;
pub mod invoker;
pub mod paths;
pub mod runner;

pub use aggregate::{AggregateOutcome, ResultAggregator, TestComparison};
pub use catalog::{TestCase, TestCatalog};
pub use compare::{compare_dirs, ComparisonResult, EntryKind, TypeMismatch};
pub use config::HarnessConfig;
pub use context::{ApiBackend, RunContext};
pub use error::{HarnessError, Result};
pub use invoker::{ExecutionOutcome, Invocation, Termination, TestInvoker};
pub use runner::TestRunner;

/// Process exit codes reported by `run-unit-tests`
pub mod exit_code {
    /// All tests ran and no discrepancies were found
    pub const SUCCESS: i32 = 0;
    /// Malformed invocation
    pub const USAGE: i32 = -1;
    /// At least one baseline comparison found a discrepancy
    pub const DISCREPANCY: i32 = -2;
    /// A test executable or a required filesystem operation failed
    pub const FATAL: i32 = -3;
}
