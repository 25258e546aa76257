//! Result aggregation and reporting
//!
//! Collects per-test comparison results into the overall pass/fail signal.

use crate::compare::ComparisonResult;
use crate::error::{HarnessError, Result};
use crate::exit_code;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Comparison result for one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestComparison {
    pub name: String,
    #[serde(flatten)]
    pub result: ComparisonResult,
}

/// Append-only tally of comparison results
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<TestComparison>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the comparison for one test
    pub fn record(&mut self, test_name: &str, result: ComparisonResult) {
        self.records.push(TestComparison {
            name: test_name.to_string(),
            result,
        });
    }

    /// True if any recorded comparison found a discrepancy
    pub fn final_outcome(&self) -> bool {
        self.records.iter().any(|r| r.result.has_discrepancies())
    }

    /// Number of comparisons recorded
    pub fn compared(&self) -> usize {
        self.records.len()
    }

    /// Finish the run
    pub fn finish(self, tests_run: usize, duration: Duration) -> AggregateOutcome {
        let compared = self.compared();
        let discrepancies_found = self.final_outcome();
        let failing = self
            .records
            .into_iter()
            .filter(|r| r.result.has_discrepancies())
            .collect();

        AggregateOutcome {
            discrepancies_found,
            tests_run,
            compared,
            failing,
            duration,
        }
    }
}

/// Final result of a harness run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateOutcome {
    pub discrepancies_found: bool,
    /// Tests whose executable ran to a clean exit
    pub tests_run: usize,
    /// Tests compared against a baseline
    pub compared: usize,
    /// Per-test results with discrepancies, in catalog order
    pub failing: Vec<TestComparison>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

fn serialize_secs<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl AggregateOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.discrepancies_found {
            exit_code::DISCREPANCY
        } else {
            exit_code::SUCCESS
        }
    }

    /// Write the outcome as pretty JSON
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let write_err = |source: std::io::Error| HarnessError::WriteReport {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.into()))?;
        fs::write(path, json).map_err(write_err)
    }

    /// Print summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════╗");
        println!("║        UNIT TEST PLAYBACK SUMMARY        ║");
        println!("╠══════════════════════════════════════════╣");
        println!("║  Ran:       {:>5}                        ║", self.tests_run);
        println!("║  Compared:  {:>5}                        ║", self.compared);
        println!(
            "║  Differing: {:>5}                        ║",
            self.failing.len()
        );
        println!("║  Time:      {:>8.2?}                    ║", self.duration);
        println!("╚══════════════════════════════════════════╝");

        if !self.failing.is_empty() {
            println!("\nTests with discrepancies:");
            for test in &self.failing {
                println!(
                    "  ✗ {} ({} path(s))",
                    test.name,
                    test.result.path_count()
                );
                for path in &test.result.left_only {
                    println!("      missing:    {}", path);
                }
                for path in &test.result.right_only {
                    println!("      unexpected: {}", path);
                }
                for path in &test.result.diff_files {
                    println!("      changed:    {}", path);
                }
                for mismatch in &test.result.type_mismatches {
                    println!("      type:       {}", mismatch.path);
                }
            }
        }
    }
}
