//! Test runner for executing the catalog
//!
//! Runs every catalog entry through the invoker and, when a baseline folder is configured,
//! compares the fresh output of each test against its baseline subtree. A test executable
//! that does not exit cleanly aborts the whole run; baseline differences never do.

use crate::aggregate::{AggregateOutcome, ResultAggregator};
use crate::catalog::{TestCase, TestCatalog};
use crate::compare::{compare_dirs, ComparisonResult};
use crate::config::GL_CONFIG_TARGET;
use crate::context::RunContext;
use crate::error::{HarnessError, Result};
use crate::invoker::TestInvoker;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// Outcome slot for one test in a parallel run
type Slot = Option<Result<Option<ComparisonResult>>>;

/// Drives a catalog through the invoker and comparator
pub struct TestRunner {
    catalog: TestCatalog,
    context: RunContext,
    invoker: TestInvoker,
    /// Worker threads (1 = sequential)
    jobs: usize,
    /// Source of the gl backend configuration file
    gl_config: PathBuf,
    /// Filter pattern (None = run all)
    filter: Option<String>,
}

impl TestRunner {
    /// Create a sequential runner
    pub fn new(catalog: TestCatalog, context: RunContext) -> Self {
        Self {
            catalog,
            context,
            invoker: TestInvoker::new(),
            jobs: 1,
            gl_config: PathBuf::from("ogreGL.cfg"),
            filter: None,
        }
    }

    pub fn with_invoker(mut self, invoker: TestInvoker) -> Self {
        self.invoker = invoker;
        self
    }

    /// Run up to `jobs` tests at once
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_gl_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.gl_config = path.into();
        self
    }

    /// Set a filter pattern
    pub fn filter(&mut self, pattern: &str) -> &mut Self {
        self.filter = Some(pattern.to_string());
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Tests that will run, in catalog order
    pub fn selected_cases(&self) -> Vec<TestCase> {
        match self.filter {
            Some(ref pattern) => self.catalog.filtered(pattern),
            None => self.catalog.cases().to_vec(),
        }
    }

    /// Run all selected tests
    pub fn run(&self) -> Result<AggregateOutcome> {
        let start = Instant::now();
        self.prepare_backend()?;

        let cases = self.selected_cases();
        if cases.is_empty() {
            tracing::warn!("No tests selected");
        }
        if !self.context.is_comparing() {
            tracing::info!("No baseline folder given; generating output only");
        }

        let mut aggregator = ResultAggregator::new();
        if self.jobs > 1 && cases.len() > 1 {
            for (case, comparison) in cases.iter().zip(self.run_parallel(&cases)?) {
                if let Some(result) = comparison {
                    aggregator.record(&case.name, result);
                }
            }
        } else {
            for case in &cases {
                if let Some(result) = self.run_case(case, None)? {
                    aggregator.record(&case.name, result);
                }
            }
        }

        Ok(aggregator.finish(cases.len(), start.elapsed()))
    }

    /// Copy the backend configuration file next to the executables, if the backend needs one
    fn prepare_backend(&self) -> Result<()> {
        if !self.context.api_backend.needs_config_file() {
            return Ok(());
        }

        let target = self.context.executable_folder.join(GL_CONFIG_TARGET);
        tracing::info!(
            "Copying {} config {} to {}",
            self.context.api_backend,
            self.gl_config.display(),
            target.display()
        );
        copy_config(&self.gl_config, &target)
    }

    /// Invoke one test and compare its output against the baseline
    fn run_case(
        &self,
        case: &TestCase,
        cancel: Option<&AtomicBool>,
    ) -> Result<Option<ComparisonResult>> {
        let outcome = self.invoker.run(case, &self.context, cancel)?;
        if !outcome.is_success() {
            tracing::error!("  ✗ {} {}", case.name, outcome.termination);
            return Err(HarnessError::TestFailed {
                name: case.name.clone(),
                termination: outcome.termination,
            });
        }

        let Some(baseline) = self.context.baseline_dir_for(&case.name) else {
            tracing::info!("  ✓ {} ({:?})", case.name, outcome.duration);
            return Ok(None);
        };

        let result = compare_dirs(&baseline, &outcome.output_dir)?;
        result.log(&case.name);
        if result.is_identical() {
            tracing::info!("  ✓ {} ({:?})", case.name, outcome.duration);
        } else {
            tracing::warn!("  ✗ {} ({:?})", case.name, outcome.duration);
        }
        Ok(Some(result))
    }

    /// Run the cases on scoped worker threads.
    ///
    /// The first fatal error stops new tests from starting and kills running ones. Results
    /// come back in catalog order.
    fn run_parallel(&self, cases: &[TestCase]) -> Result<Vec<Option<ComparisonResult>>> {
        let next = AtomicUsize::new(0);
        let cancel = AtomicBool::new(false);
        let slots: Mutex<Vec<Slot>> = Mutex::new((0..cases.len()).map(|_| None).collect());
        let workers = self.jobs.min(cases.len());

        tracing::debug!("Running {} tests on {} workers", cases.len(), workers);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if cancel.load(Ordering::Acquire) {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::AcqRel);
                    let Some(case) = cases.get(index) else {
                        break;
                    };

                    let result = self.run_case(case, Some(&cancel));
                    if result.is_err() {
                        cancel.store(true, Ordering::Release);
                    }
                    slots.lock()[index] = Some(result);
                });
            }
        });

        let mut comparisons = Vec::with_capacity(cases.len());
        let mut first_error: Option<HarnessError> = None;
        for slot in slots.into_inner() {
            match slot {
                Some(Ok(result)) => comparisons.push(result),
                Some(Err(e)) => {
                    // A cancelled test only reflects someone else's failure
                    let replace = match &first_error {
                        None => true,
                        Some(current) => current.is_cancellation() && !e.is_cancellation(),
                    };
                    if replace {
                        first_error = Some(e);
                    }
                }
                None => {}
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(comparisons),
        }
    }
}

fn copy_config(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|source| HarnessError::CopyConfig {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
}
