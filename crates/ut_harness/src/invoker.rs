//! Test invoker
//!
//! Launches one test executable in playback mode. The executable receives two arguments:
//!
//! ```text
//! --ut_playback=<absolute playback file>
//! --ut_output=<absolute output folder>
//! ```
//!
//! and runs with the executable folder as its working directory. The invoker only reports how
//! the process terminated; deciding whether that aborts the run is up to the caller.

use crate::catalog::TestCase;
use crate::context::RunContext;
use crate::error::{HarnessError, Result};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Flag carrying the playback file path
pub const PLAYBACK_FLAG: &str = "--ut_playback=";
/// Flag carrying the output folder path
pub const OUTPUT_FLAG: &str = "--ut_output=";

/// How a test executable finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited normally with this status code
    Exited(i32),
    /// Terminated by a signal (no exit code)
    Signaled,
    /// Killed after exceeding the configured timeout
    TimedOut,
    /// Killed because another test failed first
    Cancelled,
}

impl Termination {
    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Termination::Exited(code),
            None => Termination::Signaled,
        }
    }

    pub fn is_success(self) -> bool {
        self == Termination::Exited(0)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exited with status {}", code),
            Termination::Signaled => f.write_str("was terminated by a signal"),
            Termination::TimedOut => f.write_str("timed out"),
            Termination::Cancelled => f.write_str("was cancelled"),
        }
    }
}

/// Result of running one test executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub termination: Termination,
    /// Folder the executable was told to write into
    pub output_dir: PathBuf,
    pub duration: Duration,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.termination.is_success()
    }

    /// Exit code, when the process exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(code) => Some(code),
            _ => None,
        }
    }
}

/// Fully resolved command line for one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Invocation {
    /// Resolve the executable, playback file and output folder for `case`
    pub fn plan(case: &TestCase, context: &RunContext) -> Self {
        let program = context.executable_folder.join(&case.name);
        let playback = context.playback_folder.join(&case.playback_file);
        let output_dir = context.output_dir_for(&case.name);

        Self {
            program,
            args: vec![flag(PLAYBACK_FLAG, &playback), flag(OUTPUT_FLAG, &output_dir)],
            working_dir: context.executable_folder.clone(),
            output_dir,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.working_dir);
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

fn flag(prefix: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(path.as_os_str());
    arg
}

/// Runs test executables synchronously
#[derive(Debug, Clone)]
pub struct TestInvoker {
    timeout: Option<Duration>,
    poll_interval: Duration,
}

impl Default for TestInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl TestInvoker {
    pub fn new() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_millis(20),
        }
    }

    /// Kill executables that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one test to completion.
    ///
    /// The output folder is created (with parents) before launching, so it exists afterwards
    /// even if the executable writes nothing. When `cancel` becomes set while the child is
    /// running, the child is killed and reported as [`Termination::Cancelled`].
    pub fn run(
        &self,
        case: &TestCase,
        context: &RunContext,
        cancel: Option<&AtomicBool>,
    ) -> Result<ExecutionOutcome> {
        let invocation = Invocation::plan(case, context);
        tracing::info!("Trying {}", invocation);

        tracing::info!("Creating output folder {}", invocation.output_dir.display());
        fs::create_dir_all(&invocation.output_dir).map_err(|source| {
            HarnessError::CreateOutputDir {
                path: invocation.output_dir.clone(),
                source,
            }
        })?;

        let start = Instant::now();
        let mut child = invocation
            .command()
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let termination = self
            .wait(&mut child, start, cancel)
            .map_err(|source| HarnessError::Wait {
                name: case.name.clone(),
                source,
            })?;
        let duration = start.elapsed();

        tracing::debug!("{} {} after {:?}", case.name, termination, duration);

        Ok(ExecutionOutcome {
            termination,
            output_dir: invocation.output_dir,
            duration,
        })
    }

    fn wait(
        &self,
        child: &mut Child,
        start: Instant,
        cancel: Option<&AtomicBool>,
    ) -> std::io::Result<Termination> {
        if self.timeout.is_none() && cancel.is_none() {
            return child.wait().map(Termination::from_status);
        }

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Termination::from_status(status));
            }

            let stop = if cancel.is_some_and(|flag| flag.load(Ordering::Acquire)) {
                Some(Termination::Cancelled)
            } else if self.timeout.is_some_and(|limit| start.elapsed() >= limit) {
                Some(Termination::TimedOut)
            } else {
                None
            };

            if let Some(termination) = stop {
                // The child may exit between try_wait and kill
                if let Err(e) = child.kill() {
                    if e.kind() != std::io::ErrorKind::InvalidInput {
                        return Err(e);
                    }
                }
                child.wait()?;
                return Ok(termination);
            }

            std::thread::sleep(self.poll_interval);
        }
    }
}
