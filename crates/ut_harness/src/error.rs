//! Error types for the harness
//!
//! Every variant is fatal to the run. Baseline mismatches are not errors; they are carried
//! as data in [`ComparisonResult`](crate::compare::ComparisonResult).

use crate::invoker::Termination;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a harness run
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The per-test output folder could not be created
    #[error("failed to create output folder {path}: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backend configuration file could not be copied next to the executables
    #[error("failed to copy {from} to {to}: {source}")]
    CopyConfig {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The test executable could not be launched
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Waiting on (or killing) a running test executable failed
    #[error("failed while waiting for test {name}: {source}")]
    Wait {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The test executable did not exit cleanly
    #[error("test {name} {termination}")]
    TestFailed {
        name: String,
        termination: Termination,
    },

    /// A directory tree could not be walked during comparison
    #[error("failed to read directory tree {path}: {source}")]
    ReadTree {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A file could not be read during comparison
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The harness configuration file could not be read
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The harness configuration file is not valid TOML for [`HarnessConfig`](crate::HarnessConfig)
    #[error("failed to parse config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The catalog violates a structural rule (duplicate names, bad paths, ...)
    #[error("invalid test catalog: {0}")]
    InvalidCatalog(String),

    /// The JSON report could not be written
    #[error("failed to write report {path}: {source}")]
    WriteReport {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    /// True when a test was killed only because another test had already failed
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            HarnessError::TestFailed {
                termination: Termination::Cancelled,
                ..
            }
        )
    }
}
