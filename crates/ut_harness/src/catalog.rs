//! Test catalog
//!
//! The catalog is a fixed, ordered list of test executables. Nothing is discovered from the
//! filesystem: a test runs only if it is listed here or in the harness config file.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single test executable and the playback file that drives it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestCase {
    /// Executable name, also used as the per-test output subfolder
    pub name: String,
    /// Playback file name, relative to the playback folder
    #[serde(rename = "playback")]
    pub playback_file: String,
}

impl TestCase {
    pub fn new(name: &str, playback_file: &str) -> Self {
        Self {
            name: name.to_string(),
            playback_file: playback_file.to_string(),
        }
    }
}

/// Ordered, validated list of test cases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCatalog {
    cases: Vec<TestCase>,
}

impl TestCatalog {
    /// Build a catalog, rejecting entries that would collide or escape the output folder
    pub fn new(cases: Vec<TestCase>) -> Result<Self> {
        if cases.is_empty() {
            return Err(HarnessError::InvalidCatalog(
                "catalog contains no tests".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for case in &cases {
            validate_name(&case.name)?;
            if case.playback_file.trim().is_empty() {
                return Err(HarnessError::InvalidCatalog(format!(
                    "test '{}' has an empty playback file",
                    case.name
                )));
            }
            if !seen.insert(case.name.as_str()) {
                return Err(HarnessError::InvalidCatalog(format!(
                    "duplicate test name '{}'",
                    case.name
                )));
            }
        }

        Ok(Self { cases })
    }

    /// The catalog shipped with the harness
    pub fn builtin() -> Self {
        Self {
            cases: vec![TestCase::new(
                "Sample_PbsMaterials",
                "Sample_PbsMaterials.json",
            )],
        }
    }

    /// Keep only tests whose name contains `pattern`
    pub fn filtered(&self, pattern: &str) -> Vec<TestCase> {
        self.cases
            .iter()
            .filter(|case| case.name.contains(pattern))
            .cloned()
            .collect()
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter()
    }
}

// Test names double as folder names under the output and baseline roots.
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(HarnessError::InvalidCatalog(
            "test name must not be empty".to_string(),
        ));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(HarnessError::InvalidCatalog(format!(
            "test name '{}' must be a single path component",
            name
        )));
    }
    Ok(())
}
