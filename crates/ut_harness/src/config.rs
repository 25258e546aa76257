//! Harness configuration file handling
//!
//! The harness runs without any config file. An optional TOML file can replace the built-in
//! catalog and set run options:
//!
//! ```toml
//! [run]
//! jobs = 2
//! timeout_secs = 600
//! gl_config = "ogreGL.cfg"
//!
//! [[tests]]
//! name = "Sample_PbsMaterials"
//! playback = "Sample_PbsMaterials.json"
//! ```

use crate::catalog::{TestCase, TestCatalog};
use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name the gl backend expects its configuration under, inside the executable folder
pub const GL_CONFIG_TARGET: &str = "ogre.cfg";

/// Top-level harness configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub run: RunConfig,
    /// Replaces the built-in catalog when non-empty
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// Run options
#[derive(Debug, Deserialize, Serialize)]
pub struct RunConfig {
    /// Worker threads; 1 runs the catalog sequentially
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Per-test timeout in seconds, 0 = wait forever
    #[serde(default)]
    pub timeout_secs: u64,
    /// Source of the gl backend configuration file
    #[serde(default = "default_gl_config")]
    pub gl_config: PathBuf,
}

fn default_jobs() -> usize {
    1
}

fn default_gl_config() -> PathBuf {
    PathBuf::from("ogreGL.cfg")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            timeout_secs: 0,
            gl_config: default_gl_config(),
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| HarnessError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| HarnessError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The configured catalog, or the built-in one when none is listed
    pub fn catalog(&self) -> Result<TestCatalog> {
        if self.tests.is_empty() {
            Ok(TestCatalog::builtin())
        } else {
            TestCatalog::new(self.tests.clone())
        }
    }
}
