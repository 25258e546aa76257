//! Run context shared read-only by every test invocation

use crate::paths;
use clap::ValueEnum;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Graphics API backend the test executables were built against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ApiBackend {
    Metal,
    Gl,
    D3d11,
}

impl ApiBackend {
    /// Whether the backend needs a configuration file next to the executables
    pub fn needs_config_file(self) -> bool {
        matches!(self, ApiBackend::Gl)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiBackend::Metal => "metal",
            ApiBackend::Gl => "gl",
            ApiBackend::D3d11 => "d3d11",
        }
    }
}

impl fmt::Display for ApiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folders and backend for one harness run
///
/// All folders are stored absolute so that changing the child's working directory does not
/// change what they point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub api_backend: ApiBackend,
    pub executable_folder: PathBuf,
    pub playback_folder: PathBuf,
    pub output_folder: PathBuf,
    /// Previously captured output. `None` means generate-only mode.
    pub baseline_folder: Option<PathBuf>,
}

impl RunContext {
    pub fn new(
        api_backend: ApiBackend,
        executable_folder: &Path,
        playback_folder: &Path,
        output_folder: &Path,
        baseline_folder: Option<&Path>,
    ) -> io::Result<Self> {
        Ok(Self {
            api_backend,
            executable_folder: paths::absolute(executable_folder)?,
            playback_folder: paths::absolute(playback_folder)?,
            output_folder: paths::absolute(output_folder)?,
            baseline_folder: baseline_folder.map(paths::absolute).transpose()?,
        })
    }

    /// Whether fresh output is compared against a baseline
    pub fn is_comparing(&self) -> bool {
        self.baseline_folder.is_some()
    }

    /// Fresh output folder for a test
    pub fn output_dir_for(&self, test_name: &str) -> PathBuf {
        self.output_folder.join(test_name)
    }

    /// Baseline folder for a test, if comparing
    pub fn baseline_dir_for(&self, test_name: &str) -> Option<PathBuf> {
        self.baseline_folder.as_ref().map(|b| b.join(test_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_gl_needs_config() {
        assert!(ApiBackend::Gl.needs_config_file());
        assert!(!ApiBackend::Metal.needs_config_file());
        assert!(!ApiBackend::D3d11.needs_config_file());
    }

    #[test]
    fn test_backend_parses_from_cli_names() {
        assert_eq!(ApiBackend::from_str("gl", false).unwrap(), ApiBackend::Gl);
        assert_eq!(
            ApiBackend::from_str("d3d11", false).unwrap(),
            ApiBackend::D3d11
        );
        assert_eq!(
            ApiBackend::from_str("metal", false).unwrap(),
            ApiBackend::Metal
        );
        assert!(ApiBackend::from_str("vulkan", false).is_err());
    }

    #[test]
    fn test_context_paths_are_absolute() {
        let ctx = RunContext::new(
            ApiBackend::Metal,
            Path::new("bin"),
            Path::new("./json"),
            Path::new("out/../out"),
            Some(Path::new("cmp")),
        )
        .unwrap();

        assert!(ctx.executable_folder.is_absolute());
        assert!(ctx.playback_folder.ends_with("json"));
        assert!(ctx.output_folder.ends_with("out"));
        assert!(ctx.is_comparing());
        assert_eq!(
            ctx.output_dir_for("Sample"),
            ctx.output_folder.join("Sample")
        );
        assert_eq!(
            ctx.baseline_dir_for("Sample"),
            Some(ctx.baseline_folder.clone().unwrap().join("Sample"))
        );
    }

    #[test]
    fn test_generate_mode_has_no_baseline() {
        let ctx = RunContext::new(
            ApiBackend::Gl,
            Path::new("/bin"),
            Path::new("/json"),
            Path::new("/out"),
            None,
        )
        .unwrap();
        assert!(!ctx.is_comparing());
        assert_eq!(ctx.baseline_dir_for("Sample"), None);
    }
}
