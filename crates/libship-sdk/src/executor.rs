//! Build execution
//!
//! Invokes the build tool once per target and verifies the produced library.
//! The filesystem is trusted over the tool's exit status: a successful exit
//! without the expected file is still a failure.

use crate::common::{self, run_captured};
use crate::environment::BuildEnvironment;
use crate::targets::Target;
use crate::types::{BuildProfile, BuildResult, FailureKind, ShipError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Runs the build tool for individual targets.
///
/// # Example
///
/// ```no_run
/// use libship_sdk::executor::BuildExecutor;
/// use libship_sdk::{targets, BuildProfile};
/// use libship_sdk::environment::BuildEnvironment;
///
/// let executor = BuildExecutor::new(".", "target", "rvpnse").profile(BuildProfile::Debug);
/// let target = targets::lookup("linux-x64").unwrap();
/// let result = executor.build(target, &BuildEnvironment::new());
/// println!("{}: {}", result.target, result.success);
/// ```
#[derive(Debug, Clone)]
pub struct BuildExecutor {
    project_root: PathBuf,
    target_dir: PathBuf,
    product: String,
    tool: PathBuf,
    profile: BuildProfile,
    timeout: Option<Duration>,
}

impl BuildExecutor {
    /// Creates an executor that runs `cargo` in `project_root`, writing into
    /// `target_dir`, and expects a library named after `product`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        product: impl Into<String>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            target_dir: target_dir.into(),
            product: product.into(),
            tool: PathBuf::from("cargo"),
            profile: BuildProfile::Release,
            timeout: None,
        }
    }

    /// Sets the build tool program.
    pub fn tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Sets the build profile.
    pub fn profile(mut self, profile: BuildProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the per-invocation timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Output directory of the build tool for `target`'s triple.
    pub fn triple_dir(&self, target: &Target) -> PathBuf {
        self.target_dir.join(target.triple)
    }

    /// Where the library for `target` must exist after a successful build.
    pub fn artifact_path(&self, target: &Target) -> PathBuf {
        self.triple_dir(target)
            .join(self.profile.as_str())
            .join(target.os.library_file_name(&self.product))
    }

    /// Arguments passed to the build tool for `target`.
    pub fn build_args(&self, target: &Target) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--target".to_string(),
            target.triple.to_string(),
        ];
        if self.profile == BuildProfile::Release {
            args.push("--release".to_string());
        }
        args
    }

    /// Builds one target with the given environment overrides.
    pub fn build(&self, target: &Target, env: &BuildEnvironment) -> BuildResult {
        info!("Building target: {} ({})", target.name, target.triple);

        let stale = self.triple_dir(target);
        if let Err(e) = clean_stale(&stale) {
            return BuildResult::failed(target.name, FailureKind::BuildFailed, e.to_string());
        }

        let mut cmd = Command::new(&self.tool);
        cmd.args(self.build_args(target))
            .current_dir(&self.project_root)
            .env("CARGO_TARGET_DIR", &self.target_dir)
            .envs(env);

        let description = format!("{} build for {}", self.tool.display(), target.triple);
        let output = match run_captured(cmd, &description, self.timeout) {
            Ok(output) => output,
            Err(e @ ShipError::Timeout { .. }) => {
                error!("{}", e);
                return BuildResult::failed(target.name, FailureKind::Timeout, e.to_string());
            }
            Err(e) => {
                error!("{}", e);
                return BuildResult::failed(target.name, FailureKind::BuildFailed, e.to_string());
            }
        };

        if !output.status.success() {
            error!("Command failed with {}", output.status);
            error!("STDOUT: {}", output.stdout);
            error!("STDERR: {}", output.stderr);
            return BuildResult::failed(target.name, FailureKind::BuildFailed, output.diagnostics());
        }
        debug!("STDOUT: {}", output.stdout);

        let artifact = self.artifact_path(target);
        if !artifact.is_file() {
            let err = ShipError::ArtifactMissing(artifact);
            error!("Library not found for {}: {}", target.name, err);
            return BuildResult::failed(target.name, FailureKind::ArtifactMissing, err.to_string());
        }

        info!("Successfully built {}", target.name);
        BuildResult::succeeded(target.name, artifact)
    }
}

fn clean_stale(dir: &Path) -> Result<(), ShipError> {
    if dir.exists() {
        debug!("Removing stale output {}", dir.display());
        fs::remove_dir_all(dir).map_err(|e| {
            ShipError::Build(format!("Failed to remove stale output {:?}: {}", dir, e))
        })?;
    }
    Ok(())
}

/// Installs rustup targets for `triples`. Failures only warn.
pub fn install_rust_targets<'a>(triples: impl IntoIterator<Item = &'a str>) {
    for triple in triples {
        let mut cmd = Command::new("rustup");
        cmd.args(["target", "add", triple]);
        if let Err(e) = common::run_command(cmd, &format!("rustup target add {}", triple)) {
            warn!("Failed to add target {}: {}", triple, e);
        }
    }
}
