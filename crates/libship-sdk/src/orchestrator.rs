//! Run orchestration
//!
//! Drives one build run from a list of target names to a [`BuildReport`]:
//!
//! ```text
//! Idle -> EnvironmentReady -> Building -> Packaging -> Reported
//!   \            \
//!    `------------`--> Failed
//! ```
//!
//! Configuration problems (missing build tool, unknown target names) fail the
//! run before anything is built. Once building starts, every per-target or
//! per-package problem is recorded in the report and the run continues.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::common;
use crate::environment::{self, HostOs};
use crate::executor::{self, BuildExecutor};
use crate::packager::{BuiltArtifact, PackageRequest, Packager};
use crate::targets::{self, Target};
use crate::toolchain::{NdkLocation, NdkLocator};
use crate::types::{
    BuildReport, BuildResult, FailureKind, OsFamily, PackageOutcome, ShipConfig, ShipError,
};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    EnvironmentReady,
    Building,
    Packaging,
    Reported,
    Failed,
}

/// Sequences validation, environment setup, builds and packaging.
///
/// # Example
///
/// ```no_run
/// use libship_sdk::{Orchestrator, ShipConfig};
///
/// let mut orchestrator = Orchestrator::new(ShipConfig::new(".", "rvpnse"));
/// let report = orchestrator.run(&["linux-x64", "android-arm64"])?;
/// for (target, ok) in report.outcomes() {
///     println!("{target}: {}", if ok { "ok" } else { "failed" });
/// }
/// std::process::exit(report.exit_code());
/// # Ok::<(), libship_sdk::ShipError>(())
/// ```
#[derive(Debug)]
pub struct Orchestrator {
    config: ShipConfig,
    locator: NdkLocator,
    host: HostOs,
    state: OrchestratorState,
    ndk: Option<NdkLocation>,
}

impl Orchestrator {
    /// Creates an orchestrator that discovers the NDK from the process
    /// environment, with `config.ndk_path` taking precedence.
    pub fn new(config: ShipConfig) -> Self {
        let locator = NdkLocator::from_env_with_version(&config.ndk_version)
            .with_override(config.ndk_path.clone());
        Self::with_locator(config, locator)
    }

    /// Creates an orchestrator with an explicit NDK locator.
    pub fn with_locator(config: ShipConfig, locator: NdkLocator) -> Self {
        Self {
            config,
            locator,
            host: HostOs::detect(),
            state: OrchestratorState::Idle,
            ndk: None,
        }
    }

    /// Overrides the detected host OS.
    pub fn host(mut self, host: HostOs) -> Self {
        self.host = host;
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn config(&self) -> &ShipConfig {
        &self.config
    }

    /// Builds and packages `names`, in request order.
    pub fn run<S: AsRef<str>>(&mut self, names: &[S]) -> Result<BuildReport, ShipError> {
        self.state = OrchestratorState::Idle;
        match self.execute(names) {
            Ok(report) => {
                self.state = OrchestratorState::Reported;
                Ok(report)
            }
            Err(e) => {
                error!("Run failed: {}", e);
                self.state = OrchestratorState::Failed;
                Err(e)
            }
        }
    }

    fn execute<S: AsRef<str>>(&mut self, names: &[S]) -> Result<BuildReport, ShipError> {
        self.config.validate()?;
        self.prepare_environment()?;

        let requested = targets::validate(names)?;
        if requested.is_empty() {
            return Err(ShipError::Config("no targets requested".into()));
        }
        common::validate_project_root(&self.config.project_root)?;
        self.check_output_dir()?;
        self.reset_output_dir()?;

        if self.config.install_targets {
            executor::install_rust_targets(requested.iter().map(|t| t.triple));
        }

        self.state = OrchestratorState::Building;
        let executor = BuildExecutor::new(
            &self.config.project_root,
            &self.config.target_dir,
            &self.config.product,
        )
        .tool(&self.config.build_tool)
        .profile(self.config.profile)
        .timeout(self.config.timeout);
        let packager = Packager::from_config(&self.config);

        let mut report = BuildReport {
            profile: self.config.profile,
            ..BuildReport::default()
        };
        let mut android = Vec::new();
        let mut ios = Vec::new();

        for target in requested {
            let result = self.build_one(&executor, target);
            if let (true, Some(path)) = (result.success, &result.artifact) {
                let artifact = BuiltArtifact::new(target, path.clone());
                match target.os {
                    OsFamily::Android => android.push(artifact),
                    OsFamily::Ios => ios.push(artifact),
                    _ => {
                        let request = PackageRequest::Desktop(artifact);
                        report.packages.push(package_outcome(&packager, &request));
                    }
                }
            }
            report.results.push(result);
        }

        self.state = OrchestratorState::Packaging;
        if !android.is_empty() {
            let request = PackageRequest::AndroidBundle(android);
            report.packages.push(package_outcome(&packager, &request));
        }
        if !ios.is_empty() {
            let request = PackageRequest::IosBundle(ios);
            report.packages.push(package_outcome(&packager, &request));
        }

        info!(
            "{} of {} targets built, {} archives written",
            report.success_count(),
            report.results.len(),
            report.archives().len()
        );
        Ok(report)
    }

    fn prepare_environment(&mut self) -> Result<(), ShipError> {
        let tool = &self.config.build_tool;
        which::which(tool).map_err(|_| ShipError::MissingTool(tool.display().to_string()))?;
        self.ndk = self.locator.locate();
        self.state = OrchestratorState::EnvironmentReady;
        Ok(())
    }

    /// The output directory is wiped on every run, so it must not contain
    /// the project or the build tool's target directory.
    fn check_output_dir(&self) -> Result<(), ShipError> {
        let output = resolve_path(&self.config.output_dir);
        for (label, protected) in [
            ("project root", &self.config.project_root),
            ("target directory", &self.config.target_dir),
        ] {
            if resolve_path(protected).starts_with(&output) {
                return Err(ShipError::Config(format!(
                    "output directory {} would delete the {} {}; \
                     point project.output_dir at a dedicated directory such as dist/",
                    self.config.output_dir.display(),
                    label,
                    protected.display()
                )));
            }
        }
        Ok(())
    }

    fn reset_output_dir(&self) -> Result<(), ShipError> {
        let output = &self.config.output_dir;
        if output.exists() {
            info!("Clearing output directory {}", output.display());
            fs::remove_dir_all(output).map_err(|e| {
                ShipError::Config(format!("cannot clear output directory {:?}: {}", output, e))
            })?;
        }
        fs::create_dir_all(output)?;
        Ok(())
    }

    fn build_one(&self, executor: &BuildExecutor, target: &'static Target) -> BuildResult {
        let env = match environment::synthesize(target, self.ndk.as_ref(), self.host) {
            Ok(env) => env,
            Err(e @ ShipError::ToolchainUnavailable(_)) => {
                warn!("Skipping {}: {}", target.name, e);
                return BuildResult::failed(
                    target.name,
                    FailureKind::ToolchainUnavailable,
                    e.to_string(),
                );
            }
            Err(e) => {
                warn!("Skipping {}: {}", target.name, e);
                return BuildResult::failed(target.name, FailureKind::Environment, e.to_string());
            }
        };
        executor.build(target, &env)
    }
}

/// Absolute, symlink-free form of `path`. Components that do not exist yet
/// are appended to the canonical form of the deepest existing ancestor.
fn resolve_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut missing = Vec::new();
    let mut current = absolute.as_path();
    loop {
        if let Ok(canonical) = current.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return absolute,
        }
    }
}

fn package_outcome(packager: &Packager, request: &PackageRequest) -> PackageOutcome {
    let (archive, error) = match packager.package(request) {
        Ok(path) => (Some(path), None),
        Err(e) => {
            error!("Packaging {} failed: {}", request.label(), e);
            (None, Some(e.to_string()))
        }
    };
    PackageOutcome {
        kind: request.kind(),
        label: request.label(),
        archive,
        error,
    }
}
