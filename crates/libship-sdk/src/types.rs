//! Core types for libship-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`ShipError`] - Error types for configuration, build and packaging operations
//! - [`OsFamily`] / [`PackageKind`] - Platform families and the packaging policy each maps to
//! - [`BuildProfile`] - Optimization mode passed to the build tool
//! - [`ShipConfig`] / [`FrameworkMetadata`] - Inputs for an orchestrator run
//! - [`BuildResult`] / [`BuildReport`] / [`PackageOutcome`] - Outputs of a run

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Error types for libship-sdk operations.
///
/// Configuration errors ([`ShipError::Config`], [`ShipError::UnknownTargets`],
/// [`ShipError::MissingTool`]) are fatal to a run and are reported before any
/// build is attempted. Per-target build problems are recorded in
/// [`BuildResult`] instead of being propagated.
///
/// # Example
///
/// ```
/// use libship_sdk::{ShipError, targets};
///
/// match targets::validate(&["linux-x64", "linux-x65"]) {
///     Err(ShipError::UnknownTargets { unknown, .. }) => {
///         assert_eq!(unknown, vec!["linux-x65".to_string()]);
///     }
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    /// A configuration error occurred.
    ///
    /// This indicates invalid or missing configuration, such as an unknown
    /// OS family name or an empty product name.
    #[error("configuration error: {0}. Check libship.toml or CLI flags")]
    Config(String),

    /// One or more requested target names are not in the registry.
    ///
    /// All unknown names are reported together so a single typo does not
    /// lead to a partial build.
    #[error("unknown targets: {unknown:?}. Available targets: {available:?}")]
    UnknownTargets {
        unknown: Vec<String>,
        available: Vec<String>,
    },

    /// A required host tool (the build tool itself) is not installed.
    #[error("required tool '{0}' was not found on PATH. Install it or set build.tool in libship.toml")]
    MissingTool(String),

    /// The Android NDK could not be located for an Android target.
    #[error(
        "Android NDK not found for target {0}. Set ANDROID_NDK_ROOT or android.ndk_path in libship.toml"
    )]
    ToolchainUnavailable(String),

    /// The build tool exited unsuccessfully or could not be started.
    #[error("build error: {0}")]
    Build(String),

    /// The build tool reported success but the expected library is missing.
    #[error("artifact not found at {0:?} even though the build tool reported success")]
    ArtifactMissing(PathBuf),

    /// A child process exceeded the configured timeout and was killed.
    #[error("{description} timed out after {timeout:?}")]
    Timeout {
        description: String,
        timeout: Duration,
    },

    /// The fat-binary merge tool failed.
    #[error("merge failed: {0}")]
    Merge(String),

    /// A package could not be assembled.
    #[error("packaging error: {0}")]
    Packaging(String),

    /// An embedded template could not be rendered.
    #[error("template error: {0}")]
    Template(String),

    /// An archive could not be written.
    #[error("archive error: {0}")]
    Archive(String),

    /// An I/O error occurred.
    ///
    /// Common causes include missing files, permission issues, or
    /// disk space problems during packaging.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ShipError {
    fn from(err: zip::result::ZipError) -> Self {
        ShipError::Archive(err.to_string())
    }
}

impl From<walkdir::Error> for ShipError {
    fn from(err: walkdir::Error) -> Self {
        ShipError::Archive(err.to_string())
    }
}

/// Operating system family of a build target.
///
/// Every family maps to exactly one library file name shape and one
/// packaging policy; see [`OsFamily::package_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Linux desktop (ELF shared object).
    Linux,
    /// Windows desktop (DLL, packaged as zip).
    Windows,
    /// macOS desktop (Mach-O dynamic library).
    Macos,
    /// Android (JNI bundle built with the NDK).
    Android,
    /// iOS (device and simulator frameworks).
    Ios,
}

impl OsFamily {
    /// All families, in display order.
    pub const ALL: [OsFamily; 5] = [
        OsFamily::Linux,
        OsFamily::Macos,
        OsFamily::Windows,
        OsFamily::Android,
        OsFamily::Ios,
    ];

    /// Returns the string representation of the family.
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Windows => "windows",
            OsFamily::Macos => "macos",
            OsFamily::Android => "android",
            OsFamily::Ios => "ios",
        }
    }

    /// Human-readable name used in listings.
    pub fn display_name(&self) -> &'static str {
        match self {
            OsFamily::Linux => "Linux",
            OsFamily::Windows => "Windows",
            OsFamily::Macos => "macOS",
            OsFamily::Android => "Android",
            OsFamily::Ios => "iOS",
        }
    }

    /// Returns `true` for the three desktop families.
    pub fn is_desktop(&self) -> bool {
        matches!(self, OsFamily::Linux | OsFamily::Windows | OsFamily::Macos)
    }

    /// Selects the packaging policy for this family.
    pub fn package_kind(&self) -> PackageKind {
        match self {
            OsFamily::Linux | OsFamily::Windows | OsFamily::Macos => PackageKind::Desktop,
            OsFamily::Android => PackageKind::AndroidBundle,
            OsFamily::Ios => PackageKind::IosBundle,
        }
    }

    /// File name of the shared library the build tool produces for `product`.
    ///
    /// ```
    /// use libship_sdk::OsFamily;
    ///
    /// assert_eq!(OsFamily::Windows.library_file_name("rvpnse"), "rvpnse.dll");
    /// assert_eq!(OsFamily::Android.library_file_name("rvpnse"), "librvpnse.so");
    /// assert_eq!(OsFamily::Ios.library_file_name("rvpnse"), "librvpnse.dylib");
    /// ```
    pub fn library_file_name(&self, product: &str) -> String {
        match self {
            OsFamily::Windows => format!("{}.dll", product),
            OsFamily::Linux | OsFamily::Android => format!("lib{}.so", product),
            OsFamily::Macos | OsFamily::Ios => format!("lib{}.dylib", product),
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(OsFamily::Linux),
            "windows" => Ok(OsFamily::Windows),
            "macos" | "darwin" => Ok(OsFamily::Macos),
            "android" => Ok(OsFamily::Android),
            "ios" => Ok(OsFamily::Ios),
            other => Err(ShipError::Config(format!(
                "unrecognized OS family '{}'; expected one of linux, windows, macos, android, ios",
                other
            ))),
        }
    }
}

/// Packaging policy, one per group of OS families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    /// One flat archive per desktop target.
    Desktop,
    /// One JNI bundle for all Android targets of a run.
    AndroidBundle,
    /// One framework bundle for all iOS targets of a run.
    IosBundle,
}

/// Build profile controlling optimization and debug info.
///
/// # Example
///
/// ```
/// use libship_sdk::BuildProfile;
///
/// assert_eq!(BuildProfile::Debug.as_str(), "debug");
/// assert_eq!("release".parse::<BuildProfile>().unwrap(), BuildProfile::Release);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    /// Debug build with debug symbols and no optimizations.
    Debug,
    /// Release build with optimizations enabled.
    #[default]
    Release,
}

impl BuildProfile {
    /// Returns the string representation of the profile, which is also the
    /// name of the per-mode output directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildProfile::Debug => "debug",
            BuildProfile::Release => "release",
        }
    }
}

impl FromStr for BuildProfile {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(BuildProfile::Debug),
            "release" => Ok(BuildProfile::Release),
            other => Err(ShipError::Config(format!(
                "unknown build mode '{}'; expected debug or release",
                other
            ))),
        }
    }
}

/// Metadata written into each iOS framework's `Info.plist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkMetadata {
    /// Framework name; also the executable and display name.
    pub name: String,
    /// Bundle identifier (e.g. `com.example.mylib`).
    pub bundle_id: String,
    /// Marketing version (`CFBundleShortVersionString`).
    pub version: String,
    /// Build number (`CFBundleVersion`).
    pub build_number: String,
    /// Minimum supported iOS version.
    pub minimum_os_version: String,
}

impl FrameworkMetadata {
    /// Defaults derived from the product name.
    pub fn for_product(product: &str) -> Self {
        Self {
            name: product.to_string(),
            bundle_id: format!("com.example.{}", product.replace(['_', '-'], "")),
            version: "1.0.0".to_string(),
            build_number: "1".to_string(),
            minimum_os_version: "11.0".to_string(),
        }
    }
}

/// Complete configuration for an orchestrator run.
///
/// Paths are resolved against nothing: callers pass absolute paths or paths
/// relative to the process working directory.
#[derive(Debug, Clone)]
pub struct ShipConfig {
    /// Root of the project whose shared library is built.
    pub project_root: PathBuf,
    /// Base name of the shared library (`lib<product>.so`, `<product>.dll`, ...).
    pub product: String,
    /// Build profile.
    pub profile: BuildProfile,
    /// Directory receiving archives. Cleared at the start of every run.
    pub output_dir: PathBuf,
    /// Build tool target directory (`CARGO_TARGET_DIR`).
    pub target_dir: PathBuf,
    /// Build tool program.
    pub build_tool: PathBuf,
    /// Fat-binary merge program.
    pub merge_tool: PathBuf,
    /// Public header copied into every package, if present.
    pub header: PathBuf,
    /// Documentation file copied into every package, if present.
    pub docs: PathBuf,
    /// Explicit NDK root; takes the place of the environment override.
    pub ndk_path: Option<PathBuf>,
    /// NDK version used for the conventional search locations.
    pub ndk_version: String,
    /// iOS framework metadata.
    pub framework: FrameworkMetadata,
    /// Per-invocation timeout for the build tool.
    pub timeout: Option<Duration>,
    /// Run `rustup target add` for requested triples before building.
    pub install_targets: bool,
}

impl ShipConfig {
    /// Creates a configuration with conventional defaults for `product`
    /// rooted at `project_root`.
    ///
    /// # Example
    ///
    /// ```
    /// use libship_sdk::ShipConfig;
    ///
    /// let config = ShipConfig::new("/work/rvpnse", "rvpnse");
    /// assert!(config.output_dir.ends_with("dist"));
    /// assert!(config.header.ends_with("include/rvpnse.h"));
    /// ```
    pub fn new(project_root: impl Into<PathBuf>, product: impl Into<String>) -> Self {
        let project_root = project_root.into();
        let product = product.into();
        Self {
            output_dir: project_root.join("dist"),
            target_dir: project_root.join("target"),
            build_tool: PathBuf::from("cargo"),
            merge_tool: PathBuf::from("lipo"),
            header: project_root.join("include").join(format!("{}.h", product)),
            docs: project_root.join("README.md"),
            ndk_path: None,
            ndk_version: crate::toolchain::DEFAULT_NDK_VERSION.to_string(),
            framework: FrameworkMetadata::for_product(&product),
            timeout: None,
            install_targets: false,
            profile: BuildProfile::Release,
            product,
            project_root,
        }
    }

    /// Sets the build profile.
    pub fn profile(mut self, profile: BuildProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the build tool program.
    pub fn build_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.build_tool = tool.into();
        self
    }

    /// Sets the merge tool program.
    pub fn merge_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.merge_tool = tool.into();
        self
    }

    /// Sets an explicit NDK root.
    pub fn ndk_path(mut self, path: Option<PathBuf>) -> Self {
        self.ndk_path = path;
        self
    }

    /// Sets the per-invocation build timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the values that cannot be defaulted.
    pub fn validate(&self) -> Result<(), ShipError> {
        check_identifier("product", &self.product)?;
        check_identifier("ios.framework_name", &self.framework.name)
    }
}

/// Rejects names that are not usable as a Rust library name.
///
/// The product becomes `lib<product>.*` and the framework name becomes a
/// directory and a binary inside staging, so only ASCII letters, digits and
/// `_` are accepted.
pub fn check_identifier(field: &str, value: &str) -> Result<(), ShipError> {
    if value.is_empty() {
        return Err(ShipError::Config(format!("{} must not be empty", field)));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        let hint = if bad == '-' {
            format!(" (the library name would be '{}')", value.replace('-', "_"))
        } else {
            String::new()
        };
        return Err(ShipError::Config(format!(
            "{} '{}' may only contain ASCII letters, digits and '_'{}",
            field, value, hint
        )));
    }
    Ok(())
}

/// Why a target failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// No NDK was found for an Android target.
    ToolchainUnavailable,
    /// The environment could not be synthesized for another reason.
    Environment,
    /// The build tool failed or could not be started.
    BuildFailed,
    /// The build tool exceeded its timeout.
    Timeout,
    /// The build tool succeeded but the library file is missing.
    ArtifactMissing,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ToolchainUnavailable => "toolchain-unavailable",
            FailureKind::Environment => "environment",
            FailureKind::BuildFailed => "build-failed",
            FailureKind::Timeout => "timeout",
            FailureKind::ArtifactMissing => "artifact-missing",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of building a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    /// Registry name of the target.
    pub target: String,
    /// Whether the build produced the expected artifact.
    pub success: bool,
    /// Path of the verified artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// Failure category when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Captured tool output or error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl BuildResult {
    pub(crate) fn succeeded(target: &str, artifact: PathBuf) -> Self {
        Self {
            target: target.to_string(),
            success: true,
            artifact: Some(artifact),
            failure: None,
            diagnostics: None,
        }
    }

    pub(crate) fn failed(target: &str, failure: FailureKind, diagnostics: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            success: false,
            artifact: None,
            failure: Some(failure),
            diagnostics: Some(diagnostics.into()),
        }
    }
}

/// Outcome of producing one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageOutcome {
    /// Packaging policy that ran.
    pub kind: PackageKind,
    /// Target name for desktop packages, family name for bundles.
    pub label: String,
    /// Path of the archive when packaging succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    /// Error text when packaging failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every requested target succeeded.
    Success,
    /// Some, but not all, requested targets succeeded.
    Partial,
    /// No requested target succeeded.
    Failure,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Partial => 1,
            RunStatus::Failure => 2,
        }
    }
}

/// Result of an orchestrator run, ordered by request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Build profile the run used.
    pub profile: BuildProfile,
    /// Per-target results in request order.
    pub results: Vec<BuildResult>,
    /// Packages attempted during the run.
    pub packages: Vec<PackageOutcome>,
}

impl BuildReport {
    /// Looks up the result for a target by name.
    pub fn get(&self, target: &str) -> Option<&BuildResult> {
        self.results.iter().find(|r| r.target == target)
    }

    /// `(target, success)` pairs in request order.
    pub fn outcomes(&self) -> Vec<(&str, bool)> {
        self.results
            .iter()
            .map(|r| (r.target.as_str(), r.success))
            .collect()
    }

    /// Number of successful targets.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Paths of all archives produced.
    pub fn archives(&self) -> Vec<&PathBuf> {
        self.packages.iter().filter_map(|p| p.archive.as_ref()).collect()
    }

    /// Overall run status. An empty report counts as a failure.
    pub fn status(&self) -> RunStatus {
        let ok = self.success_count();
        if !self.results.is_empty() && ok == self.results.len() {
            RunStatus::Success
        } else if ok > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failure
        }
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> i32 {
        self.status().exit_code()
    }
}
