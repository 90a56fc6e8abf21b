//! Android NDK discovery
//!
//! Finds the NDK used to cross-compile Android targets. A missing NDK is not
//! an error: it only means Android targets cannot be built during this run.

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// NDK version used when building the conventional search locations.
pub const DEFAULT_NDK_VERSION: &str = "25.2.9519653";

/// Directory every usable NDK contains.
pub const PREBUILT_TOOLCHAIN_DIR: &str = "toolchains/llvm/prebuilt";

/// Environment variables consulted, in order, for an explicit NDK root.
pub const NDK_ENV_VARS: [&str; 2] = ["ANDROID_NDK_ROOT", "ANDROID_NDK_HOME"];

/// A discovered NDK root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdkLocation(PathBuf);

impl NdkLocation {
    /// Wraps a path without validating it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Root directory of the NDK.
    pub fn root(&self) -> &Path {
        &self.0
    }

    /// `toolchains/llvm/prebuilt` under the NDK root.
    pub fn prebuilt_dir(&self) -> PathBuf {
        self.0.join(PREBUILT_TOOLCHAIN_DIR)
    }
}

/// Searches for an NDK installation.
///
/// The locator holds its inputs as values so that discovery can be tested
/// without touching the process environment.
///
/// # Example
///
/// ```no_run
/// use libship_sdk::toolchain::NdkLocator;
///
/// match NdkLocator::from_env().locate() {
///     Some(ndk) => println!("NDK at {}", ndk.root().display()),
///     None => println!("Android targets will be skipped"),
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct NdkLocator {
    override_path: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl NdkLocator {
    /// Creates a locator from an explicit override and search list.
    pub fn new(override_path: Option<PathBuf>, candidates: Vec<PathBuf>) -> Self {
        Self {
            override_path,
            candidates,
        }
    }

    /// Creates a locator from the process environment and the default NDK version.
    pub fn from_env() -> Self {
        Self::from_env_with_version(DEFAULT_NDK_VERSION)
    }

    /// Creates a locator from the process environment, searching for `version`
    /// in the per-user SDK locations.
    pub fn from_env_with_version(version: &str) -> Self {
        let override_path = NDK_ENV_VARS
            .iter()
            .find_map(|var| env::var_os(var).filter(|v| !v.is_empty()))
            .map(PathBuf::from);
        let home = env::var_os("HOME").map(PathBuf::from);
        Self::new(override_path, conventional_locations(home.as_deref(), version))
    }

    /// Replaces the override with an explicitly configured path, if any.
    pub fn with_override(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.override_path = path;
        }
        self
    }

    /// Candidate locations in search order.
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Runs discovery. First match wins:
    ///
    /// 1. the override, accepted if it exists;
    /// 2. each candidate, accepted if it exists and contains
    ///    [`PREBUILT_TOOLCHAIN_DIR`].
    pub fn locate(&self) -> Option<NdkLocation> {
        if let Some(path) = &self.override_path {
            if path.exists() {
                debug!("Using NDK override at {}", path.display());
                return Some(NdkLocation::new(path));
            }
            warn!(
                "NDK override {} does not exist, searching conventional locations",
                path.display()
            );
        }

        for candidate in &self.candidates {
            if candidate.exists() && candidate.join(PREBUILT_TOOLCHAIN_DIR).is_dir() {
                info!("Found Android NDK at: {}", candidate.display());
                return Some(NdkLocation::new(candidate));
            }
            if candidate.exists() {
                debug!(
                    "Ignoring {}: no {} inside",
                    candidate.display(),
                    PREBUILT_TOOLCHAIN_DIR
                );
            }
        }

        warn!("Android NDK not found. Android builds will be skipped.");
        None
    }
}

/// Conventional NDK install locations for the per-user SDKs (Linux and
/// macOS layouts) and the standalone system-wide installs.
pub fn conventional_locations(home: Option<&Path>, version: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = home {
        paths.push(home.join("Android").join("Sdk").join("ndk").join(version));
        paths.push(
            home.join("Library")
                .join("Android")
                .join("sdk")
                .join("ndk")
                .join(version),
        );
    }
    paths.push(PathBuf::from("/usr/local/android-ndk-r25c"));
    paths.push(PathBuf::from("/opt/android-ndk-r25c"));
    paths
}
