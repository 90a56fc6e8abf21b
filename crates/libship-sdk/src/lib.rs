//! Native library release builder
//!
//! `libship-sdk` cross-compiles one Rust shared library for a fixed catalogue
//! of desktop, Android and iOS targets, verifies that every build really
//! produced its library, and bundles the results into per-platform archives.
//!
//! # Quick Start
//!
//! ```no_run
//! use libship_sdk::{BuildProfile, Orchestrator, ShipConfig};
//!
//! fn main() -> Result<(), libship_sdk::ShipError> {
//!     let config = ShipConfig::new(".", "rvpnse").profile(BuildProfile::Release);
//!     let mut orchestrator = Orchestrator::new(config);
//!
//!     let report = orchestrator.run(&["linux-x64", "android-arm64", "ios-arm64"])?;
//!     for archive in report.archives() {
//!         println!("wrote {}", archive.display());
//!     }
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! # Architecture
//!
//! - **Targets**: the static catalogue of build targets ([`targets`])
//! - **Toolchain**: Android NDK discovery ([`toolchain`])
//! - **Environment**: per-target compiler and linker variables ([`environment`])
//! - **Executor**: runs the build tool and checks the artifact ([`executor`])
//! - **Packager**: desktop archives, the Android JNI bundle and iOS
//!   frameworks ([`packager`])
//! - **Orchestrator**: sequences a run and produces a [`BuildReport`]
//!   ([`orchestrator`])
//!
//! Targets are built one at a time. A failing target never stops the run;
//! only configuration errors do.

// Public modules
pub mod common;
pub mod environment;
pub mod executor;
pub mod orchestrator;
pub mod packager;
pub mod targets;
pub mod toolchain;
pub mod types;

// Re-export key types for convenience
pub use environment::BuildEnvironment;
pub use executor::BuildExecutor;
pub use orchestrator::{Orchestrator, OrchestratorState};
pub use packager::{BuiltArtifact, PackageRequest, Packager};
pub use targets::Target;
pub use toolchain::{NdkLocation, NdkLocator};
pub use types::{
    BuildProfile, BuildReport, BuildResult, FailureKind, FrameworkMetadata, OsFamily, PackageKind,
    PackageOutcome, RunStatus, ShipConfig, ShipError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_catalogue_is_reachable() {
        assert_eq!(targets::all().len(), 11);
    }
}
