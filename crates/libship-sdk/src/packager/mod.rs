//! Packaging of built libraries into distributable archives.
//!
//! Each OS family maps to one packaging policy (see
//! [`OsFamily::package_kind`](crate::OsFamily::package_kind)):
//!
//! - [`desktop`] - one flat archive per desktop target (`zip` for Windows,
//!   `tar.gz` otherwise)
//! - [`android`] - one JNI bundle holding every Android ABI of the run
//! - [`ios`] - device and simulator frameworks, merged with the fat-binary
//!   tool when a group has several slices
//!
//! Every policy stages files under the output directory, archives the
//! staging directory and removes it again, even when archiving fails.
//!
//! # Example
//!
//! ```no_run
//! use libship_sdk::packager::{BuiltArtifact, PackageRequest, Packager};
//! use libship_sdk::targets;
//!
//! let packager = Packager::new("dist", "rvpnse");
//! let artifact = BuiltArtifact::new(
//!     targets::lookup("linux-x64").unwrap(),
//!     "target/x86_64-unknown-linux-gnu/release/librvpnse.so",
//! );
//! let archive = packager.package(&PackageRequest::Desktop(artifact))?;
//! println!("wrote {}", archive.display());
//! # Ok::<(), libship_sdk::ShipError>(())
//! ```

pub mod android;
pub mod archive;
pub mod desktop;
pub mod ios;
pub mod templates;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::common;
use crate::targets::Target;
use crate::types::{FrameworkMetadata, PackageKind, ShipConfig, ShipError};

/// A verified library produced for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
    pub target: &'static Target,
    pub path: PathBuf,
}

impl BuiltArtifact {
    pub fn new(target: &'static Target, path: impl Into<PathBuf>) -> Self {
        Self {
            target,
            path: path.into(),
        }
    }

    /// Whether the library is still on disk.
    pub(crate) fn exists(&self) -> bool {
        if self.path.is_file() {
            return true;
        }
        warn!(
            "Library for {} not found at {}, skipping",
            self.target.name,
            self.path.display()
        );
        false
    }
}

/// What to package, tagged by policy.
#[derive(Debug, Clone)]
pub enum PackageRequest {
    /// A single desktop target.
    Desktop(BuiltArtifact),
    /// Every successful Android target of a run.
    AndroidBundle(Vec<BuiltArtifact>),
    /// Every successful iOS target of a run.
    IosBundle(Vec<BuiltArtifact>),
}

impl PackageRequest {
    pub fn kind(&self) -> PackageKind {
        match self {
            PackageRequest::Desktop(_) => PackageKind::Desktop,
            PackageRequest::AndroidBundle(_) => PackageKind::AndroidBundle,
            PackageRequest::IosBundle(_) => PackageKind::IosBundle,
        }
    }

    /// Target name for desktop requests, family name for bundles.
    pub fn label(&self) -> String {
        match self {
            PackageRequest::Desktop(artifact) => artifact.target.name.to_string(),
            PackageRequest::AndroidBundle(_) => "android".to_string(),
            PackageRequest::IosBundle(_) => "ios".to_string(),
        }
    }
}

/// Assembles archives in the output directory.
#[derive(Debug, Clone)]
pub struct Packager {
    pub(crate) output_dir: PathBuf,
    pub(crate) product: String,
    pub(crate) header: Option<PathBuf>,
    pub(crate) docs: Option<PathBuf>,
    pub(crate) merge_tool: PathBuf,
    pub(crate) framework: FrameworkMetadata,
}

impl Packager {
    /// Creates a packager writing into `output_dir` with no header or docs.
    pub fn new(output_dir: impl Into<PathBuf>, product: impl Into<String>) -> Self {
        let product = product.into();
        Self {
            output_dir: output_dir.into(),
            framework: FrameworkMetadata::for_product(&product),
            product,
            header: None,
            docs: None,
            merge_tool: PathBuf::from("lipo"),
        }
    }

    /// Creates a packager from a run configuration.
    pub fn from_config(config: &ShipConfig) -> Self {
        Self::new(&config.output_dir, &config.product)
            .header(&config.header)
            .docs(&config.docs)
            .merge_tool(&config.merge_tool)
            .framework(config.framework.clone())
    }

    /// Sets the public header copied into packages when present.
    pub fn header(mut self, path: impl Into<PathBuf>) -> Self {
        self.header = Some(path.into());
        self
    }

    /// Sets the documentation file copied into packages when present.
    pub fn docs(mut self, path: impl Into<PathBuf>) -> Self {
        self.docs = Some(path.into());
        self
    }

    /// Sets the fat-binary merge program.
    pub fn merge_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.merge_tool = tool.into();
        self
    }

    /// Sets the iOS framework metadata.
    pub fn framework(mut self, framework: FrameworkMetadata) -> Self {
        self.framework = framework;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Packages `request` and returns the archive path.
    pub fn package(&self, request: &PackageRequest) -> Result<PathBuf, ShipError> {
        match request {
            PackageRequest::Desktop(artifact) => desktop::package(self, artifact),
            PackageRequest::AndroidBundle(artifacts) => android::package(self, artifacts),
            PackageRequest::IosBundle(artifacts) => ios::package(self, artifacts),
        }
    }

    /// The header file, if configured and present.
    pub(crate) fn existing_header(&self) -> Option<&Path> {
        self.header.as_deref().filter(|p| p.is_file())
    }

    /// Copies the header and docs into `dir`, skipping absent files.
    pub(crate) fn copy_extras(&self, dir: &Path) -> Result<(), ShipError> {
        for extra in [&self.header, &self.docs].into_iter().flatten() {
            common::copy_optional(extra, dir)?;
        }
        Ok(())
    }

    /// Creates a fresh staging directory named `name` under the output directory.
    pub(crate) fn fresh_staging(&self, name: &str) -> Result<PathBuf, ShipError> {
        let staging = self.output_dir.join(name);
        common::remove_dir_if_exists(&staging)?;
        fs::create_dir_all(&staging)?;
        Ok(staging)
    }

    /// Runs `stage` against a fresh staging directory, then archives it as
    /// `<name>.<ext>`. The staging directory is removed on every path.
    pub(crate) fn stage_and_archive<F>(
        &self,
        name: &str,
        format: archive::ArchiveFormat,
        stage: F,
    ) -> Result<PathBuf, ShipError>
    where
        F: FnOnce(&Path) -> Result<(), ShipError>,
    {
        fs::create_dir_all(&self.output_dir)?;
        let staging = self.fresh_staging(name)?;
        let dest = self
            .output_dir
            .join(format!("{}.{}", name, format.extension()));

        let result = stage(&staging).and_then(|()| format.write(&staging, &dest));
        common::cleanup_staging(&staging);
        if result.is_err() && dest.exists() {
            let _ = fs::remove_file(&dest);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets;
    use tempfile::TempDir;

    #[test]
    fn test_request_kind_and_label() {
        let linux = targets::lookup("linux-x64").unwrap();
        let desktop = PackageRequest::Desktop(BuiltArtifact::new(linux, "/x/libdemo.so"));
        assert_eq!(desktop.kind(), PackageKind::Desktop);
        assert_eq!(desktop.label(), "linux-x64");
        assert_eq!(PackageRequest::AndroidBundle(vec![]).label(), "android");
        assert_eq!(
            PackageRequest::IosBundle(vec![]).kind(),
            PackageKind::IosBundle
        );
    }

    #[test]
    fn test_from_config_carries_paths() {
        let config = crate::ShipConfig::new("/work/demo", "demo").merge_tool("/bin/fake-lipo");
        let packager = Packager::from_config(&config);
        assert_eq!(packager.output_dir(), Path::new("/work/demo/dist"));
        assert_eq!(packager.header.as_deref(), Some(Path::new("/work/demo/include/demo.h")));
        assert_eq!(packager.merge_tool, PathBuf::from("/bin/fake-lipo"));
    }

    #[test]
    fn test_staging_removed_when_stage_fails() {
        let temp = TempDir::new().unwrap();
        let packager = Packager::new(temp.path().join("dist"), "demo");

        let err = packager
            .stage_and_archive("demo-broken", archive::ArchiveFormat::TarGz, |_| {
                Err(ShipError::Packaging("nothing to stage".into()))
            })
            .unwrap_err();

        assert!(matches!(err, ShipError::Packaging(_)));
        assert!(!temp.path().join("dist/demo-broken").exists());
        assert!(!temp.path().join("dist/demo-broken.tar.gz").exists());
    }
}
