//! Android bundle: a `jniLibs/<abi>/` tree plus an installer script.
//!
//! The bundle layout is
//!
//! ```text
//! jniLibs/
//!   arm64-v8a/lib<product>.so
//!   armeabi-v7a/lib<product>.so
//!   ...
//! <product>.h
//! README.md
//! install.sh
//! ```
//!
//! `install.sh <project>` replaces `<project>/android/app/src/main/jniLibs`.

use std::fs;
use std::path::PathBuf;
use tracing::info;

use super::archive::ArchiveFormat;
use super::templates::{self, TemplateVar};
use super::{BuiltArtifact, Packager};
use crate::common;
use crate::types::{OsFamily, ShipError};

pub fn package(packager: &Packager, artifacts: &[BuiltArtifact]) -> Result<PathBuf, ShipError> {
    let name = format!("{}-android", packager.product);
    info!("Creating Android bundle {}", name);

    let library_name = OsFamily::Android.library_file_name(&packager.product);
    let install_script = templates::render(
        templates::ANDROID_INSTALL,
        &[TemplateVar::new("PRODUCT", &packager.product)],
    )?;

    packager.stage_and_archive(&name, ArchiveFormat::TarGz, |staging| {
        let jni_libs = staging.join("jniLibs");
        fs::create_dir_all(&jni_libs)?;

        for artifact in artifacts {
            let Some(abi) = artifact.target.android_abi else {
                return Err(ShipError::Packaging(format!(
                    "{} is not an Android target",
                    artifact.target.name
                )));
            };
            if !artifact.exists() {
                continue;
            }
            let abi_dir = jni_libs.join(abi);
            fs::create_dir_all(&abi_dir)?;
            fs::copy(&artifact.path, abi_dir.join(&library_name)).map_err(|e| {
                ShipError::Packaging(format!(
                    "Failed to copy {:?} into {:?}: {}",
                    artifact.path, abi_dir, e
                ))
            })?;
            info!("Copied {} library", abi);
        }

        packager.copy_extras(staging)?;

        let script = staging.join("install.sh");
        common::write_file(&script, &install_script)?;
        common::make_executable(&script)
    })
}
