//! Desktop packages: one flat archive per target.

use std::path::PathBuf;
use tracing::info;

use super::archive::ArchiveFormat;
use super::{BuiltArtifact, Packager};
use crate::common;
use crate::types::{OsFamily, ShipError};

/// Archive format for a desktop family.
pub fn archive_format(os: OsFamily) -> ArchiveFormat {
    match os {
        OsFamily::Windows => ArchiveFormat::Zip,
        _ => ArchiveFormat::TarGz,
    }
}

/// Writes `<product>-<target>.<zip|tar.gz>` containing the library, the
/// header and the docs file.
pub fn package(packager: &Packager, artifact: &BuiltArtifact) -> Result<PathBuf, ShipError> {
    let target = artifact.target;
    if !target.os.is_desktop() {
        return Err(ShipError::Packaging(format!(
            "{} is not a desktop target",
            target.name
        )));
    }
    if !artifact.path.is_file() {
        return Err(ShipError::Packaging(format!(
            "library for {} not found at {}",
            target.name,
            artifact.path.display()
        )));
    }

    let name = format!("{}-{}", packager.product, target.name);
    info!("Packaging {}", name);
    packager.stage_and_archive(&name, archive_format(target.os), |staging| {
        common::copy_into(&artifact.path, staging)?;
        packager.copy_extras(staging)
    })
}
