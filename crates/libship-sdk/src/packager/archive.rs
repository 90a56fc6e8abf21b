//! Archive writers
//!
//! Both writers walk a staging directory in file-name order and store every
//! entry relative to that directory, so extracting an archive yields the
//! staged files directly without a wrapping folder.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::types::ShipError;

/// Archive format of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// Writes `staging` to `dest` in this format.
    pub fn write(&self, staging: &Path, dest: &Path) -> Result<PathBuf, ShipError> {
        match self {
            ArchiveFormat::TarGz => create_tar_gz(staging, dest),
            ArchiveFormat::Zip => create_zip(staging, dest),
        }
    }
}

/// Entries below `root`, sorted, with their archive-relative names.
fn staged_entries(root: &Path) -> Result<Vec<(PathBuf, String, bool)>, ShipError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ShipError::Archive(format!("{:?}: {}", entry.path(), e)))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((entry.path().to_path_buf(), name, entry.file_type().is_dir()));
    }
    Ok(entries)
}

/// Writes a gzip-compressed tarball of the contents of `staging`.
pub fn create_tar_gz(staging: &Path, dest: &Path) -> Result<PathBuf, ShipError> {
    let file = File::create(dest).map_err(|e| {
        ShipError::Archive(format!("Failed to create {:?}: {}", dest, e))
    })?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for (path, name, is_dir) in staged_entries(staging)? {
        debug!("tar: adding {}", name);
        if is_dir {
            builder.append_dir(&name, &path)?;
        } else {
            builder.append_path_with_name(&path, &name)?;
        }
    }

    builder.into_inner()?.finish()?;
    info!("Created {}", dest.display());
    Ok(dest.to_path_buf())
}

/// Writes a deflate-compressed zip of the contents of `staging`.
pub fn create_zip(staging: &Path, dest: &Path) -> Result<PathBuf, ShipError> {
    let file = File::create(dest).map_err(|e| {
        ShipError::Archive(format!("Failed to create {:?}: {}", dest, e))
    })?;
    let mut zip = zip::ZipWriter::new(file);

    for (path, name, is_dir) in staged_entries(staging)? {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(unix_mode(&path)?);
        if is_dir {
            zip.add_directory(name, options)?;
        } else {
            debug!("zip: adding {}", name);
            zip.start_file(name, options)?;
            let mut src = File::open(&path)?;
            io::copy(&mut src, &mut zip)?;
        }
    }

    zip.finish()?;
    info!("Created {}", dest.display());
    Ok(dest.to_path_buf())
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> Result<u32, ShipError> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn unix_mode(path: &Path) -> Result<u32, ShipError> {
    Ok(if fs::metadata(path)?.is_dir() { 0o755 } else { 0o644 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn stage(root: &Path) {
        fs::create_dir_all(root.join("jniLibs/x86")).unwrap();
        fs::write(root.join("libdemo.so"), b"ELF").unwrap();
        fs::write(root.join("jniLibs/x86/libdemo.so"), b"ELF86").unwrap();
    }

    #[test]
    fn test_tar_gz_entries_are_relative_and_sorted() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("demo-linux-x64");
        stage(&staging);
        let dest = temp.path().join("demo.tar.gz");

        create_tar_gz(&staging, &dest).unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().trim_end_matches('/').to_string())
            .collect();
        assert_eq!(
            names,
            vec!["jniLibs", "jniLibs/x86", "jniLibs/x86/libdemo.so", "libdemo.so"]
        );
    }

    #[test]
    fn test_zip_contains_file_contents() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("demo-windows-x64");
        stage(&staging);
        let dest = temp.path().join("demo.zip");

        ArchiveFormat::Zip.write(&staging, &dest).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut contents = String::new();
        archive
            .by_name("jniLibs/x86/libdemo.so")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "ELF86");
        assert!(archive.by_name("demo-windows-x64/libdemo.so").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_tar_gz_preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("bundle");
        fs::create_dir_all(&staging).unwrap();
        let script = staging.join("install.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let dest = temp.path().join("bundle.tar.gz");

        create_tar_gz(&staging, &dest).unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().mode().unwrap() & 0o777, 0o755);
    }

    #[test]
    fn test_extension() {
        assert_eq!(ArchiveFormat::TarGz.extension(), "tar.gz");
        assert_eq!(ArchiveFormat::Zip.extension(), "zip");
    }
}
