//! iOS bundle: device and simulator frameworks.
//!
//! Artifacts are split into a device group (the single physical-device
//! triple) and a simulator group (everything else). Each non-empty group
//! becomes `<Name>-Device.framework` or `<Name>-Simulator.framework`. A group
//! with several slices is merged into one fat binary with the merge tool,
//! passing the slices in request order.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::archive::ArchiveFormat;
use super::templates::{self, TemplateVar, xml_escape};
use super::{BuiltArtifact, Packager};
use crate::common;
use crate::targets::IOS_DEVICE_TRIPLE;
use crate::types::{OsFamily, ShipError};

/// One framework flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkGroup {
    Device,
    Simulator,
}

impl FrameworkGroup {
    pub fn of(artifact: &BuiltArtifact) -> Self {
        if artifact.target.triple == IOS_DEVICE_TRIPLE {
            FrameworkGroup::Device
        } else {
            FrameworkGroup::Simulator
        }
    }

    /// Directory name suffix, e.g. `Device` in `Demo-Device.framework`.
    pub fn suffix(&self) -> &'static str {
        match self {
            FrameworkGroup::Device => "Device",
            FrameworkGroup::Simulator => "Simulator",
        }
    }

    /// Value of `CFBundleSupportedPlatforms`.
    pub fn platform(&self) -> &'static str {
        match self {
            FrameworkGroup::Device => "iPhoneOS",
            FrameworkGroup::Simulator => "iPhoneSimulator",
        }
    }

    pub fn framework_dir_name(&self, name: &str) -> String {
        format!("{}-{}.framework", name, self.suffix())
    }
}

/// Splits existing artifacts into device and simulator groups, keeping
/// request order within each group.
pub fn partition(artifacts: &[BuiltArtifact]) -> (Vec<&BuiltArtifact>, Vec<&BuiltArtifact>) {
    artifacts
        .iter()
        .filter(|a| a.exists())
        .partition(|a| FrameworkGroup::of(a) == FrameworkGroup::Device)
}

pub fn package(packager: &Packager, artifacts: &[BuiltArtifact]) -> Result<PathBuf, ShipError> {
    if let Some(other) = artifacts.iter().find(|a| a.target.os != OsFamily::Ios) {
        return Err(ShipError::Packaging(format!(
            "{} is not an iOS target",
            other.target.name
        )));
    }

    let (device, simulator) = partition(artifacts);
    if device.is_empty() && simulator.is_empty() {
        return Err(ShipError::Packaging(
            "no iOS libraries available to package".into(),
        ));
    }

    let name = format!("{}-ios", packager.product);
    info!("Creating iOS bundle {}", name);

    let install_script = templates::render(
        templates::IOS_INSTALL,
        &[TemplateVar::new("FRAMEWORK_NAME", &packager.framework.name)],
    )?;

    packager.stage_and_archive(&name, ArchiveFormat::TarGz, |staging| {
        for (group, members) in [
            (FrameworkGroup::Device, &device),
            (FrameworkGroup::Simulator, &simulator),
        ] {
            if !members.is_empty() {
                create_framework(packager, staging, group, members)?;
            }
        }

        if let Some(docs) = &packager.docs {
            common::copy_optional(docs, staging)?;
        }

        let script = staging.join("install.sh");
        common::write_file(&script, &install_script)?;
        common::make_executable(&script)
    })
}

fn create_framework(
    packager: &Packager,
    staging: &Path,
    group: FrameworkGroup,
    members: &[&BuiltArtifact],
) -> Result<PathBuf, ShipError> {
    let meta = &packager.framework;
    let framework_dir = staging.join(group.framework_dir_name(&meta.name));
    fs::create_dir_all(&framework_dir)?;
    let binary = framework_dir.join(&meta.name);

    match members {
        [single] => {
            debug!("Copying single {} slice", group.suffix());
            fs::copy(&single.path, &binary).map_err(|e| {
                ShipError::Packaging(format!(
                    "Failed to copy {:?} to {:?}: {}",
                    single.path, binary, e
                ))
            })?;
        }
        _ => merge(&packager.merge_tool, &binary, members)?,
    }

    let plist = render_info_plist(packager, group)?;
    common::write_file(&framework_dir.join("Info.plist"), &plist)?;

    let headers = framework_dir.join("Headers");
    fs::create_dir_all(&headers)?;
    if let Some(header) = packager.existing_header() {
        let header_name = format!("{}.h", packager.product);
        fs::copy(header, headers.join(&header_name))?;
        let module_map = templates::render(
            templates::IOS_MODULE_MAP,
            &[
                TemplateVar::new("FRAMEWORK_NAME", &meta.name),
                TemplateVar::new("HEADER_NAME", header_name),
            ],
        )?;
        common::write_file(&headers.join("module.modulemap"), &module_map)?;
    }

    info!("Created {}", framework_dir.display());
    Ok(framework_dir)
}

/// Runs `<merge tool> -create -output <binary> <slices...>`.
fn merge(tool: &Path, binary: &Path, members: &[&BuiltArtifact]) -> Result<(), ShipError> {
    let mut cmd = Command::new(tool);
    cmd.arg("-create").arg("-output").arg(binary);
    for member in members {
        cmd.arg(&member.path);
    }

    let description = format!("{} -create", tool.display());
    let output = common::run_captured(cmd, &description, None)
        .map_err(|e| ShipError::Merge(e.to_string()))?;
    if !output.status.success() {
        return Err(ShipError::Merge(format!(
            "{} failed.\n\n{}",
            description,
            output.diagnostics()
        )));
    }
    if !binary.is_file() {
        return Err(ShipError::Merge(format!(
            "{} reported success but {:?} was not written",
            description, binary
        )));
    }
    Ok(())
}

/// Renders `Info.plist` for one framework group with XML-escaped metadata.
pub fn render_info_plist(packager: &Packager, group: FrameworkGroup) -> Result<String, ShipError> {
    let meta = &packager.framework;
    templates::render(
        templates::IOS_INFO_PLIST,
        &[
            TemplateVar::new("FRAMEWORK_NAME", xml_escape(&meta.name)),
            TemplateVar::new("BUNDLE_ID", xml_escape(&meta.bundle_id)),
            TemplateVar::new("VERSION", xml_escape(&meta.version)),
            TemplateVar::new("BUILD_NUMBER", xml_escape(&meta.build_number)),
            TemplateVar::new("MINIMUM_OS_VERSION", xml_escape(&meta.minimum_os_version)),
            TemplateVar::new("SUPPORTED_PLATFORM", group.platform()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets;
    use crate::types::FrameworkMetadata;
    use tempfile::TempDir;

    fn artifact(root: &Path, name: &str) -> BuiltArtifact {
        let target = targets::lookup(name).unwrap();
        let dir = root.join(target.triple).join("release");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("libdemo.dylib");
        fs::write(&path, target.triple).unwrap();
        BuiltArtifact::new(target, path)
    }

    #[test]
    fn test_partition_by_device_triple() {
        let temp = TempDir::new().unwrap();
        let artifacts = vec![
            artifact(temp.path(), "ios-x64-sim"),
            artifact(temp.path(), "ios-arm64"),
            artifact(temp.path(), "ios-arm64-sim"),
        ];

        let (device, simulator) = partition(&artifacts);
        assert_eq!(device.len(), 1);
        assert_eq!(device[0].target.name, "ios-arm64");
        let sims: Vec<_> = simulator.iter().map(|a| a.target.name).collect();
        assert_eq!(sims, vec!["ios-x64-sim", "ios-arm64-sim"]);
    }

    #[test]
    fn test_no_libraries_is_packaging_error() {
        let temp = TempDir::new().unwrap();
        let packager = Packager::new(temp.path().join("dist"), "demo");
        let gone = BuiltArtifact::new(
            targets::lookup("ios-arm64").unwrap(),
            temp.path().join("missing.dylib"),
        );

        assert!(matches!(package(&packager, &[]), Err(ShipError::Packaging(_))));
        assert!(matches!(package(&packager, &[gone]), Err(ShipError::Packaging(_))));
    }

    #[test]
    fn test_info_plist_escapes_metadata() {
        let packager = Packager::new("/tmp/dist", "demo").framework(FrameworkMetadata {
            name: "Demo".into(),
            bundle_id: "com.r&d.demo".into(),
            version: "2.0.0".into(),
            build_number: "42".into(),
            minimum_os_version: "13.0".into(),
        });

        let plist = render_info_plist(&packager, FrameworkGroup::Simulator).unwrap();
        assert!(plist.contains("<string>com.r&amp;d.demo</string>"));
        assert!(plist.contains("<key>CFBundleExecutable</key>\n    <string>Demo</string>"));
        assert!(plist.contains("<string>FMWK</string>"));
        assert!(plist.contains("<string>2.0.0</string>"));
        assert!(plist.contains("<string>42</string>"));
        assert!(plist.contains("<string>13.0</string>"));
        assert!(plist.contains("<string>iPhoneSimulator</string>"));
    }

    #[test]
    fn test_single_slice_framework_is_copied() {
        let temp = TempDir::new().unwrap();
        let header = temp.path().join("demo.h");
        fs::write(&header, "void demo(void);").unwrap();
        let packager = Packager::new(temp.path().join("dist"), "demo").header(&header);
        let device = artifact(&temp.path().join("target"), "ios-arm64");
        let staging = temp.path().join("staging");

        let fw = create_framework(&packager, &staging, FrameworkGroup::Device, &[&device]).unwrap();

        assert_eq!(fw, staging.join("demo-Device.framework"));
        assert_eq!(fs::read_to_string(fw.join("demo")).unwrap(), "aarch64-apple-ios");
        assert!(fw.join("Info.plist").is_file());
        assert!(fw.join("Headers/demo.h").is_file());
        let module_map = fs::read_to_string(fw.join("Headers/module.modulemap")).unwrap();
        assert!(module_map.contains("framework module demo"));
    }

    #[test]
    fn test_no_module_map_without_header() {
        let temp = TempDir::new().unwrap();
        let packager = Packager::new(temp.path().join("dist"), "demo")
            .header(temp.path().join("absent.h"));
        let sim = artifact(&temp.path().join("target"), "ios-arm64-sim");
        let staging = temp.path().join("staging");

        let fw = create_framework(&packager, &staging, FrameworkGroup::Simulator, &[&sim]).unwrap();
        assert!(fw.join("Info.plist").is_file());
        assert!(!fw.join("Headers/module.modulemap").exists());
    }

    #[cfg(unix)]
    mod merge_tool {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_tool(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-lipo");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_two_simulator_slices_are_merged_in_order() {
            let temp = TempDir::new().unwrap();
            let log = temp.path().join("lipo.log");
            // Records its arguments and writes the -output file.
            let tool = write_tool(
                temp.path(),
                &format!("echo \"$@\" >> {}\ntouch \"$3\"", log.display()),
            );
            let packager = Packager::new(temp.path().join("dist"), "demo").merge_tool(tool);
            let target_dir = temp.path().join("target");
            let x64 = artifact(&target_dir, "ios-x64-sim");
            let arm = artifact(&target_dir, "ios-arm64-sim");
            let staging = temp.path().join("staging");

            let fw = create_framework(&packager, &staging, FrameworkGroup::Simulator, &[&x64, &arm])
                .unwrap();

            let calls = fs::read_to_string(&log).unwrap();
            assert_eq!(calls.lines().count(), 1);
            assert_eq!(
                calls.trim(),
                format!(
                    "-create -output {} {} {}",
                    fw.join("demo").display(),
                    x64.path.display(),
                    arm.path.display()
                )
            );
        }

        #[test]
        fn test_merge_failure_aborts_bundle() {
            let temp = TempDir::new().unwrap();
            let tool = write_tool(temp.path(), "echo 'fatal error: same architectures' 1>&2; exit 1");
            let packager = Packager::new(temp.path().join("dist"), "demo").merge_tool(tool);
            let target_dir = temp.path().join("target");
            let artifacts = vec![
                artifact(&target_dir, "ios-x64-sim"),
                artifact(&target_dir, "ios-arm64-sim"),
            ];

            let err = package(&packager, &artifacts).unwrap_err();
            assert!(matches!(err, ShipError::Merge(_)));
            assert!(err.to_string().contains("same architectures"));
            assert!(!temp.path().join("dist/demo-ios").exists());
            assert!(!temp.path().join("dist/demo-ios.tar.gz").exists());
        }
    }
}
