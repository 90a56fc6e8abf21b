//! Target registry
//!
//! A fixed catalogue of build targets. Every target shares one shape and the
//! differences between platforms are carried as data, so the catalogue is a
//! plain static slice of value descriptors.

use crate::types::{OsFamily, ShipError};
use serde::Serialize;

/// Immutable descriptor of one build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    /// Symbolic name, unique within the registry (e.g. `android-arm64`).
    pub name: &'static str,
    /// Compiler triple passed to the build tool.
    pub triple: &'static str,
    /// OS family.
    pub os: OsFamily,
    /// CPU architecture tag.
    pub arch: &'static str,
    /// Android ABI directory name; only set for Android targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_abi: Option<&'static str>,
    /// Minimum Android API level; only set for Android targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_api: Option<u32>,
}

impl Target {
    const fn new(
        name: &'static str,
        triple: &'static str,
        os: OsFamily,
        arch: &'static str,
    ) -> Self {
        Self {
            name,
            triple,
            os,
            arch,
            android_abi: None,
            min_api: None,
        }
    }

    const fn android(
        name: &'static str,
        triple: &'static str,
        arch: &'static str,
        abi: &'static str,
        min_api: u32,
    ) -> Self {
        Self {
            name,
            triple,
            os: OsFamily::Android,
            arch,
            android_abi: Some(abi),
            min_api: Some(min_api),
        }
    }
}

/// Triple of the only physical-device iOS target. Every other iOS triple
/// is a simulator.
pub const IOS_DEVICE_TRIPLE: &str = "aarch64-apple-ios";

static TARGETS: &[Target] = &[
    // Desktop
    Target::new("linux-x64", "x86_64-unknown-linux-gnu", OsFamily::Linux, "x64"),
    Target::new("macos-x64", "x86_64-apple-darwin", OsFamily::Macos, "x64"),
    Target::new("macos-arm64", "aarch64-apple-darwin", OsFamily::Macos, "arm64"),
    Target::new("windows-x64", "x86_64-pc-windows-msvc", OsFamily::Windows, "x64"),
    // Android
    Target::android("android-arm64", "aarch64-linux-android", "arm64", "arm64-v8a", 21),
    Target::android("android-arm", "armv7-linux-androideabi", "arm", "armeabi-v7a", 19),
    Target::android("android-x64", "x86_64-linux-android", "x64", "x86_64", 21),
    Target::android("android-x86", "i686-linux-android", "x86", "x86", 19),
    // iOS
    Target::new("ios-arm64", IOS_DEVICE_TRIPLE, OsFamily::Ios, "arm64"),
    Target::new("ios-x64-sim", "x86_64-apple-ios", OsFamily::Ios, "x64"),
    Target::new("ios-arm64-sim", "aarch64-apple-ios-sim", OsFamily::Ios, "arm64"),
];

/// Returns the whole catalogue in declaration order.
pub fn all() -> &'static [Target] {
    TARGETS
}

/// Looks up a target by its symbolic name.
///
/// ```
/// use libship_sdk::{targets, OsFamily};
///
/// let target = targets::lookup("android-arm").unwrap();
/// assert_eq!(target.os, OsFamily::Android);
/// assert_eq!(target.android_abi, Some("armeabi-v7a"));
/// assert!(targets::lookup("android-mips").is_none());
/// ```
pub fn lookup(name: &str) -> Option<&'static Target> {
    TARGETS.iter().find(|t| t.name == name)
}

/// Names of every registered target.
pub fn names() -> Vec<&'static str> {
    TARGETS.iter().map(|t| t.name).collect()
}

/// All targets of one OS family, in catalogue order.
pub fn by_family(os: OsFamily) -> Vec<&'static Target> {
    TARGETS.iter().filter(|t| t.os == os).collect()
}

/// All desktop targets, in catalogue order.
pub fn desktop() -> Vec<&'static Target> {
    TARGETS.iter().filter(|t| t.os.is_desktop()).collect()
}

/// Resolves a batch of names against the registry.
///
/// The batch is rejected as a whole if any name is unknown, and every
/// unknown name is reported. Duplicates are dropped, keeping the first
/// occurrence, so the returned order is request order.
pub fn validate<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static Target>, ShipError> {
    let mut resolved: Vec<&'static Target> = Vec::with_capacity(names.len());
    let mut unknown = Vec::new();

    for name in names {
        let name = name.as_ref();
        match lookup(name) {
            Some(target) => {
                if !resolved.iter().any(|t| t.name == target.name) {
                    resolved.push(target);
                }
            }
            None => {
                if !unknown.iter().any(|u: &String| u == name) {
                    unknown.push(name.to_string());
                }
            }
        }
    }

    if !unknown.is_empty() {
        return Err(ShipError::UnknownTargets {
            unknown,
            available: names_owned(),
        });
    }

    Ok(resolved)
}

fn names_owned() -> Vec<String> {
    TARGETS.iter().map(|t| t.name.to_string()).collect()
}

/// The desktop target matching the host, if the host is a supported desktop.
pub fn host_default() -> Option<&'static Target> {
    let name = match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "aarch64") => "macos-arm64",
        ("macos", _) => "macos-x64",
        ("linux", _) => "linux-x64",
        ("windows", _) => "windows-x64",
        _ => return None,
    };
    lookup(name)
}
