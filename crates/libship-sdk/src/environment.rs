//! Cross-compilation environment synthesis
//!
//! Produces the variables the build tool needs to cross-compile one target.
//! The result is a plain map that the executor hands to a single child
//! process; nothing here touches the environment of the current process.

use crate::targets::Target;
use crate::toolchain::NdkLocation;
use crate::types::{OsFamily, ShipError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Variable overrides for one build invocation.
pub type BuildEnvironment = BTreeMap<String, String>;

/// Host operating system, which selects the NDK's prebuilt toolchain directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    Macos,
}

impl HostOs {
    /// Maps the running OS. Hosts other than macOS use the Linux layout.
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            HostOs::Macos
        } else {
            HostOs::Linux
        }
    }

    /// Name of the directory under `toolchains/llvm/prebuilt`.
    pub fn prebuilt_tag(&self) -> &'static str {
        match self {
            HostOs::Linux => "linux-x86_64",
            HostOs::Macos => "darwin-x86_64",
        }
    }
}

/// Clang driver prefix per Android triple; the API level is appended.
const CLANG_TARGETS: &[(&str, &str)] = &[
    ("aarch64-linux-android", "aarch64-linux-android"),
    ("armv7-linux-androideabi", "armv7a-linux-androideabi"),
    ("x86_64-linux-android", "x86_64-linux-android"),
    ("i686-linux-android", "i686-linux-android"),
];

/// Mangles a triple into the form used in per-target variable names:
/// ASCII uppercase, with every run of non-alphanumeric characters collapsed
/// to one `_`.
///
/// ```
/// use libship_sdk::environment::mangle;
///
/// assert_eq!(mangle("armv7-linux-androideabi"), "ARMV7_LINUX_ANDROIDEABI");
/// assert_eq!(mangle("aarch64-apple-ios-sim"), "AARCH64_APPLE_IOS_SIM");
/// ```
pub fn mangle(triple: &str) -> String {
    let mut out = String::with_capacity(triple.len());
    let mut in_separator = false;
    for c in triple.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
            in_separator = false;
        } else if !in_separator {
            out.push('_');
            in_separator = true;
        }
    }
    out
}

/// Versioned clang driver name for an Android target, e.g.
/// `armv7a-linux-androideabi19`.
pub fn clang_target(target: &Target) -> Result<String, ShipError> {
    let prefix = CLANG_TARGETS
        .iter()
        .find(|(triple, _)| *triple == target.triple)
        .map(|(_, prefix)| *prefix)
        .ok_or_else(|| {
            ShipError::Config(format!(
                "no clang naming rule for Android triple {}",
                target.triple
            ))
        })?;
    let api = target.min_api.ok_or_else(|| {
        ShipError::Config(format!("Android target {} has no API level", target.name))
    })?;
    Ok(format!("{}{}", prefix, api))
}

/// `bin` directory of the NDK's LLVM toolchain for `host`.
pub fn toolchain_bin_dir(ndk: &NdkLocation, host: HostOs) -> PathBuf {
    ndk.prebuilt_dir().join(host.prebuilt_tag()).join("bin")
}

/// Synthesizes the environment for `target`.
///
/// Non-Android targets need no overrides and get an empty map. Android
/// targets require an NDK; without one this returns
/// [`ShipError::ToolchainUnavailable`].
pub fn synthesize(
    target: &Target,
    ndk: Option<&NdkLocation>,
    host: HostOs,
) -> Result<BuildEnvironment, ShipError> {
    let mut env = BuildEnvironment::new();
    if target.os != OsFamily::Android {
        return Ok(env);
    }

    let ndk = ndk.ok_or_else(|| ShipError::ToolchainUnavailable(target.name.to_string()))?;
    let bin = toolchain_bin_dir(ndk, host);
    let clang = clang_target(target)?;
    let mangled = mangle(target.triple);

    let root = path_string(ndk.root());
    env.insert("ANDROID_NDK_ROOT".into(), root.clone());
    env.insert("ANDROID_NDK_HOME".into(), root);
    env.insert(
        format!("CC_{}", mangled),
        path_string(&bin.join(format!("{}-clang", clang))),
    );
    env.insert(
        format!("CXX_{}", mangled),
        path_string(&bin.join(format!("{}-clang++", clang))),
    );
    env.insert(format!("AR_{}", mangled), path_string(&bin.join("llvm-ar")));
    env.insert(
        format!("CARGO_TARGET_{}_LINKER", mangled),
        path_string(&bin.join(format!("{}-clang", clang))),
    );
    Ok(env)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
