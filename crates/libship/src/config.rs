//! Configuration file support for libship.
//!
//! This module provides support for `libship.toml` configuration files that
//! persist release settings so they do not have to be passed as CLI flags.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. The project directory (`./libship.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! Relative paths inside the file are resolved against the directory that
//! contains it.
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! product = "rvpnse"
//! header = "include/rvpnse.h"
//! output_dir = "dist"
//!
//! [build]
//! mode = "release"
//! targets = ["linux-x64", "android-arm64", "ios-arm64"]
//! timeout_secs = 1800
//!
//! [android]
//! ndk_version = "25.2.9519653"
//!
//! [ios]
//! framework_name = "RVPNSE"
//! bundle_id = "com.example.rvpnse"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "libship.toml";

/// Root configuration structure for `libship.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibshipConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,

    /// Build defaults.
    pub build: BuildConfig,

    /// Android-specific configuration.
    pub android: AndroidConfig,

    /// iOS-specific configuration.
    pub ios: IosConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Base name of the shared library (e.g. "rvpnse" for `librvpnse.so`).
    ///
    /// If not specified, libship reads the library name from `Cargo.toml`.
    pub product: Option<String>,

    /// Public C header shipped with every package.
    ///
    /// Defaults to `include/<product>.h`.
    pub header: Option<PathBuf>,

    /// Documentation file shipped with every package.
    ///
    /// Defaults to `README.md`.
    pub docs: Option<PathBuf>,

    /// Directory receiving the archives. Cleared at the start of every build.
    ///
    /// Defaults to `dist/`.
    pub output_dir: Option<PathBuf>,

    /// Build tool target directory.
    ///
    /// Defaults to `target/`.
    pub target_dir: Option<PathBuf>,
}

/// Build defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// `debug` or `release`. Defaults to `release`.
    pub mode: Option<String>,

    /// Build tool program. Defaults to `cargo`.
    pub tool: Option<PathBuf>,

    /// Targets built when none are given on the command line.
    pub targets: Option<Vec<String>>,

    /// Per-target build timeout in seconds. No timeout when unset.
    pub timeout_secs: Option<u64>,

    /// Run `rustup target add` for every requested target before building.
    pub install_targets: bool,
}

/// Android-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Explicit NDK root. Takes precedence over `ANDROID_NDK_ROOT`.
    pub ndk_path: Option<PathBuf>,

    /// NDK version searched for under the per-user SDK directories.
    pub ndk_version: Option<String>,
}

/// iOS-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IosConfig {
    /// Framework name. Defaults to the product name.
    pub framework_name: Option<String>,

    /// Bundle identifier. Defaults to `com.example.<product>`.
    pub bundle_id: Option<String>,

    /// Marketing version. Defaults to `1.0.0`.
    pub version: Option<String>,

    /// Build number. Defaults to `1`.
    pub build_number: Option<String>,

    /// Minimum iOS version. Defaults to `11.0`.
    pub minimum_os_version: Option<String>,

    /// Fat-binary merge program. Defaults to `lipo`.
    pub merge_tool: Option<PathBuf>,
}

impl LibshipConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: LibshipConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// This includes comments explaining each configuration option.
    pub fn generate_starter_toml(product: &str) -> String {
        let bundle = product.replace(['_', '-'], "");

        format!(
            r#"# libship configuration file
# CLI flags override these settings when provided.

[project]
# Base name of the shared library (lib{product}.so, {product}.dll, lib{product}.dylib)
product = "{product}"

# Public C header shipped with every package (skipped when missing)
header = "include/{product}.h"

# Documentation shipped with every package (skipped when missing)
docs = "README.md"

# Archives are written here; the directory is cleared on every build
output_dir = "dist"

# Build tool target directory
# target_dir = "target"

[build]
# debug or release
mode = "release"

# Targets built when --targets is not given (see `libship list`)
# targets = ["linux-x64", "android-arm64", "ios-arm64"]

# Kill a single target build after this many seconds
# timeout_secs = 1800

# Run `rustup target add` before building
install_targets = false

[android]
# NDK root; ANDROID_NDK_ROOT / ANDROID_NDK_HOME are used when unset
# ndk_path = "/opt/android-ndk"

# NDK version looked up under ~/Android/Sdk/ndk and ~/Library/Android/sdk/ndk
ndk_version = "{ndk_version}"

[ios]
framework_name = "{product}"
bundle_id = "com.example.{bundle}"
version = "1.0.0"
build_number = "1"
minimum_os_version = "11.0"

# Tool used to merge several slices into one binary
# merge_tool = "lipo"
"#,
            product = product,
            bundle = bundle,
            ndk_version = libship_sdk::toolchain::DEFAULT_NDK_VERSION,
        )
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<LibshipConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Creates a resolver by discovering configuration from `start_dir` upward.
    pub fn discover_from(start_dir: &Path) -> Result<Self> {
        match LibshipConfig::discover_from(start_dir)? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Creates a resolver from an explicit config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self {
            config: Some(LibshipConfig::load_from_file(path)?),
            config_path: Some(path.to_path_buf()),
        })
    }

    /// The loaded configuration, or defaults.
    pub fn config(&self) -> LibshipConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Directory relative config paths are resolved against.
    pub fn base_dir(&self) -> Option<&Path> {
        self.config_path.as_deref().and_then(Path::parent)
    }

    /// Resolves a path from the config file against [`Self::base_dir`].
    pub fn config_path_value<F>(&self, getter: F) -> Option<PathBuf>
    where
        F: FnOnce(&LibshipConfig) -> Option<&PathBuf>,
    {
        let value = self.config.as_ref().and_then(getter)?;
        Some(match self.base_dir() {
            Some(base) if value.is_relative() => base.join(value),
            _ => value.clone(),
        })
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Arguments
    ///
    /// * `cli_value` - Value from CLI argument (None if not provided)
    /// * `config_getter` - Function to get value from config
    /// * `default` - Default value if neither CLI nor config provides a value
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&LibshipConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LibshipConfig::default();
        assert!(config.project.product.is_none());
        assert!(config.build.targets.is_none());
        assert!(!config.build.install_targets);
        assert!(config.ios.merge_tool.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        let toml_content = r#"
[project]
product = "rvpnse"
header = "include/rvpnse.h"

[build]
mode = "debug"
targets = ["linux-x64", "android-arm64"]
timeout_secs = 600
install_targets = true

[android]
ndk_path = "/opt/ndk"

[ios]
framework_name = "RVPNSE"
bundle_id = "com.example.rvpnse"
minimum_os_version = "13.0"
"#;
        std::fs::write(&config_path, toml_content).unwrap();

        let config = LibshipConfig::load_from_file(&config_path).unwrap();

        assert_eq!(config.project.product.as_deref(), Some("rvpnse"));
        assert_eq!(config.build.mode.as_deref(), Some("debug"));
        assert_eq!(
            config.build.targets,
            Some(vec!["linux-x64".to_string(), "android-arm64".to_string()])
        );
        assert_eq!(config.build.timeout_secs, Some(600));
        assert!(config.build.install_targets);
        assert_eq!(config.android.ndk_path, Some(PathBuf::from("/opt/ndk")));
        assert_eq!(config.ios.framework_name.as_deref(), Some("RVPNSE"));
        assert_eq!(config.ios.minimum_os_version.as_deref(), Some("13.0"));
        assert!(config.ios.version.is_none());
    }

    #[test]
    fn test_invalid_toml_is_reported_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[build]\ntimeout_secs = \"soon\"\n").unwrap();

        let err = LibshipConfig::load_from_file(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_discover_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[project]\nproduct = \"found\"\n").unwrap();
        let nested = temp_dir.path().join("crates/inner");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = LibshipConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(config.project.product.as_deref(), Some("found"));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_stops_at_git_root() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();

        let result = LibshipConfig::discover_from(temp_dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_config_resolver_precedence() {
        let mut config = LibshipConfig::default();
        config.build.timeout_secs = Some(600);
        let resolver = ConfigResolver {
            config: Some(config),
            config_path: None,
        };

        // CLI value takes precedence
        assert_eq!(resolver.resolve(Some(30), |c| c.build.timeout_secs, 0), 30);
        // Config value used when CLI is None
        assert_eq!(resolver.resolve(None, |c| c.build.timeout_secs, 0), 600);
        // Default when neither provides a value
        assert_eq!(resolver.resolve(None, |c| c.build.tool.clone(), "cargo".into()), PathBuf::from("cargo"));
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let mut config = LibshipConfig::default();
        config.project.output_dir = Some(PathBuf::from("out"));
        config.android.ndk_path = Some(PathBuf::from("/abs/ndk"));
        let resolver = ConfigResolver {
            config: Some(config),
            config_path: Some(PathBuf::from("/work/lib/libship.toml")),
        };

        assert_eq!(
            resolver.config_path_value(|c| c.project.output_dir.as_ref()),
            Some(PathBuf::from("/work/lib/out"))
        );
        assert_eq!(
            resolver.config_path_value(|c| c.android.ndk_path.as_ref()),
            Some(PathBuf::from("/abs/ndk"))
        );
        assert_eq!(resolver.config_path_value(|c| c.project.header.as_ref()), None);
    }

    #[test]
    fn test_generate_starter_toml_round_trips() {
        let toml = LibshipConfig::generate_starter_toml("my_lib");
        assert!(toml.contains("product = \"my_lib\""));
        assert!(toml.contains("bundle_id = \"com.example.mylib\""));

        let parsed: LibshipConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.project.product.as_deref(), Some("my_lib"));
        assert_eq!(parsed.build.mode.as_deref(), Some("release"));
        assert_eq!(parsed.project.header, Some(PathBuf::from("include/my_lib.h")));
    }
}
