//! # libship
//!
//! Command-line tool that cross-compiles a Rust shared library for desktop,
//! Android and iOS and bundles the results for distribution.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter libship.toml
//! libship init --product rvpnse
//!
//! # Show the target catalogue
//! libship list
//!
//! # Build and package
//! libship build --targets linux-x64,windows-x64
//! libship build --all-android --ndk ~/Android/Sdk/ndk/25.2.9519653
//! libship build --all --report dist/report.json
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `build` | Build the requested targets and write archives |
//! | `list` | List the target catalogue grouped by platform |
//! | `clean` | Remove the target and output directories |
//! | `init` | Write a starter `libship.toml` |
//!
//! ## Output Directory
//!
//! Archives are written to `dist/` by default:
//!
//! ```text
//! dist/
//! ├── rvpnse-linux-x64.tar.gz
//! ├── rvpnse-windows-x64.zip
//! ├── rvpnse-android.tar.gz   # jniLibs/<abi>/librvpnse.so + install.sh
//! └── rvpnse-ios.tar.gz       # Device/Simulator frameworks + install.sh
//! ```
//!
//! ## Exit Codes
//!
//! - `0` - every requested target succeeded
//! - `1` - some targets failed
//! - `2` - no target succeeded, or the configuration is invalid
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `libship.toml`

#![cfg_attr(docsrs, feature(doc_cfg))]

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use libship_sdk::{
    BuildProfile, BuildReport, FrameworkMetadata, Orchestrator, OsFamily, RunStatus, ShipConfig,
    targets,
};

pub mod config;

use config::{CONFIG_FILE_NAME, ConfigResolver, LibshipConfig};

/// Cross-compile and package a Rust shared library for desktop and mobile.
#[derive(Parser, Debug)]
#[command(name = "libship", author, version, about = "Native library release builder", long_about = None)]
struct Cli {
    /// Print debug logs and full build output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Project directory containing Cargo.toml (default: current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Explicit config file (default: discover libship.toml upward)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the requested targets and package the results.
    Build(BuildArgs),
    /// List every supported target, grouped by platform.
    List,
    /// Remove the target and output directories.
    Clean,
    /// Write a starter libship.toml.
    Init {
        /// Product name (default: library name from Cargo.toml)
        #[arg(long)]
        product: Option<String>,
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct BuildArgs {
    /// Target names, comma separated (see `libship list`)
    #[arg(long, short = 't', value_delimiter = ',', num_args = 1..)]
    targets: Vec<String>,

    /// Build every target
    #[arg(long)]
    all: bool,

    /// Build every desktop target
    #[arg(long)]
    all_desktop: bool,

    /// Build every Android target
    #[arg(long)]
    all_android: bool,

    /// Build every iOS target
    #[arg(long)]
    all_ios: bool,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Android NDK root (overrides ANDROID_NDK_ROOT and libship.toml)
    #[arg(long)]
    ndk: Option<PathBuf>,

    /// Per-target build timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Run `rustup target add` before building
    #[arg(long)]
    install_targets: bool,

    /// Write a JSON report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Mode {
    Debug,
    Release,
}

impl From<Mode> for BuildProfile {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Debug => BuildProfile::Debug,
            Mode::Release => BuildProfile::Release,
        }
    }
}

/// Parses the process arguments and runs the selected command.
///
/// Returns the process exit code.
pub fn run() -> Result<i32> {
    run_from(env::args_os())
}

/// Runs the CLI with explicit arguments (the first is the program name).
pub fn run_from<I, T>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);

    let cwd = env::current_dir().context("Failed to get current directory")?;
    let project_root = match &cli.project_root {
        Some(root) => cwd.join(root),
        None => cwd,
    };
    load_dotenv(&project_root);

    let resolver = match &cli.config {
        Some(path) => ConfigResolver::from_file(&project_root.join(path))?,
        None => ConfigResolver::discover_from(&project_root)?,
    };
    if let Some(path) = &resolver.config_path {
        debug!("Using config file {}", path.display());
    }

    match cli.command {
        Command::Build(args) => cmd_build(&resolver, &project_root, &args, cli.verbose),
        Command::List => {
            print!("{}", render_target_list());
            Ok(0)
        }
        Command::Clean => cmd_clean(&resolver, &project_root),
        Command::Init {
            product,
            output,
            force,
        } => cmd_init(&project_root, product, &output, force),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn load_dotenv(project_root: &Path) {
    let _ = dotenvy::from_path(project_root.join(".env.local"));
}

fn cmd_build(
    resolver: &ConfigResolver,
    project_root: &Path,
    args: &BuildArgs,
    verbose: bool,
) -> Result<i32> {
    let file = resolver.config();
    let names = select_targets(args, file.build.targets.as_deref())?;
    let config = resolve_ship_config(resolver, project_root, args)?;

    println!(
        "Building {} ({}) for {} target(s): {}",
        config.product,
        config.profile.as_str(),
        names.len(),
        names.join(", ")
    );

    let mut orchestrator = Orchestrator::new(config);
    let report = orchestrator
        .run(&names)
        .context("Build run aborted before any target was built")?;

    print!("{}", render_summary(&report, verbose));

    if let Some(path) = &args.report {
        let path = project_root.join(path);
        write_json_report(&path, &report)?;
        println!("Wrote report to {}", path.display());
    }

    Ok(report.exit_code())
}

/// Resolves the requested target names.
///
/// Explicit names come first, followed by each selected group. With nothing
/// selected the configured list is used, then the host's desktop target.
fn select_targets(args: &BuildArgs, configured: Option<&[String]>) -> Result<Vec<String>> {
    let mut names: Vec<String> = args.targets.iter().map(|t| t.trim().to_string()).collect();
    names.retain(|t| !t.is_empty());

    let mut push_all = |list: Vec<&'static libship_sdk::Target>| {
        names.extend(list.into_iter().map(|t| t.name.to_string()));
    };
    if args.all {
        push_all(targets::all().iter().collect());
    }
    if args.all_desktop {
        push_all(targets::desktop());
    }
    if args.all_android {
        push_all(targets::by_family(OsFamily::Android));
    }
    if args.all_ios {
        push_all(targets::by_family(OsFamily::Ios));
    }

    if names.is_empty() {
        if let Some(configured) = configured.filter(|c| !c.is_empty()) {
            names = configured.to_vec();
        } else if let Some(host) = targets::host_default() {
            info!("No targets given, building host target {}", host.name);
            names.push(host.name.to_string());
        } else {
            bail!("No targets given. Pass --targets or set build.targets in {CONFIG_FILE_NAME}");
        }
    }
    Ok(names)
}

/// Merges CLI flags, the config file and defaults into a run configuration.
fn resolve_ship_config(
    resolver: &ConfigResolver,
    project_root: &Path,
    args: &BuildArgs,
) -> Result<ShipConfig> {
    let file = resolver.config();

    let product = match file.project.product.clone() {
        Some(product) => product,
        None => detect_product(project_root)?.ok_or_else(|| {
            anyhow!(
                "Could not determine the library name. Set project.product in {} \
                 or run from a directory with a Cargo.toml",
                CONFIG_FILE_NAME
            )
        })?,
    };

    let mut config = ShipConfig::new(project_root, &product);

    if let Some(path) = resolver.config_path_value(|c| c.project.header.as_ref()) {
        config.header = project_root.join(path);
    }
    if let Some(path) = resolver.config_path_value(|c| c.project.docs.as_ref()) {
        config.docs = project_root.join(path);
    }
    if let Some(path) = resolver.config_path_value(|c| c.project.output_dir.as_ref()) {
        config.output_dir = project_root.join(path);
    }
    if let Some(path) = resolver.config_path_value(|c| c.project.target_dir.as_ref()) {
        config.target_dir = project_root.join(path);
    }

    config.profile = match (args.mode, file.build.mode.as_deref()) {
        (Some(mode), _) => mode.into(),
        (None, Some(mode)) => mode
            .parse()
            .with_context(|| format!("Invalid build.mode in {}", CONFIG_FILE_NAME))?,
        (None, None) => BuildProfile::Release,
    };
    config.build_tool = resolver.resolve(None, |c| c.build.tool.clone(), config.build_tool);
    config.timeout = args
        .timeout
        .or(file.build.timeout_secs)
        .map(Duration::from_secs);
    config.install_targets = args.install_targets || file.build.install_targets;

    config.ndk_path = args
        .ndk
        .clone()
        .or_else(|| resolver.config_path_value(|c| c.android.ndk_path.as_ref()));
    if let Some(version) = file.android.ndk_version.clone() {
        config.ndk_version = version;
    }

    let defaults = FrameworkMetadata::for_product(&product);
    let ios = file.ios;
    config.framework = FrameworkMetadata {
        name: ios.framework_name.unwrap_or(defaults.name),
        bundle_id: ios.bundle_id.unwrap_or(defaults.bundle_id),
        version: ios.version.unwrap_or(defaults.version),
        build_number: ios.build_number.unwrap_or(defaults.build_number),
        minimum_os_version: ios.minimum_os_version.unwrap_or(defaults.minimum_os_version),
    };
    if let Some(tool) = ios.merge_tool {
        config.merge_tool = tool;
    }

    config.validate()?;
    Ok(config)
}

/// Library name from `Cargo.toml`: `[lib] name`, else the package name with
/// `-` replaced by `_`.
fn detect_product(project_root: &Path) -> Result<Option<String>> {
    let manifest = project_root.join("Cargo.toml");
    if !manifest.is_file() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&manifest)
        .with_context(|| format!("Failed to read {:?}", manifest))?;
    let table: toml::Table =
        toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", manifest))?;

    let lookup = |section: &str| {
        table
            .get(section)
            .and_then(|s| s.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string)
    };
    Ok(lookup("lib").or_else(|| lookup("package").map(|name| name.replace('-', "_"))))
}

fn render_target_list() -> String {
    let mut out = String::new();
    for family in OsFamily::ALL {
        out.push_str(&format!("{}:\n", family.display_name()));
        for target in targets::by_family(family) {
            let mut line = format!("  {:<16} {:<28}", target.name, target.triple);
            if let (Some(abi), Some(api)) = (target.android_abi, target.min_api) {
                line.push_str(&format!(" {} (API {})", abi, api));
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out
}

fn render_summary(report: &BuildReport, verbose: bool) -> String {
    let mut out = String::from("\nResults:\n");
    for result in &report.results {
        match (result.success, result.failure) {
            (true, _) => out.push_str(&format!("  {:<16} ok\n", result.target)),
            (false, kind) => {
                let kind = kind.map(|k| k.as_str()).unwrap_or("failed");
                out.push_str(&format!("  {:<16} FAILED ({})\n", result.target, kind));
                if let Some(diagnostics) = &result.diagnostics {
                    let shown: Vec<&str> = if verbose {
                        diagnostics.lines().collect()
                    } else {
                        diagnostics.lines().filter(|l| !l.trim().is_empty()).take(3).collect()
                    };
                    for line in shown {
                        out.push_str(&format!("      {}\n", line));
                    }
                }
            }
        }
    }

    if !report.packages.is_empty() {
        out.push_str("\nPackages:\n");
        for package in &report.packages {
            match (&package.archive, &package.error) {
                (Some(archive), _) => out.push_str(&format!("  {}\n", archive.display())),
                (None, error) => out.push_str(&format!(
                    "  {:<16} FAILED: {}\n",
                    package.label,
                    error.as_deref().unwrap_or("unknown error")
                )),
            }
        }
    }

    let failed_packages = report.packages.iter().filter(|p| p.error.is_some()).count();
    if failed_packages > 0 {
        out.push_str(&format!(
            "\nWarning: {} package(s) could not be created; their targets built but were not shipped\n",
            failed_packages
        ));
    }

    let status = match report.status() {
        RunStatus::Success => "success",
        RunStatus::Partial => "partial",
        RunStatus::Failure => "failure",
    };
    out.push_str(&format!(
        "\n{}/{} targets succeeded ({})\n",
        report.success_count(),
        report.results.len(),
        status
    ));
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    status: RunStatus,
    exit_code: i32,
    #[serde(flatten)]
    report: &'a BuildReport,
}

fn write_json_report(path: &Path, report: &BuildReport) -> Result<()> {
    let json = JsonReport {
        generated_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("Failed to format timestamp")?,
        status: report.status(),
        exit_code: report.exit_code(),
        report,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let contents = serde_json::to_string_pretty(&json).context("Failed to serialize report")?;
    fs::write(path, contents).with_context(|| format!("Failed to write report {:?}", path))?;
    Ok(())
}

fn cmd_clean(resolver: &ConfigResolver, project_root: &Path) -> Result<i32> {
    let output_dir = resolver
        .config_path_value(|c| c.project.output_dir.as_ref())
        .map(|p| project_root.join(p))
        .unwrap_or_else(|| project_root.join("dist"));
    let target_dir = resolver
        .config_path_value(|c| c.project.target_dir.as_ref())
        .map(|p| project_root.join(p))
        .unwrap_or_else(|| project_root.join("target"));

    for dir in [&target_dir, &output_dir] {
        if dir.exists() {
            fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {:?}", dir))?;
            println!("Removed {}", dir.display());
        } else {
            println!("Nothing to remove at {}", dir.display());
        }
    }
    Ok(0)
}

fn cmd_init(
    project_root: &Path,
    product: Option<String>,
    output: &Path,
    force: bool,
) -> Result<i32> {
    let output = project_root.join(output);
    if output.exists() && !force {
        bail!(
            "{} already exists. Pass --force to overwrite it",
            output.display()
        );
    }

    let product = match product {
        Some(product) => product,
        None => detect_product(project_root)?
            .or_else(|| {
                project_root
                    .file_name()
                    .map(|n| n.to_string_lossy().replace('-', "_"))
            })
            .unwrap_or_else(|| "mylib".to_string()),
    };
    libship_sdk::types::check_identifier("product", &product)
        .context("Pass --product with the library name from Cargo.toml")?;

    let contents = LibshipConfig::generate_starter_toml(&product);
    fs::write(&output, contents).with_context(|| format!("Failed to write {:?}", output))?;
    println!("Wrote starter config to {}", output.display());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libship_sdk::{BuildResult, FailureKind, PackageKind, PackageOutcome};
    use tempfile::TempDir;

    fn args(targets: &[&str]) -> BuildArgs {
        BuildArgs {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            ..BuildArgs::default()
        }
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_comma_separated_targets() {
        let cli = Cli::try_parse_from([
            "libship",
            "build",
            "--targets",
            "linux-x64,android-arm64",
            "--mode",
            "debug",
            "--timeout",
            "60",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.targets, vec!["linux-x64", "android-arm64"]);
        assert_eq!(args.mode, Some(Mode::Debug));
        assert_eq!(args.timeout, Some(60));
    }

    #[test]
    fn test_select_targets_explicit_then_groups() {
        let mut args = args(&["windows-x64"]);
        args.all_ios = true;
        let names = select_targets(&args, None).unwrap();
        assert_eq!(
            names,
            vec!["windows-x64", "ios-arm64", "ios-x64-sim", "ios-arm64-sim"]
        );
    }

    #[test]
    fn test_select_targets_falls_back_to_config() {
        let configured = vec!["android-x64".to_string()];
        let names = select_targets(&args(&[]), Some(&configured)).unwrap();
        assert_eq!(names, vec!["android-x64"]);
    }

    #[test]
    fn test_select_all_covers_catalogue() {
        let mut args = args(&[]);
        args.all = true;
        assert_eq!(select_targets(&args, None).unwrap().len(), targets::all().len());
    }

    #[test]
    fn test_detect_product_prefers_lib_name() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("Cargo.toml"),
            "[package]\nname = \"my-vpn\"\n\n[lib]\nname = \"rvpnse\"\n",
        )
        .unwrap();
        assert_eq!(detect_product(temp.path()).unwrap().as_deref(), Some("rvpnse"));

        fs::write(temp.path().join("Cargo.toml"), "[package]\nname = \"my-vpn\"\n").unwrap();
        assert_eq!(detect_product(temp.path()).unwrap().as_deref(), Some("my_vpn"));
    }

    #[test]
    fn test_resolve_ship_config_precedence() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &config_path,
            r#"
[project]
product = "demo"
output_dir = "out"

[build]
mode = "debug"
timeout_secs = 120

[ios]
framework_name = "Demo"
"#,
        )
        .unwrap();
        let resolver = ConfigResolver::from_file(&config_path).unwrap();

        let mut cli = args(&[]);
        cli.mode = Some(Mode::Release);
        cli.ndk = Some(PathBuf::from("/opt/ndk"));
        let config = resolve_ship_config(&resolver, temp.path(), &cli).unwrap();

        assert_eq!(config.product, "demo");
        assert_eq!(config.profile, BuildProfile::Release);
        assert_eq!(config.output_dir, temp.path().join("out"));
        assert_eq!(config.target_dir, temp.path().join("target"));
        assert_eq!(config.timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.ndk_path, Some(PathBuf::from("/opt/ndk")));
        assert_eq!(config.framework.name, "Demo");
        assert_eq!(config.framework.bundle_id, "com.example.demo");
    }

    #[test]
    fn test_invalid_config_mode_is_error() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[project]\nproduct = \"demo\"\n[build]\nmode = \"fast\"\n").unwrap();
        let resolver = ConfigResolver::from_file(&config_path).unwrap();

        let err = resolve_ship_config(&resolver, temp.path(), &args(&[])).unwrap_err();
        assert!(format!("{:#}", err).contains("build.mode"));
    }

    #[test]
    fn test_target_list_groups_by_family() {
        let list = render_target_list();
        assert!(list.starts_with("Linux:\n"));
        assert!(list.contains("Android:\n"));
        assert!(list.contains("arm64-v8a (API 21)"));
        assert!(list.contains("armeabi-v7a (API 19)"));
        assert!(list.contains("ios-arm64-sim"));
    }

    #[test]
    fn test_summary_lists_failures_and_archives() {
        let mut report = BuildReport::default();
        report.results = vec![
            BuildResult {
                target: "linux-x64".into(),
                success: true,
                artifact: Some(PathBuf::from("/t/libdemo.so")),
                failure: None,
                diagnostics: None,
            },
            BuildResult {
                target: "android-arm64".into(),
                success: false,
                artifact: None,
                failure: Some(FailureKind::ToolchainUnavailable),
                diagnostics: Some("Android NDK not found".into()),
            },
        ];
        report.packages = vec![PackageOutcome {
            kind: PackageKind::Desktop,
            label: "linux-x64".into(),
            archive: Some(PathBuf::from("dist/demo-linux-x64.tar.gz")),
            error: None,
        }];

        let summary = render_summary(&report, false);
        assert!(summary.contains("linux-x64        ok"));
        assert!(summary.contains("android-arm64    FAILED (toolchain-unavailable)"));
        assert!(summary.contains("Android NDK not found"));
        assert!(summary.contains("dist/demo-linux-x64.tar.gz"));
        assert!(summary.contains("1/2 targets succeeded (partial)"));
        assert!(!summary.contains("Warning"));
    }

    #[test]
    fn test_summary_warns_when_bundle_fails() {
        let mut report = BuildReport::default();
        report.results = ["ios-arm64", "ios-arm64-sim"]
            .into_iter()
            .map(|target| BuildResult {
                target: target.into(),
                success: true,
                artifact: Some(PathBuf::from(format!("/t/{}/libdemo.a", target))),
                failure: None,
                diagnostics: None,
            })
            .collect();
        report.packages = vec![PackageOutcome {
            kind: PackageKind::IosBundle,
            label: "ios".into(),
            archive: None,
            error: Some("merge failed: lipo exited with status 1".into()),
        }];

        assert_eq!(report.exit_code(), 0);
        let summary = render_summary(&report, false);
        assert!(summary.contains("FAILED: merge failed"));
        assert!(summary.contains("Warning: 1 package(s) could not be created"));
        assert!(summary.contains("2/2 targets succeeded (success)"));
    }

    #[test]
    fn test_json_report_has_timestamp_and_status() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("reports/run.json");
        write_json_report(&path, &BuildReport::default()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["exit_code"], 2);
        assert_eq!(value["profile"], "release");
        assert!(value["generated_at"].as_str().unwrap().contains('T'));
    }
}
