//! CLI smoke tests for libship.
//!
//! These tests run the real binary and check exit codes and output.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn libship_cmd() -> Command {
    cargo_bin_cmd!("libship")
}

/// Temp project with a Cargo.toml naming the library `demo`.
fn temp_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join(".git")).unwrap();
    fs::write(
        temp.path().join("Cargo.toml"),
        "[package]\nname = \"demo-lib\"\n\n[lib]\nname = \"demo\"\n",
    )
    .unwrap();
    temp
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
    libship_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("build"));
}

#[test]
fn build_help_lists_selection_flags() {
    libship_cmd()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--all-android"))
        .stdout(predicate::str::contains("--report"));
}

#[test]
fn unknown_subcommand_fails() {
    libship_cmd().arg("deploy").assert().failure();
}

// =============================================================================
// list
// =============================================================================

#[test]
fn list_shows_catalogue() {
    let temp = temp_project();
    libship_cmd()
        .current_dir(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("linux-x64"))
        .stdout(predicate::str::contains("aarch64-linux-android"))
        .stdout(predicate::str::contains("ios-arm64-sim"));
}

// =============================================================================
// init
// =============================================================================

#[test]
fn init_writes_starter_config() {
    let temp = temp_project();
    libship_cmd()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success();

    let contents = fs::read_to_string(temp.path().join("libship.toml")).unwrap();
    assert!(contents.contains("product = \"demo\""));
}

#[test]
fn init_refuses_to_overwrite() {
    let temp = temp_project();
    fs::write(temp.path().join("libship.toml"), "# mine\n").unwrap();

    libship_cmd()
        .current_dir(temp.path())
        .args(["init", "--product", "other"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--force"));
    assert_eq!(
        fs::read_to_string(temp.path().join("libship.toml")).unwrap(),
        "# mine\n"
    );

    libship_cmd()
        .current_dir(temp.path())
        .args(["init", "--product", "other", "--force"])
        .assert()
        .success();
    assert!(
        fs::read_to_string(temp.path().join("libship.toml"))
            .unwrap()
            .contains("product = \"other\"")
    );
}

#[test]
fn init_rejects_hyphenated_product() {
    let temp = temp_project();
    libship_cmd()
        .current_dir(temp.path())
        .args(["init", "--product", "my-lib"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("my_lib"));
    assert!(!temp.path().join("libship.toml").exists());
}

// =============================================================================
// build
// =============================================================================

#[test]
fn build_unknown_target_exits_2() {
    let temp = temp_project();
    fs::create_dir(temp.path().join("dist")).unwrap();
    fs::write(temp.path().join("dist/keep.txt"), "old").unwrap();

    libship_cmd()
        .current_dir(temp.path())
        .args(["build", "--targets", "linux-x64,linux-x65"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("linux-x65"));

    assert!(temp.path().join("dist/keep.txt").exists());
}

#[test]
fn build_invalid_config_exits_2() {
    let temp = temp_project();
    fs::write(
        temp.path().join("libship.toml"),
        "[build]\nmode = \"fastest\"\n",
    )
    .unwrap();

    libship_cmd()
        .current_dir(temp.path())
        .args(["build", "--targets", "linux-x64"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("build.mode"));
}

#[cfg(unix)]
#[test]
fn build_with_stub_tool_writes_archive_and_report() {
    use std::os::unix::fs::PermissionsExt;

    let temp = temp_project();
    let stub = temp.path().join("fake-cargo");
    fs::write(
        &stub,
        r#"#!/bin/sh
triple="$3"
mode=debug
[ "$4" = "--release" ] && mode=release
mkdir -p "$CARGO_TARGET_DIR/$triple/$mode"
printf 'so' > "$CARGO_TARGET_DIR/$triple/$mode/libdemo.so"
"#,
    )
    .unwrap();
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(
        temp.path().join("libship.toml"),
        format!("[build]\ntool = \"{}\"\n", stub.display()),
    )
    .unwrap();

    libship_cmd()
        .current_dir(temp.path())
        .args([
            "build",
            "--targets",
            "linux-x64",
            "--report",
            "dist-report/report.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1 targets succeeded (success)"));

    assert!(temp.path().join("dist/demo-linux-x64.tar.gz").is_file());
    let report = fs::read_to_string(temp.path().join("dist-report/report.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["status"], "success");
    assert_eq!(report["exit_code"], 0);
    assert_eq!(report["results"][0]["target"], "linux-x64");
}

// =============================================================================
// clean
// =============================================================================

#[test]
fn clean_removes_target_and_output() {
    let temp = temp_project();
    fs::create_dir_all(temp.path().join("target/release")).unwrap();
    fs::create_dir_all(temp.path().join("dist")).unwrap();

    libship_cmd()
        .current_dir(temp.path())
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));

    assert!(!temp.path().join("target").exists());
    assert!(!temp.path().join("dist").exists());
}
