//! Common utilities shared by the executor and the packagers.
//!
//! ## Error Messages
//!
//! Functions in this module produce actionable messages that include what
//! went wrong, where (paths, commands) and, where possible, how to fix it.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::types::ShipError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Stdout and stderr formatted for a failure report.
    pub fn diagnostics(&self) -> String {
        format!(
            "Exit status: {}\n\nStdout:\n{}\n\nStderr:\n{}",
            self.status,
            self.stdout.trim_end(),
            self.stderr.trim_end()
        )
    }
}

/// Validates that the project root is a directory containing a Cargo.toml.
pub fn validate_project_root(project_root: &Path) -> Result<(), ShipError> {
    if !project_root.is_dir() {
        return Err(ShipError::Config(format!(
            "project root is not a directory: {}\n\n\
             Run from the library's project directory or pass --project-root.",
            project_root.display()
        )));
    }
    let manifest = project_root.join("Cargo.toml");
    if !manifest.is_file() {
        return Err(ShipError::Config(format!(
            "Cargo.toml not found in {}",
            project_root.display()
        )));
    }
    Ok(())
}

/// Runs `cmd` to completion, capturing stdout and stderr.
///
/// With a `timeout`, the child is killed once the deadline passes and
/// [`ShipError::Timeout`] is returned. A non-zero exit is *not* an error
/// here; callers inspect [`CapturedOutput::status`].
pub fn run_captured(
    mut cmd: Command,
    description: &str,
    timeout: Option<Duration>,
) -> Result<CapturedOutput, ShipError> {
    debug!("Running: {:?}", cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // With a timeout the child leads its own process group, which is killed
    // as a whole on expiry.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        if timeout.is_some() {
            cmd.process_group(0);
        }
    }

    let mut child = cmd.spawn().map_err(|e| {
        ShipError::Build(format!(
            "Failed to start {}.\n\n\
             Error: {}\n\n\
             Ensure the tool is installed and available on PATH.",
            description, e
        ))
    })?;

    // Drain both pipes on their own threads so a chatty child never blocks
    // on a full pipe while we wait for it.
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let status = match timeout {
        None => child.wait()?,
        Some(limit) => {
            let deadline = Instant::now() + limit;
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) => {}
                    Err(e) => {
                        kill_tree(&mut child);
                        return Err(e.into());
                    }
                }
                if Instant::now() >= deadline {
                    warn!("{} exceeded {:?}, killing it", description, limit);
                    kill_tree(&mut child);
                    return Err(ShipError::Timeout {
                        description: description.to_string(),
                        timeout: limit,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    Ok(CapturedOutput {
        status,
        stdout: stdout.map(join_reader).unwrap_or_default(),
        stderr: stderr.map(join_reader).unwrap_or_default(),
    })
}

/// Runs an external command and fails with its captured output if it
/// exits unsuccessfully.
pub fn run_command(cmd: Command, description: &str) -> Result<CapturedOutput, ShipError> {
    let output = run_captured(cmd, description, None)?;
    if !output.status.success() {
        return Err(ShipError::Build(format!(
            "{} failed.\n\n{}",
            description,
            output.diagnostics()
        )));
    }
    Ok(output)
}

/// Kills `child` and every process in its group, then reaps it.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!("killpg({}) failed: {}", pid, e);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Copies `src` into `dest_dir`, keeping its file name. Returns the new path.
pub fn copy_into(src: &Path, dest_dir: &Path) -> Result<PathBuf, ShipError> {
    let file_name = src
        .file_name()
        .ok_or_else(|| ShipError::Packaging(format!("invalid file name in {:?}", src)))?;
    let dest = dest_dir.join(file_name);
    fs::copy(src, &dest).map_err(|e| {
        ShipError::Packaging(format!("Failed to copy {:?} to {:?}: {}", src, dest, e))
    })?;
    Ok(dest)
}

/// Copies `src` into `dest_dir` when it exists; logs and skips it otherwise.
///
/// Used for the public header and documentation, whose absence is tolerated.
pub fn copy_optional(src: &Path, dest_dir: &Path) -> Result<Option<PathBuf>, ShipError> {
    if !src.is_file() {
        debug!("Optional file {} not present, skipping", src.display());
        return Ok(None);
    }
    copy_into(src, dest_dir).map(Some)
}

/// Removes a directory tree if it exists.
pub fn remove_dir_if_exists(dir: &Path) -> Result<(), ShipError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| {
            ShipError::Packaging(format!("Failed to remove {:?}: {}", dir, e))
        })?;
    }
    Ok(())
}

/// Removes a staging directory without masking an earlier error.
pub fn cleanup_staging(dir: &Path) {
    if let Err(e) = remove_dir_if_exists(dir) {
        warn!("Could not remove staging directory: {}", e);
    }
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) -> Result<(), ShipError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
        .map_err(|e| ShipError::Packaging(format!("Failed to write {:?}: {}", path, e)))
}

/// Marks a file executable (0755). No-op on non-unix hosts.
pub fn make_executable(path: &Path) -> Result<(), ShipError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
