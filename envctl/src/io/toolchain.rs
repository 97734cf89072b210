//! Toolchain abstraction over the external interpreter and package installer.
//!
//! The [`Toolchain`] trait decouples lifecycle orchestration from the actual
//! backend (`python -m venv` and `pip`). Tests use a scripted toolchain that
//! simulates an environment on disk without spawning interpreters.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument};

use super::process::{CommandOutput, exit_code_of, run_captured, run_inherited};
use crate::core::requirements::Requirement;
use crate::error::{EnvError, Result};

/// Lines of installer stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Output cap for short helper commands (`venv`, `pip freeze`).
const HELPER_OUTPUT_LIMIT_BYTES: usize = 4_000_000;

static FAILED_REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:No matching distribution found for|Could not find a version that satisfies the requirement)\s+(\S+)",
    )
    .expect("valid installer diagnostic regex")
});

/// Parameters for installing a declaration file.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Interpreter inside the environment.
    pub interpreter: PathBuf,
    /// Declaration file to install from.
    pub requirements_path: PathBuf,
    /// Working directory (relative entries in the file resolve against it).
    pub workdir: PathBuf,
    /// Truncate captured installer output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Parameters for launching the entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub interpreter: PathBuf,
    pub entry_point: PathBuf,
    /// Extra arguments passed to the entry point verbatim.
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

/// Abstraction over the interpreter/installer backend.
pub trait Toolchain {
    /// Create a virtual environment at `env_dir` using the base interpreter `python`.
    fn create_env(&self, python: &str, env_dir: &Path) -> Result<()>;

    /// Install every entry of the declaration file. All-or-nothing from the caller's view.
    fn install(&self, request: &InstallRequest) -> Result<()>;

    /// List installed distributions in declaration-file format (`name==version` per line).
    fn list_installed(&self, interpreter: &Path) -> Result<String>;

    /// Run the entry point with inherited stdio and return its exit code.
    fn launch(&self, request: &LaunchRequest) -> Result<i32>;
}

/// Toolchain backed by `python -m venv` and `python -m pip`.
pub struct PipToolchain;

impl Toolchain for PipToolchain {
    #[instrument(skip_all, fields(python = %python, env_dir = %env_dir.display()))]
    fn create_env(&self, python: &str, env_dir: &Path) -> Result<()> {
        info!("creating virtual environment");
        let mut cmd = Command::new(python);
        cmd.arg("-m").arg("venv").arg(env_dir);

        let output = run_captured(cmd, HELPER_OUTPUT_LIMIT_BYTES).map_err(|err| {
            EnvError::EnvironmentCreation {
                python: python.to_string(),
                reason: format!("{err:#}"),
            }
        })?;
        if !output.status.success() {
            return Err(EnvError::EnvironmentCreation {
                python: python.to_string(),
                reason: failure_reason(&output),
            });
        }
        Ok(())
    }

    #[instrument(skip_all, fields(requirements = %request.requirements_path.display()))]
    fn install(&self, request: &InstallRequest) -> Result<()> {
        info!("installing declared dependencies");
        let mut cmd = Command::new(&request.interpreter);
        cmd.args(["-m", "pip", "install", "--disable-pip-version-check", "-r"])
            .arg(&request.requirements_path)
            .current_dir(&request.workdir);

        let output = run_captured(cmd, request.output_limit_bytes).map_err(|err| {
            EnvError::Toolchain {
                action: "pip install".to_string(),
                detail: format!("{err:#}"),
            }
        })?;
        debug!(stdout = %output.stdout_lossy(), "pip install output");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnvError::DependencyResolution {
                package: failed_package(&stderr),
                detail: failure_reason(&output),
            });
        }
        Ok(())
    }

    #[instrument(skip_all, fields(interpreter = %interpreter.display()))]
    fn list_installed(&self, interpreter: &Path) -> Result<String> {
        let mut cmd = Command::new(interpreter);
        cmd.args(["-m", "pip", "freeze", "--disable-pip-version-check"]);

        let output = run_captured(cmd, HELPER_OUTPUT_LIMIT_BYTES).map_err(|err| {
            EnvError::Toolchain {
                action: "pip freeze".to_string(),
                detail: format!("{err:#}"),
            }
        })?;
        if !output.status.success() {
            return Err(EnvError::Toolchain {
                action: "pip freeze".to_string(),
                detail: failure_reason(&output),
            });
        }
        Ok(output.stdout_lossy())
    }

    #[instrument(skip_all, fields(entry_point = %request.entry_point.display()))]
    fn launch(&self, request: &LaunchRequest) -> Result<i32> {
        let mut cmd = Command::new(&request.interpreter);
        cmd.arg(&request.entry_point)
            .args(&request.args)
            .current_dir(&request.workdir);

        let status = run_inherited(cmd).map_err(|err| EnvError::Launch {
            entry_point: request.entry_point.clone(),
            reason: format!("{err:#}"),
        })?;
        Ok(exit_code_of(status))
    }
}

fn failure_reason(output: &CommandOutput) -> String {
    let tail = output.stderr_tail(STDERR_TAIL_LINES);
    let code = exit_code_of(output.status);
    if tail.is_empty() {
        format!("exited with status {code}")
    } else {
        format!("exited with status {code}\n{tail}")
    }
}

/// Distribution name the installer reported as unresolvable, if any.
fn failed_package(stderr: &str) -> Option<String> {
    let caps = FAILED_REQUIREMENT_RE.captures(stderr)?;
    let raw = caps.get(1)?.as_str();
    Some(
        Requirement::parse(raw)
            .map(|req| req.name)
            .unwrap_or_else(|| raw.to_string()),
    )
}
