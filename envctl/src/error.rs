//! Typed failures surfaced by environment operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

/// Result type for environment operations.
pub type Result<T> = std::result::Result<T, EnvError>;

/// Errors that can occur while managing the environment.
///
/// None of these are retried. Each maps to a stable exit code via
/// [`EnvError::exit_code`].
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("cannot create environment with `{python}`: {reason}")]
    EnvironmentCreation { python: String, reason: String },

    #[error("environment missing at {} (run `envctl venv` first)", .root.display())]
    EnvironmentMissing { root: PathBuf },

    #[error("dependency resolution failed{}: {detail}", package_suffix(.package))]
    DependencyResolution {
        package: Option<String>,
        detail: String,
    },

    #[error("cannot replace {}", .path.display())]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot launch {}: {reason}", .entry_point.display())]
    Launch { entry_point: PathBuf, reason: String },

    #[error("{action} failed: {detail}")]
    Toolchain { action: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EnvError {
    /// Exit code the CLI reports for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            EnvError::EnvironmentCreation { .. } => exit_codes::ENV_CREATE,
            EnvError::EnvironmentMissing { .. } => exit_codes::ENV_MISSING,
            EnvError::DependencyResolution { .. } => exit_codes::RESOLUTION,
            EnvError::SnapshotWrite { .. } => exit_codes::SNAPSHOT_WRITE,
            EnvError::Launch { .. } => exit_codes::LAUNCH,
            EnvError::Toolchain { .. } => exit_codes::TOOLCHAIN,
            EnvError::Io(_) => exit_codes::INVALID,
        }
    }
}

fn package_suffix(package: &Option<String>) -> String {
    match package {
        Some(name) => format!(" for `{name}`"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_message_names_package() {
        let err = EnvError::DependencyResolution {
            package: Some("nosuchpkg".to_string()),
            detail: "no matching distribution".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "dependency resolution failed for `nosuchpkg`: no matching distribution"
        );
        assert_eq!(err.exit_code(), exit_codes::RESOLUTION);
    }

    #[test]
    fn missing_environment_points_at_venv_command() {
        let err = EnvError::EnvironmentMissing {
            root: PathBuf::from("/tmp/project/.venv"),
        };
        assert!(err.to_string().contains("envctl venv"));
        assert_eq!(err.exit_code(), exit_codes::ENV_MISSING);
    }
}
