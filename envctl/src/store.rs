//! Environment store lifecycle: create, destroy, and precondition checks.
//!
//! The environment "exists" when its interpreter is present. A root directory
//! without one (e.g. an interrupted `venv`) counts as missing; `create` will
//! complete it and `clean` will remove it.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, info, instrument};

use crate::error::{EnvError, Result};
use crate::io::paths::ProjectPaths;
use crate::io::toolchain::Toolchain;

/// Result of [`create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyPresent,
}

/// Result of [`destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    Removed,
    NothingToRemove,
}

pub fn exists(paths: &ProjectPaths) -> bool {
    paths.interpreter().is_file()
}

/// Ensure an environment exists at `paths.env_dir`. Never resets an existing one.
#[instrument(skip_all, fields(env_dir = %paths.env_dir.display()))]
pub fn create<T: Toolchain>(
    paths: &ProjectPaths,
    python: &str,
    toolchain: &T,
) -> Result<CreateOutcome> {
    if exists(paths) {
        debug!("environment already present");
        return Ok(CreateOutcome::AlreadyPresent);
    }
    toolchain.create_env(python, &paths.env_dir)?;
    if !exists(paths) {
        return Err(EnvError::EnvironmentCreation {
            python: python.to_string(),
            reason: format!(
                "no interpreter at {} after creation",
                paths.interpreter().display()
            ),
        });
    }
    info!("environment created");
    Ok(CreateOutcome::Created)
}

/// Remove the environment root recursively. No confirmation; absent root is a no-op.
#[instrument(skip_all, fields(env_dir = %paths.env_dir.display()))]
pub fn destroy(paths: &ProjectPaths) -> Result<DestroyOutcome> {
    let meta = match fs::symlink_metadata(&paths.env_dir) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("nothing to remove");
            return Ok(DestroyOutcome::NothingToRemove);
        }
        Err(err) => return Err(err.into()),
    };
    if meta.is_dir() {
        fs::remove_dir_all(&paths.env_dir)?;
    } else {
        fs::remove_file(&paths.env_dir)?;
    }
    info!("environment removed");
    Ok(DestroyOutcome::Removed)
}

/// Precondition for every operation that uses the environment.
///
/// Returns the interpreter path, or `EnvironmentMissing` without attempting repair.
pub fn require(paths: &ProjectPaths) -> Result<PathBuf> {
    if !exists(paths) {
        return Err(EnvError::EnvironmentMissing {
            root: paths.env_dir.clone(),
        });
    }
    Ok(paths.interpreter())
}
