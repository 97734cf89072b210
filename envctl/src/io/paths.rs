//! Canonical locations for one project.

use std::path::{Path, PathBuf};

use super::config::EnvConfig;

/// Every path an operation touches, resolved against one project root.
///
/// Operations receive this value explicitly instead of reading a process-wide
/// location, so independent roots never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub env_dir: PathBuf,
    pub requirements_path: PathBuf,
    pub entry_point_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, config: &EnvConfig) -> Self {
        let root = root.into();
        Self {
            env_dir: root.join(&config.env_dir),
            requirements_path: root.join(&config.requirements),
            entry_point_path: root.join(&config.entry_point),
            root,
        }
    }

    /// Interpreter inside the environment.
    pub fn interpreter(&self) -> PathBuf {
        interpreter_in(&self.env_dir)
    }
}

/// Interpreter location inside a virtual environment root.
pub fn interpreter_in(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts").join("python.exe")
    } else {
        env_dir.join("bin").join("python")
    }
}
