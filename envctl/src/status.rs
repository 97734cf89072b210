//! Read-only report on the environment and its drift from the declaration file.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::drift::{DriftReport, compute_drift};
use crate::core::requirements::Declaration;
use crate::error::Result;
use crate::io::paths::ProjectPaths;
use crate::io::toolchain::Toolchain;
use crate::store;

/// Snapshot of the project's environment state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub env_dir: PathBuf,
    pub env_exists: bool,
    pub interpreter: PathBuf,
    pub requirements_path: PathBuf,
    pub requirements_exists: bool,
    /// Number of requirement entries in the declaration file.
    pub declared: usize,
    /// Number of installed distributions; `None` without an environment.
    pub installed: Option<usize>,
    /// Drift; `None` without an environment.
    pub drift: Option<DriftReport>,
}

/// Gather status. A missing environment is reported, not raised.
pub fn status<T: Toolchain>(paths: &ProjectPaths, toolchain: &T) -> Result<StatusReport> {
    let (requirements_exists, declaration) = match fs::read_to_string(&paths.requirements_path) {
        Ok(text) => (true, Declaration::parse(&text)),
        Err(err) if err.kind() == ErrorKind::NotFound => (false, Declaration::default()),
        Err(err) => return Err(err.into()),
    };

    let env_exists = store::exists(paths);
    let (installed, drift) = if env_exists {
        let listing = toolchain.list_installed(&paths.interpreter())?;
        let pins = Declaration::parse(&listing).entries;
        let drift = compute_drift(&declaration, &pins);
        (Some(pins.len()), Some(drift))
    } else {
        (None, None)
    };

    Ok(StatusReport {
        env_dir: paths.env_dir.clone(),
        env_exists,
        interpreter: paths.interpreter(),
        requirements_path: paths.requirements_path.clone(),
        requirements_exists,
        declared: declaration.entries.len(),
        installed,
        drift,
    })
}

impl StatusReport {
    /// Human-readable multi-line rendering.
    pub fn render(&self) -> String {
        let env_dir = self.env_dir.display();
        let mut out = String::new();
        if self.env_exists {
            out.push_str(&format!("environment: {env_dir} (present)\n"));
            out.push_str(&format!("interpreter: {}\n", self.interpreter.display()));
        } else {
            out.push_str(&format!("environment: {env_dir} (absent)\n"));
        }

        let requirements = self.requirements_path.display();
        if self.requirements_exists {
            out.push_str(&format!(
                "declaration: {requirements} ({} entries)\n",
                self.declared
            ));
        } else {
            out.push_str(&format!("declaration: {requirements} (absent)\n"));
        }

        if let Some(installed) = self.installed {
            out.push_str(&format!("installed: {installed} packages\n"));
        }
        if let Some(drift) = &self.drift {
            if drift.is_clean() {
                out.push_str("drift: none\n");
            }
            for name in &drift.missing {
                out.push_str(&format!("missing: {name}\n"));
            }
            for mismatch in &drift.mismatched {
                out.push_str(&format!(
                    "mismatch: {} declared {} installed {}\n",
                    mismatch.name, mismatch.declared, mismatch.installed
                ));
            }
            for name in &drift.undeclared {
                out.push_str(&format!("undeclared: {name}\n"));
            }
        }
        out
    }
}
