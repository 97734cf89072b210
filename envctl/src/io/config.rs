//! Project configuration stored in `envctl.toml` at the project root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::requirements::FreezeScope;

/// Default config file name, resolved against the project root.
pub const CONFIG_FILE: &str = "envctl.toml";

/// envctl configuration (TOML).
///
/// The file is optional and meant to be edited by humans. Missing fields
/// default to the conventional layout (`.venv`, `requirements.txt`, `main.py`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnvConfig {
    /// Environment root, relative to the project root.
    pub env_dir: PathBuf,

    /// Declaration file read by `reqs` and rewritten by `freeze`.
    pub requirements: PathBuf,

    /// Program launched by `run`.
    pub entry_point: PathBuf,

    /// Base interpreter used to create the environment.
    pub python: String,

    pub install: InstallConfig,

    pub freeze: FreezeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallConfig {
    /// Truncate captured installer stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            output_limit_bytes: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FreezeConfig {
    pub scope: FreezeScope,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            env_dir: PathBuf::from(".venv"),
            requirements: PathBuf::from("requirements.txt"),
            entry_point: PathBuf::from("main.py"),
            python: "python3".to_string(),
            install: InstallConfig::default(),
            freeze: FreezeConfig::default(),
        }
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<()> {
        // `clean` removes env_dir recursively; it must stay inside the project root.
        if self.env_dir.as_os_str().is_empty() {
            return Err(anyhow!("env_dir must not be empty"));
        }
        if !self
            .env_dir
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            || self.env_dir.components().all(|c| c == Component::CurDir)
        {
            return Err(anyhow!(
                "env_dir must be a relative path below the project root, got {}",
                self.env_dir.display()
            ));
        }
        if self.requirements.as_os_str().is_empty() {
            return Err(anyhow!("requirements must not be empty"));
        }
        if self.entry_point.as_os_str().is_empty() {
            return Err(anyhow!("entry_point must not be empty"));
        }
        if self.python.trim().is_empty() {
            return Err(anyhow!("python must not be empty"));
        }
        if self.install.output_limit_bytes == 0 {
            return Err(anyhow!("install.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EnvConfig::default()`.
pub fn load_config(path: &Path) -> Result<EnvConfig> {
    if !path.exists() {
        let cfg = EnvConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EnvConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
