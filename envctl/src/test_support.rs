//! Test-only helpers: a scripted toolchain and throwaway project roots.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::requirements::{Declaration, Requirement, normalize_name};
use crate::error::{EnvError, Result};
use crate::io::config::EnvConfig;
use crate::io::paths::{ProjectPaths, interpreter_in};
use crate::io::toolchain::{InstallRequest, LaunchRequest, Toolchain};
use crate::orchestrator::{Operation, Outcome, execute};

/// File inside a fake environment listing installed `name==version` lines.
pub const FAKE_MANIFEST: &str = "fake-site-packages.txt";

#[derive(Debug, Clone)]
struct FakePackage {
    name: String,
    version: String,
    requires: Vec<String>,
}

/// In-process toolchain that simulates a virtual environment on disk.
///
/// `create_env` writes a placeholder interpreter, `install` resolves entries
/// against a fixed package index (with transitive `requires`), and
/// `list_installed` reads back the recorded manifest in install order.
/// Launches are recorded and answered with a fixed exit code.
pub struct FakeToolchain {
    index: BTreeMap<String, FakePackage>,
    python_available: bool,
    exit_code: i32,
    create_calls: Cell<u32>,
    install_calls: Cell<u32>,
    launches: RefCell<Vec<LaunchRequest>>,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self {
            index: BTreeMap::new(),
            python_available: true,
            exit_code: 0,
            create_calls: Cell::new(0),
            install_calls: Cell::new(0),
            launches: RefCell::new(Vec::new()),
        }
    }

    /// Publish `name==version` in the fake index, depending on `requires`.
    pub fn package(mut self, name: &str, version: &str, requires: &[&str]) -> Self {
        self.index.insert(
            normalize_name(name),
            FakePackage {
                name: name.to_string(),
                version: version.to_string(),
                requires: requires.iter().map(|r| (*r).to_string()).collect(),
            },
        );
        self
    }

    /// Simulate a host without a usable base interpreter.
    pub fn without_python(mut self) -> Self {
        self.python_available = false;
        self
    }

    /// Exit code returned by every launch.
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.get()
    }

    pub fn install_calls(&self) -> u32 {
        self.install_calls.get()
    }

    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.launches.borrow().clone()
    }

    /// Record packages as installed without going through the index.
    pub fn preinstall(&self, paths: &ProjectPaths, pins: &[(&str, &str)]) -> Result<()> {
        let pins: Vec<Requirement> = pins
            .iter()
            .map(|(name, version)| Requirement::pinned(name, version))
            .collect();
        record_installed(&paths.env_dir, &pins)
    }

    fn resolve(&self, declaration: &Declaration) -> Result<Vec<Requirement>> {
        let mut resolved: Vec<Requirement> = Vec::new();
        let mut queue: VecDeque<(String, Option<String>)> = declaration
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.name.clone(),
                    entry.pinned_version().map(str::to_string),
                )
            })
            .collect();

        while let Some((name, wanted)) = queue.pop_front() {
            let key = normalize_name(&name);
            if resolved.iter().any(|pin| pin.key() == key) {
                continue;
            }
            let found = self
                .index
                .get(&key)
                .filter(|pkg| wanted.as_deref().is_none_or(|v| v == pkg.version));
            let Some(pkg) = found else {
                return Err(EnvError::DependencyResolution {
                    package: Some(name),
                    detail: "no matching distribution".to_string(),
                });
            };
            resolved.push(Requirement::pinned(&pkg.name, &pkg.version));
            queue.extend(pkg.requires.iter().map(|dep| (dep.clone(), None)));
        }
        Ok(resolved)
    }
}

impl Toolchain for FakeToolchain {
    fn create_env(&self, python: &str, env_dir: &Path) -> Result<()> {
        self.create_calls.set(self.create_calls.get() + 1);
        if !self.python_available {
            return Err(EnvError::EnvironmentCreation {
                python: python.to_string(),
                reason: format!("spawn {python}: No such file or directory"),
            });
        }
        let interpreter = interpreter_in(env_dir);
        if let Some(parent) = interpreter.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&interpreter, "#!fake-python\n")?;
        let manifest = env_dir.join(FAKE_MANIFEST);
        if !manifest.exists() {
            fs::write(manifest, "")?;
        }
        Ok(())
    }

    fn install(&self, request: &InstallRequest) -> Result<()> {
        self.install_calls.set(self.install_calls.get() + 1);
        let text = fs::read_to_string(&request.requirements_path)?;
        let resolved = self.resolve(&Declaration::parse(&text))?;
        record_installed(&env_dir_of(&request.interpreter)?, &resolved)
    }

    fn list_installed(&self, interpreter: &Path) -> Result<String> {
        let manifest = env_dir_of(interpreter)?.join(FAKE_MANIFEST);
        fs::read_to_string(&manifest).map_err(|err| EnvError::Toolchain {
            action: "pip freeze".to_string(),
            detail: err.to_string(),
        })
    }

    fn launch(&self, request: &LaunchRequest) -> Result<i32> {
        self.launches.borrow_mut().push(request.clone());
        Ok(self.exit_code)
    }
}

fn env_dir_of(interpreter: &Path) -> Result<PathBuf> {
    interpreter
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(|| EnvError::Toolchain {
            action: "locate environment".to_string(),
            detail: format!("no environment root above {}", interpreter.display()),
        })
}

/// Merge pins into the manifest, replacing existing versions in place.
fn record_installed(env_dir: &Path, pins: &[Requirement]) -> Result<()> {
    let manifest = env_dir.join(FAKE_MANIFEST);
    let existing = fs::read_to_string(&manifest).unwrap_or_default();
    let mut installed = Declaration::parse(&existing).entries;
    for pin in pins {
        match installed.iter_mut().find(|have| have.key() == pin.key()) {
            Some(have) => *have = pin.clone(),
            None => installed.push(pin.clone()),
        }
    }
    let mut out = String::new();
    for pin in &installed {
        out.push_str(&pin.to_string());
        out.push('\n');
    }
    fs::write(manifest, out)?;
    Ok(())
}

/// Temporary project root with default configuration.
pub struct TestProject {
    _temp: TempDir,
    config: EnvConfig,
    paths: ProjectPaths,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let config = EnvConfig::default();
        let paths = ProjectPaths::new(temp.path(), &config);
        Ok(Self {
            _temp: temp,
            config,
            paths,
        })
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Point the declaration file somewhere else (relative to the root).
    pub fn set_requirements(&mut self, relative: &str) {
        self.config.requirements = PathBuf::from(relative);
        self.paths = ProjectPaths::new(self.paths.root.clone(), &self.config);
    }

    pub fn write_requirements(&self, contents: &str) -> Result<()> {
        fs::write(&self.paths.requirements_path, contents)?;
        Ok(())
    }

    pub fn read_requirements(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.paths.requirements_path)?)
    }

    pub fn write_entry_point(&self, contents: &str) -> Result<()> {
        fs::write(&self.paths.entry_point_path, contents)?;
        Ok(())
    }

    pub fn execute<T: Toolchain>(&self, operation: &Operation, toolchain: &T) -> Result<Outcome> {
        execute(operation, &self.paths, &self.config, toolchain)
    }
}
