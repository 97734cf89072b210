//! Dependency snapshotter: record the installed set into the declaration file.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, info, instrument};

use crate::core::requirements::{Declaration, FreezeScope, Snapshot};
use crate::error::{EnvError, Result};
use crate::io::atomic::write_atomic;
use crate::io::paths::ProjectPaths;
use crate::io::toolchain::Toolchain;
use crate::store;

/// Result of a freeze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeOutcome {
    pub path: PathBuf,
    /// Number of pinned packages written.
    pub pins: usize,
    /// False when the declaration file already held exactly these bytes.
    pub changed: bool,
}

/// Replace the declaration file with the environment's installed packages.
///
/// Output is deterministic (sorted by normalized name, `\n` endings), so two
/// freezes without installs in between produce byte-identical files. Option
/// lines of the current declaration file are carried over ahead of the pins.
/// The write is atomic: on failure the previous file is left intact.
#[instrument(skip_all, fields(requirements = %paths.requirements_path.display(), scope = ?scope))]
pub fn freeze<T: Toolchain>(
    paths: &ProjectPaths,
    scope: FreezeScope,
    toolchain: &T,
) -> Result<FreezeOutcome> {
    let interpreter = store::require(paths)?;
    let listing = toolchain.list_installed(&interpreter)?;

    let current = read_existing(paths)?;
    let declared = Declaration::parse(current.as_deref().unwrap_or_default());
    let snapshot =
        Snapshot::from_listing(&listing, &declared.directives).scoped(scope, &declared);
    let rendered = snapshot.render();

    let outcome = FreezeOutcome {
        path: paths.requirements_path.clone(),
        pins: snapshot.pins.len(),
        changed: current.as_deref() != Some(rendered.as_str()),
    };
    if !outcome.changed {
        debug!("declaration file already up to date");
        return Ok(outcome);
    }

    write_atomic(&paths.requirements_path, rendered.as_bytes()).map_err(|source| {
        EnvError::SnapshotWrite {
            path: paths.requirements_path.clone(),
            source,
        }
    })?;
    info!(pins = outcome.pins, "declaration file written");
    Ok(outcome)
}

/// Current declaration text. A target that exists but cannot be read (a
/// directory, invalid UTF-8) cannot be replaced either.
fn read_existing(paths: &ProjectPaths) -> Result<Option<String>> {
    match fs::read_to_string(&paths.requirements_path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(EnvError::SnapshotWrite {
            path: paths.requirements_path.clone(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::create;
    use crate::test_support::{FakeToolchain, TestProject};

    #[test]
    fn freeze_requires_environment() {
        let project = TestProject::new().expect("project");
        let err = freeze(project.paths(), FreezeScope::All, &FakeToolchain::new())
            .expect_err("should fail");
        assert!(matches!(err, EnvError::EnvironmentMissing { .. }));
        assert!(!project.paths().requirements_path.exists());
    }

    #[test]
    fn freeze_of_empty_environment_writes_empty_file() {
        let project = TestProject::new().expect("project");
        let toolchain = FakeToolchain::new();
        create(project.paths(), "python3", &toolchain).expect("create");

        let outcome = freeze(project.paths(), FreezeScope::All, &toolchain).expect("freeze");
        assert_eq!(outcome.pins, 0);
        assert!(outcome.changed);
        assert_eq!(project.read_requirements().expect("read"), "");
    }

    #[test]
    fn second_freeze_reports_unchanged() {
        let project = TestProject::new().expect("project");
        let toolchain = FakeToolchain::new();
        create(project.paths(), "python3", &toolchain).expect("create");
        toolchain
            .preinstall(project.paths(), &[("six", "1.16.0")])
            .expect("preinstall");

        let first = freeze(project.paths(), FreezeScope::All, &toolchain).expect("freeze");
        let second = freeze(project.paths(), FreezeScope::All, &toolchain).expect("freeze");
        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(project.read_requirements().expect("read"), "six==1.16.0\n");
    }

    #[test]
    fn directory_at_target_is_snapshot_error_and_left_intact() {
        let project = TestProject::new().expect("project");
        let toolchain = FakeToolchain::new();
        create(project.paths(), "python3", &toolchain).expect("create");
        toolchain
            .preinstall(project.paths(), &[("six", "1.16.0")])
            .expect("preinstall");
        let target = &project.paths().requirements_path;
        fs::create_dir(target).expect("dir at target");
        fs::write(target.join("keep.txt"), "keep\n").expect("seed");

        let err = freeze(project.paths(), FreezeScope::All, &toolchain).expect_err("should fail");
        assert!(matches!(err, EnvError::SnapshotWrite { .. }));
        assert_eq!(err.exit_code(), crate::exit_codes::SNAPSHOT_WRITE);
        assert_eq!(
            fs::read_to_string(target.join("keep.txt")).expect("read"),
            "keep\n"
        );
    }

    #[test]
    fn invalid_utf8_declaration_is_snapshot_error_and_left_intact() {
        let project = TestProject::new().expect("project");
        let toolchain = FakeToolchain::new();
        create(project.paths(), "python3", &toolchain).expect("create");
        let original: &[u8] = b"six==1.16.0\n\xff\xfe\n";
        fs::write(&project.paths().requirements_path, original).expect("seed");

        let err = freeze(project.paths(), FreezeScope::All, &toolchain).expect_err("should fail");
        assert!(matches!(err, EnvError::SnapshotWrite { .. }));
        assert_eq!(
            fs::read(&project.paths().requirements_path).expect("read"),
            original
        );
    }

    #[test]
    fn unwritable_target_is_snapshot_error() {
        let mut project = TestProject::new().expect("project");
        project.set_requirements("missing-dir/requirements.txt");
        let toolchain = FakeToolchain::new();
        create(project.paths(), "python3", &toolchain).expect("create");
        toolchain
            .preinstall(project.paths(), &[("six", "1.16.0")])
            .expect("preinstall");

        let err = freeze(project.paths(), FreezeScope::All, &toolchain).expect_err("should fail");
        assert!(matches!(err, EnvError::SnapshotWrite { .. }));
        assert!(!project.paths().requirements_path.exists());
    }
}
