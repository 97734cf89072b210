//! Launcher: run the entry point with the environment's interpreter.

use tracing::{debug, instrument};

use crate::error::{EnvError, Result};
use crate::io::paths::ProjectPaths;
use crate::io::toolchain::{LaunchRequest, Toolchain};
use crate::store;

/// Run the entry point and return its exit code unchanged.
///
/// Standard streams are inherited. A child killed by a signal reports
/// `128 + signal` on Unix.
#[instrument(skip_all, fields(entry_point = %paths.entry_point_path.display()))]
pub fn run<T: Toolchain>(paths: &ProjectPaths, args: &[String], toolchain: &T) -> Result<i32> {
    let interpreter = store::require(paths)?;
    if !paths.entry_point_path.is_file() {
        return Err(EnvError::Launch {
            entry_point: paths.entry_point_path.clone(),
            reason: "entry point not found".to_string(),
        });
    }

    let code = toolchain.launch(&LaunchRequest {
        interpreter,
        entry_point: paths.entry_point_path.clone(),
        args: args.to_vec(),
        workdir: paths.root.clone(),
    })?;
    debug!(code, "entry point exited");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::create;
    use crate::test_support::{FakeToolchain, TestProject};

    #[test]
    fn run_requires_environment() {
        let project = TestProject::new().expect("project");
        project.write_entry_point("print('hi')\n").expect("entry");
        let err = run(project.paths(), &[], &FakeToolchain::new()).expect_err("should fail");
        assert!(matches!(err, EnvError::EnvironmentMissing { .. }));
    }

    #[test]
    fn missing_entry_point_is_launch_error() {
        let project = TestProject::new().expect("project");
        let toolchain = FakeToolchain::new();
        create(project.paths(), "python3", &toolchain).expect("create");

        let err = run(project.paths(), &[], &toolchain).expect_err("should fail");
        assert!(matches!(err, EnvError::Launch { .. }));
        assert!(toolchain.launches().is_empty());
    }

    #[test]
    fn exit_code_and_args_pass_through() {
        let project = TestProject::new().expect("project");
        project.write_entry_point("import sys\n").expect("entry");
        let toolchain = FakeToolchain::new().exit_code(64);
        create(project.paths(), "python3", &toolchain).expect("create");

        let args = vec!["extra".to_string(), "--flag".to_string()];
        let code = run(project.paths(), &args, &toolchain).expect("run");

        assert_eq!(code, 64);
        let launches = toolchain.launches();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].args, args);
        assert_eq!(launches[0].interpreter, project.paths().interpreter());
        assert_eq!(launches[0].workdir, project.paths().root);
    }
}
