//! Named operations and their fixed compositions.
//!
//! Each operation is invoked independently; there is no pipeline that chains
//! create, install and run. Callers sequence them (`venv`, then `reqs`, then
//! `run`). Concurrent operations against one environment root are not guarded.

use std::fmt;

use tracing::debug;

use crate::core::requirements::FreezeScope;
use crate::error::Result;
use crate::exit_codes;
use crate::freeze::{FreezeOutcome, freeze};
use crate::install::install;
use crate::io::config::EnvConfig;
use crate::io::paths::ProjectPaths;
use crate::io::toolchain::Toolchain;
use crate::launch;
use crate::status::{StatusReport, status};
use crate::store::{self, CreateOutcome, DestroyOutcome};

/// Operation names as exposed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create the environment if absent (does not install).
    Build,
    /// Create the environment if absent.
    Venv,
    /// Install the declaration file into the existing environment.
    Reqs,
    /// Launch the entry point with extra arguments.
    Run { args: Vec<String> },
    /// Rewrite the declaration file from the environment.
    Freeze { scope: FreezeScope },
    /// Remove the environment root.
    Clean,
    /// Report environment state and drift.
    Status,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Build => "build",
            Operation::Venv => "venv",
            Operation::Reqs => "reqs",
            Operation::Run { .. } => "run",
            Operation::Freeze { .. } => "freeze",
            Operation::Clean => "clean",
            Operation::Status => "status",
        };
        f.write_str(name)
    }
}

/// What an operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(CreateOutcome),
    Installed,
    Ran { exit_code: i32 },
    Frozen(FreezeOutcome),
    Cleaned(DestroyOutcome),
    Status(Box<StatusReport>),
}

impl Outcome {
    /// Process exit code: the entry point's own code for `run`, otherwise success.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Ran { exit_code } => *exit_code,
            _ => exit_codes::OK,
        }
    }
}

/// Execute one operation against one project.
pub fn execute<T: Toolchain>(
    operation: &Operation,
    paths: &ProjectPaths,
    config: &EnvConfig,
    toolchain: &T,
) -> Result<Outcome> {
    debug!(%operation, root = %paths.root.display(), "executing operation");
    match operation {
        Operation::Build | Operation::Venv => {
            store::create(paths, &config.python, toolchain).map(Outcome::Created)
        }
        Operation::Reqs => install(paths, config.install.output_limit_bytes, toolchain)
            .map(|()| Outcome::Installed),
        Operation::Run { args } => {
            launch::run(paths, args, toolchain).map(|exit_code| Outcome::Ran { exit_code })
        }
        Operation::Freeze { scope } => freeze(paths, *scope, toolchain).map(Outcome::Frozen),
        Operation::Clean => store::destroy(paths).map(Outcome::Cleaned),
        Operation::Status => {
            status(paths, toolchain).map(|report| Outcome::Status(Box::new(report)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnvError;
    use crate::test_support::{FakeToolchain, TestProject};

    #[test]
    fn build_creates_without_installing() {
        let project = TestProject::new().expect("project");
        project.write_requirements("requests==2.31.0\n").expect("write");
        let toolchain = FakeToolchain::new().package("requests", "2.31.0", &[]);

        let outcome = project.execute(&Operation::Build, &toolchain).expect("build");

        assert_eq!(outcome, Outcome::Created(CreateOutcome::Created));
        assert_eq!(toolchain.install_calls(), 0);
    }

    #[test]
    fn reqs_does_not_auto_create() {
        let project = TestProject::new().expect("project");
        project.write_requirements("requests==2.31.0\n").expect("write");
        let toolchain = FakeToolchain::new().package("requests", "2.31.0", &[]);

        let err = project.execute(&Operation::Reqs, &toolchain).expect_err("reqs");
        assert!(matches!(err, EnvError::EnvironmentMissing { .. }));
        assert_eq!(toolchain.create_calls(), 0);
    }

    #[test]
    fn run_outcome_carries_child_exit_code() {
        let project = TestProject::new().expect("project");
        project.write_entry_point("raise SystemExit(3)\n").expect("entry");
        let toolchain = FakeToolchain::new().exit_code(3);
        project.execute(&Operation::Venv, &toolchain).expect("venv");

        let outcome = project
            .execute(&Operation::Run { args: Vec::new() }, &toolchain)
            .expect("run");
        assert_eq!(outcome.exit_code(), 3);
    }

    #[test]
    fn clean_without_environment_succeeds() {
        let project = TestProject::new().expect("project");
        let outcome = project
            .execute(&Operation::Clean, &FakeToolchain::new())
            .expect("clean");
        assert_eq!(outcome, Outcome::Cleaned(DestroyOutcome::NothingToRemove));
        assert_eq!(outcome.exit_code(), exit_codes::OK);
    }
}
