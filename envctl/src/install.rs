//! Dependency installer: materialize the declaration file into the environment.

use tracing::{info, instrument};

use crate::error::{EnvError, Result};
use crate::io::paths::ProjectPaths;
use crate::io::toolchain::{InstallRequest, Toolchain};
use crate::store;

/// Install the declaration file into the existing environment.
///
/// Never creates the environment and never modifies the declaration file. Any
/// failure aborts the whole call; whatever the installer left behind should be
/// treated as invalid (re-run, or `clean` and rebuild).
#[instrument(skip_all, fields(requirements = %paths.requirements_path.display()))]
pub fn install<T: Toolchain>(
    paths: &ProjectPaths,
    output_limit_bytes: usize,
    toolchain: &T,
) -> Result<()> {
    let interpreter = store::require(paths)?;
    if !paths.requirements_path.is_file() {
        return Err(EnvError::DependencyResolution {
            package: None,
            detail: format!(
                "declaration file {} not found",
                paths.requirements_path.display()
            ),
        });
    }

    toolchain.install(&InstallRequest {
        interpreter,
        requirements_path: paths.requirements_path.clone(),
        workdir: paths.root.clone(),
        output_limit_bytes,
    })?;
    info!("dependencies installed");
    Ok(())
}
