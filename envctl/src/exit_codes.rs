//! Stable exit codes for envctl CLI commands.
//!
//! `envctl run` does not use these on success or on a child failure: the entry
//! point's own exit code is passed through unchanged.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid invocation, invalid configuration, or an unclassified I/O failure.
pub const INVALID: i32 = 1;
/// The base interpreter could not create the environment.
pub const ENV_CREATE: i32 = 2;
/// The command requires an environment that does not exist.
pub const ENV_MISSING: i32 = 3;
/// One or more declared packages failed to resolve or install.
pub const RESOLUTION: i32 = 4;
/// The declaration file could not be atomically replaced.
pub const SNAPSHOT_WRITE: i32 = 5;
/// The entry point could not be started.
pub const LAUNCH: i32 = 6;
/// A helper command inside the environment failed (e.g. listing packages).
pub const TOOLCHAIN: i32 = 7;
