//! Lifecycle orchestration for an isolated Python environment.
//!
//! The crate manages a single on-disk environment (a `venv`) rooted at a
//! configured directory and a declaration file (`requirements.txt`). The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (declaration parsing, snapshot
//!   rendering, drift computation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, atomic writes, process
//!   execution). The [`io::toolchain::Toolchain`] trait is the seam tests replace.
//!
//! Orchestration modules ([`store`], [`install`], [`freeze`], [`launch`],
//! [`status`], [`orchestrator`]) coordinate core logic with I/O to implement
//! CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod freeze;
pub mod install;
pub mod io;
pub mod launch;
pub mod logging;
pub mod orchestrator;
pub mod status;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
