//! I/O helpers for envctl commands.

pub mod atomic;
pub mod config;
pub mod paths;
pub mod process;
pub mod toolchain;
