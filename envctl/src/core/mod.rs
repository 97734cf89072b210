//! Deterministic, pure logic shared by the envctl commands.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod drift;
pub mod requirements;
