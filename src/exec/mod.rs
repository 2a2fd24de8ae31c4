//! Process-execution port.
//!
//! All external tools (version control, issue tracker, text search)
//! are reached through the `CommandRunner` trait so tests can
//! substitute a stub without touching real binaries.

mod runner;

pub use runner::{CommandRunner, SystemRunner};
