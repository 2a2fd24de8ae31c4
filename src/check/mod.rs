//! Decision policy.
//!
//! Merges the prior-art search and the duplicate check into one
//! recommendation for the orchestrator:
//! - `TaskChecker`: the pre-dispatch entry point
//! - `StopReport`: advisory evidence summary (never gates)
//! - `CheckResult`: block/warn/suggest verdict

mod checker;
mod report;

pub use checker::{CheckResult, TaskCheck, TaskChecker};
pub use report::{Complexity, StopReport};
