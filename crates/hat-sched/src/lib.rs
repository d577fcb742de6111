//! Execution scheduler
//!
//! Runs a compiled artifact once per test case, each run an isolated OS
//! process. Two batch modes: Distinct runs every case independently and
//! sequentially; Simultaneous submits the whole batch at once and admits
//! runs per the automation's admission mode (single / restart / queued /
//! parallel).
//!
//! Process-level failures (non-zero exit, timeout, malformed stdout) are
//! per-case execution errors; admission outcomes (skipped, cancelled,
//! rejected) are distinct from pass/fail/error. Neither aborts the batch.

mod runner;
mod scheduler;

pub use runner::classify_report;
pub use scheduler::{RunMode, Scheduler};
