//! Batch scheduling and admission disciplines

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use hat_core::{CaseOutcome, CaseStatus, TestCase};
use hat_rule::{AdmissionMode, Automation};

use crate::runner::{admission_outcome, kill_and_reap, run_case, spawn_case};

/// How a batch of test cases is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every case runs independently and sequentially; the automation's
    /// admission mode is ignored
    Distinct,

    /// The whole batch is submitted at once and admitted per the
    /// automation's mode
    Simultaneous,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs compiled artifacts, one isolated process per test case
pub struct Scheduler {
    interpreter: String,
    timeout: Duration,
    /// Live run counts keyed by automation id
    active: DashMap<String, usize>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout: DEFAULT_TIMEOUT,
            active: DashMap::new(),
        }
    }

    /// Override the artifact interpreter (tests use a shell)
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Override the per-process timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Currently running instances of one automation
    pub fn active_runs(&self, automation_id: &str) -> usize {
        self.active.get(automation_id).map(|n| *n).unwrap_or(0)
    }

    /// Run a batch of test cases against one automation's artifact.
    ///
    /// Outcomes are returned in case order regardless of completion
    /// order.
    pub async fn run(
        &self,
        mode: RunMode,
        automation: &Automation,
        script: &Path,
        cases: &[TestCase],
    ) -> Vec<CaseOutcome> {
        info!(
            automation = %automation.id,
            ?mode,
            cases = cases.len(),
            "starting batch run"
        );

        match mode {
            RunMode::Distinct => self.run_distinct(automation, script, cases).await,
            RunMode::Simultaneous => match automation.mode {
                AdmissionMode::Single => self.run_single(automation, script, cases).await,
                AdmissionMode::Restart => self.run_restart(automation, script, cases).await,
                AdmissionMode::Queued => self.run_queued(automation, script, cases).await,
                AdmissionMode::Parallel => self.run_parallel(automation, script, cases).await,
            },
        }
    }

    async fn run_distinct(
        &self,
        automation: &Automation,
        script: &Path,
        cases: &[TestCase],
    ) -> Vec<CaseOutcome> {
        let mut outcomes = Vec::with_capacity(cases.len());
        for case in cases {
            self.begin(&automation.id);
            outcomes.push(run_case(&self.interpreter, script, case, self.timeout).await);
            self.end(&automation.id);
        }
        outcomes
    }

    /// single: the first request wins, the rest of the simultaneous
    /// batch is dropped
    async fn run_single(
        &self,
        automation: &Automation,
        script: &Path,
        cases: &[TestCase],
    ) -> Vec<CaseOutcome> {
        let mut outcomes = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            if index == 0 {
                self.begin(&automation.id);
                outcomes.push(run_case(&self.interpreter, script, case, self.timeout).await);
                self.end(&automation.id);
            } else {
                debug!(case = %case.id, "dropped by single-mode admission");
                outcomes.push(admission_outcome(
                    case,
                    CaseStatus::Skipped,
                    "an instance was already running",
                ));
            }
        }
        outcomes
    }

    /// restart: each arriving request kills the in-flight instance and
    /// waits for it to terminate before starting
    async fn run_restart(
        &self,
        automation: &Automation,
        script: &Path,
        cases: &[TestCase],
    ) -> Vec<CaseOutcome> {
        let mut outcomes = Vec::with_capacity(cases.len());
        let Some((last, earlier)) = cases.split_last() else {
            return outcomes;
        };

        for case in earlier {
            match spawn_case(&self.interpreter, script, case) {
                Ok(child) => {
                    self.begin(&automation.id);
                    // The next request has already arrived; terminate
                    // this instance before admitting it.
                    kill_and_reap(child).await;
                    self.end(&automation.id);
                    warn!(case = %case.id, "cancelled by restart-mode admission");
                    outcomes.push(admission_outcome(
                        case,
                        CaseStatus::Cancelled,
                        "restarted by a newer run request",
                    ));
                }
                Err(e) => {
                    outcomes.push(crate::runner::error_outcome(
                        case,
                        format!("failed to spawn artifact: {e}"),
                    ));
                }
            }
        }

        self.begin(&automation.id);
        outcomes.push(run_case(&self.interpreter, script, last, self.timeout).await);
        self.end(&automation.id);
        outcomes
    }

    /// queued: one executes, up to `max` wait in FIFO order, arrivals
    /// beyond the queue bound are rejected
    async fn run_queued(
        &self,
        automation: &Automation,
        script: &Path,
        cases: &[TestCase],
    ) -> Vec<CaseOutcome> {
        let admitted = 1 + automation.max;
        let mut outcomes = Vec::with_capacity(cases.len());

        for (index, case) in cases.iter().enumerate() {
            if index < admitted {
                self.begin(&automation.id);
                outcomes.push(run_case(&self.interpreter, script, case, self.timeout).await);
                self.end(&automation.id);
            } else {
                warn!(case = %case.id, max = automation.max, "rejected by queued-mode admission");
                outcomes.push(admission_outcome(
                    case,
                    CaseStatus::Rejected,
                    "queue bound reached",
                ));
            }
        }
        outcomes
    }

    /// parallel: up to `max` concurrently, excess requests wait for a
    /// slot in arrival order
    async fn run_parallel(
        &self,
        automation: &Automation,
        script: &Path,
        cases: &[TestCase],
    ) -> Vec<CaseOutcome> {
        let permits = automation.max.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut handles = Vec::with_capacity(cases.len());

        for case in cases.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let interpreter = self.interpreter.clone();
            let script = script.to_path_buf();
            let timeout = self.timeout;
            self.begin(&automation.id);

            handles.push(tokio::spawn(async move {
                // Closing the semaphore is never done here; acquire only
                // fails on close, so a failed acquire means shutdown.
                let _permit = semaphore.acquire().await;
                run_case(&interpreter, &script, &case, timeout).await
            }));
        }

        let mut outcomes = Vec::with_capacity(cases.len());
        for (handle, case) in handles.into_iter().zip(cases) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(crate::runner::error_outcome(
                    case,
                    format!("run task panicked: {e}"),
                )),
            }
            self.end(&automation.id);
        }
        outcomes
    }

    fn begin(&self, automation_id: &str) {
        *self.active.entry(automation_id.to_string()).or_insert(0) += 1;
    }

    fn end(&self, automation_id: &str) {
        if let Some(mut count) = self.active.get_mut(automation_id) {
            *count = count.saturating_sub(1);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
