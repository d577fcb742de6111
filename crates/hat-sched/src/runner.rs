//! Single-case process execution
//!
//! One test case, one process: the artifact is invoked with the case's
//! serialized 3-section payload, stdout is parsed as the result object.

use chrono::Utc;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use hat_core::{ArtifactReport, CaseOutcome, CaseStatus, TestCase};

/// Spawn the artifact process for one case
pub(crate) fn spawn_case(
    interpreter: &str,
    script: &Path,
    case: &TestCase,
) -> std::io::Result<Child> {
    Command::new(interpreter)
        .arg(script)
        .arg(case.payload().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Run one case to completion, with the per-process timeout
pub(crate) async fn run_case(
    interpreter: &str,
    script: &Path,
    case: &TestCase,
    timeout: Duration,
) -> CaseOutcome {
    debug!(case = %case.id, "running test case");

    let child = match spawn_case(interpreter, script, case) {
        Ok(child) => child,
        Err(e) => return error_outcome(case, format!("failed to spawn artifact: {e}")),
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        // Dropping the in-flight future kills the child (kill_on_drop).
        Err(_) => {
            warn!(case = %case.id, ?timeout, "artifact timed out");
            return error_outcome(case, format!("timed out after {}s", timeout.as_secs()));
        }
        Ok(Err(e)) => return error_outcome(case, format!("failed to collect output: {e}")),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return error_outcome(
            case,
            format!(
                "artifact exited with {}: {}",
                output.status,
                stderr.trim().chars().take(200).collect::<String>()
            ),
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match serde_json::from_str::<ArtifactReport>(stdout.trim()) {
        Ok(report) => {
            let (status, detail) = classify_report(&report);
            CaseOutcome {
                case_id: case.id.clone(),
                status,
                detail,
                report: Some(report),
                finished_at: Utc::now(),
            }
        }
        Err(e) => error_outcome(case, format!("malformed artifact output: {e}")),
    }
}

/// Kill an in-flight child and wait until it is actually gone.
///
/// Restart admission depends on this: the next instance must not start
/// until the previous process has terminated.
pub(crate) async fn kill_and_reap(mut child: Child) {
    if let Err(e) = child.kill().await {
        warn!("failed to kill in-flight artifact: {e}");
    }
    let _ = child.wait().await;
}

/// Derive the case verdict from a parsed report: the trigger must have
/// fired and the conditions passed; any section-level error is an
/// execution-class error, never a logic failure.
pub fn classify_report(report: &ArtifactReport) -> (CaseStatus, Option<String>) {
    if report.condition.errored() {
        return (
            CaseStatus::Error,
            report
                .condition
                .detail
                .clone()
                .or_else(|| Some("condition section reported an error".to_string())),
        );
    }
    if let hat_core::ActionReport::Error { error } = &report.action {
        return (CaseStatus::Error, Some(error.clone()));
    }
    if report.trigger.triggered && report.condition.passed() {
        (CaseStatus::Passed, None)
    } else if !report.trigger.triggered {
        (CaseStatus::Failed, Some("trigger did not fire".to_string()))
    } else {
        (CaseStatus::Failed, Some("conditions not met".to_string()))
    }
}

pub(crate) fn error_outcome(case: &TestCase, detail: String) -> CaseOutcome {
    CaseOutcome {
        case_id: case.id.clone(),
        status: CaseStatus::Error,
        detail: Some(detail),
        report: None,
        finished_at: Utc::now(),
    }
}

pub(crate) fn admission_outcome(case: &TestCase, status: CaseStatus, detail: &str) -> CaseOutcome {
    CaseOutcome {
        case_id: case.id.clone(),
        status,
        detail: Some(detail.to_string()),
        report: None,
        finished_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(raw: serde_json::Value) -> ArtifactReport {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_classify_pass() {
        let (status, _) = classify_report(&report(json!({
            "trigger": {"triggered": true, "trigger_id": null},
            "condition": {"result": "pass"},
            "action": []
        })));
        assert_eq!(status, CaseStatus::Passed);
    }

    #[test]
    fn test_classify_untriggered() {
        let (status, detail) = classify_report(&report(json!({
            "trigger": {"triggered": false, "trigger_id": null},
            "condition": {"result": "pass"},
            "action": []
        })));
        assert_eq!(status, CaseStatus::Failed);
        assert_eq!(detail.as_deref(), Some("trigger did not fire"));
    }

    #[test]
    fn test_classify_condition_error_wins() {
        let (status, detail) = classify_report(&report(json!({
            "trigger": {"triggered": true, "trigger_id": null},
            "condition": {"result": "error", "detail": "missing input at slot 0"},
            "action": []
        })));
        assert_eq!(status, CaseStatus::Error);
        assert_eq!(detail.as_deref(), Some("missing input at slot 0"));
    }

    #[test]
    fn test_classify_action_error() {
        let (status, _) = classify_report(&report(json!({
            "trigger": {"triggered": true, "trigger_id": null},
            "condition": {"result": "pass"},
            "action": {"error": "missing input at slot 1"}
        })));
        assert_eq!(status, CaseStatus::Error);
    }
}
