//! Test cases and their execution outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Batch-uniform priority applied to generated cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// One concrete positional input vector for a compiled artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique identifier (ulid)
    pub id: String,

    /// Automation this case was generated for
    pub automation_id: String,

    /// Requirement tag applied uniformly to the batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,

    /// Priority applied uniformly to the batch
    #[serde(default)]
    pub priority: Priority,

    /// Values for the trigger section, indexed by real_position
    pub trigger_inputs: Vec<Value>,

    /// Values for the condition section, indexed by real_position
    pub condition_inputs: Vec<Value>,

    /// Values for the action section, indexed by real_position
    pub action_inputs: Vec<Value>,

    /// When the case was generated
    pub created_at: DateTime<Utc>,
}

impl TestCase {
    /// The serialized 3-element argument the artifact is invoked with
    pub fn payload(&self) -> Value {
        Value::Array(vec![
            Value::Array(self.trigger_inputs.clone()),
            Value::Array(self.condition_inputs.clone()),
            Value::Array(self.action_inputs.clone()),
        ])
    }
}

/// Terminal status of one scheduled case run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Trigger fired and conditions passed
    Passed,

    /// The artifact ran but the logic did not pass
    Failed,

    /// Process-level failure: non-zero exit, timeout, malformed output
    Error,

    /// Dropped by single-mode admission while an instance was active
    Skipped,

    /// Killed by restart-mode admission before completing
    Cancelled,

    /// Refused by queued-mode admission, queue bound reached
    Rejected,
}

impl CaseStatus {
    /// Whether this outcome came from the admission discipline rather
    /// than from running the artifact
    pub fn is_admission(self) -> bool {
        matches!(
            self,
            CaseStatus::Skipped | CaseStatus::Cancelled | CaseStatus::Rejected
        )
    }
}

/// The scheduler's record of one case run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    /// The case that was run
    pub case_id: String,

    /// Terminal status
    pub status: CaseStatus,

    /// Error or admission detail, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Parsed artifact report, when the process produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<crate::ArtifactReport>,

    /// When the run finished (or was refused)
    pub finished_at: DateTime<Utc>,
}
