//! Wire shapes printed by compiled artifacts
//!
//! A compiled script prints exactly one JSON object of this shape on
//! stdout. The scheduler parses it; the compiler guarantees it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The whole stdout object: one member per section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub trigger: TriggerReport,
    pub condition: ConditionReport,
    pub action: ActionReport,
}

/// Action section result: ordered records, or an explicit error
///
/// A missing required guard input aborts the section with an error
/// object, never a silently shortened record list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionReport {
    Records(Vec<ActionRecord>),
    Error { error: String },
}

impl ActionReport {
    /// The records, when the section completed
    pub fn records(&self) -> Option<&[ActionRecord]> {
        match self {
            ActionReport::Records(records) => Some(records),
            ActionReport::Error { .. } => None,
        }
    }
}

/// Trigger section result: did anything fire, and which trigger was it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerReport {
    pub triggered: bool,

    /// Declared id of the first firing trigger, if it had one
    pub trigger_id: Option<String>,
}

/// Condition section result: pass, fail, or an explicit error
///
/// A missing required input is an error, never a silent `fail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    /// "pass" | "fail" | "error"
    pub result: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ConditionReport {
    pub fn passed(&self) -> bool {
        self.result == crate::verdict::PASS
    }

    pub fn errored(&self) -> bool {
        self.result == crate::verdict::ERROR
    }
}

/// One executed Output entity, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Position of the Output entity that produced this record
    pub position: u32,

    /// Entity name of the output
    pub entity: String,

    /// Constraint parameters baked in at compile time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,

    /// Present inside repeat bodies: iteration count or "infinite"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatTag>,
}

/// How a repeat body was included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepeatTag {
    Count(u64),
    /// The loop condition is statically true; the body is included once,
    /// tagged "infinite"
    Infinite(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_roundtrip() {
        let raw = json!({
            "trigger": {"triggered": true, "trigger_id": "motion"},
            "condition": {"result": "pass"},
            "action": [
                {"position": 1, "entity": "light.porch", "expected": {"service": "light.turn_on"}},
                {"position": 3, "entity": "light.hall", "repeat": 5},
            ]
        });

        let report: ArtifactReport = serde_json::from_value(raw).unwrap();
        assert!(report.trigger.triggered);
        assert_eq!(report.trigger.trigger_id.as_deref(), Some("motion"));
        assert!(report.condition.passed());
        let records = report.action.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].repeat, Some(RepeatTag::Count(5)));
    }

    #[test]
    fn test_infinite_repeat_tag() {
        let record: ActionRecord = serde_json::from_value(json!({
            "position": 2,
            "entity": "switch.pump",
            "repeat": "infinite"
        }))
        .unwrap();
        assert_eq!(record.repeat, Some(RepeatTag::Infinite("infinite".to_string())));
    }

    #[test]
    fn test_action_error_shape() {
        let report: ActionReport =
            serde_json::from_value(json!({"error": "missing input at slot 2"})).unwrap();
        assert!(report.records().is_none());

        let report: ActionReport = serde_json::from_value(json!([])).unwrap();
        assert_eq!(report.records(), Some(&[][..]));
    }

    #[test]
    fn test_error_verdict() {
        let report = ConditionReport {
            result: "error".to_string(),
            detail: Some("missing input at slot 0".to_string()),
        };
        assert!(report.errored());
        assert!(!report.passed());
    }
}
