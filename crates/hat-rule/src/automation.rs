//! Automation metadata
//!
//! An automation ties triggers, conditions and actions together with the
//! admission discipline its runs are subject to. The test subsystem only
//! ever reads this; re-compilation and re-validation mutate it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::action::Action;
use crate::condition::Condition;
use crate::trigger::Trigger;

/// How concurrent run requests for one automation are admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// One instance; requests arriving while it runs are dropped
    #[default]
    Single,

    /// A new request cancels the in-flight instance first
    Restart,

    /// FIFO queue of up to `max` waiting requests
    Queued,

    /// Up to `max` instances concurrently
    Parallel,
}

fn default_max() -> usize {
    10
}

fn default_enabled() -> bool {
    true
}

/// Automation as declared in a rule file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Unique id; generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, alias = "trigger")]
    pub triggers: Vec<Trigger>,

    #[serde(default, alias = "condition")]
    pub conditions: Vec<Condition>,

    #[serde(default, alias = "action")]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub mode: AdmissionMode,

    /// Bound for queued/parallel admission
    #[serde(default = "default_max")]
    pub max: usize,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// A compiled-at-least-once automation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,

    pub alias: Option<String>,

    pub description: Option<String>,

    pub triggers: Vec<Trigger>,

    pub conditions: Vec<Condition>,

    pub actions: Vec<Action>,

    pub mode: AdmissionMode,

    /// Bound for queued/parallel admission
    pub max: usize,

    pub enabled: bool,

    /// When the automation was first compiled
    pub created_at: DateTime<Utc>,

    /// Error from the most recent validation, if it failed
    pub last_error: Option<String>,
}

impl Automation {
    /// Create from a declared config, generating an id when absent
    pub fn from_config(config: AutomationConfig) -> Self {
        let id = config.id.unwrap_or_else(|| ulid::Ulid::new().to_string());
        info!(automation = %id, mode = ?config.mode, "registered automation");

        Self {
            id,
            alias: config.alias,
            description: config.description,
            triggers: config.triggers,
            conditions: config.conditions,
            actions: config.actions,
            mode: config.mode,
            max: config.max,
            enabled: config.enabled,
            created_at: Utc::now(),
            last_error: None,
        }
    }

    /// Alias when set, id otherwise
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }

    /// Record the outcome of a re-validation
    pub fn set_validation(&mut self, error: Option<String>) {
        self.last_error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AutomationConfig {
        serde_json::from_str(
            r#"{
                "id": "porch_light",
                "alias": "Porch light on motion",
                "mode": "queued",
                "max": 3,
                "triggers": [
                    {"trigger": "state", "entity_id": "binary_sensor.porch_motion", "to": "on"}
                ],
                "conditions": [
                    {"condition": "sun", "after": "sunset"}
                ],
                "actions": [
                    {"service": "light.turn_on", "target": {"entity_id": "light.porch"}}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_automation_from_config() {
        let automation = Automation::from_config(sample_config());
        assert_eq!(automation.id, "porch_light");
        assert_eq!(automation.mode, AdmissionMode::Queued);
        assert_eq!(automation.max, 3);
        assert_eq!(automation.triggers.len(), 1);
        assert_eq!(automation.conditions.len(), 1);
        assert_eq!(automation.actions.len(), 1);
        assert!(automation.last_error.is_none());
    }

    #[test]
    fn test_generated_id() {
        let config: AutomationConfig =
            serde_json::from_str(r#"{"alias": "anonymous", "triggers": [], "actions": []}"#)
                .unwrap();
        let automation = Automation::from_config(config);
        assert_eq!(automation.id.len(), 26);
        assert_eq!(automation.display_name(), "anonymous");
    }

    #[test]
    fn test_singular_aliases() {
        let config: AutomationConfig = serde_json::from_str(
            r#"{
                "trigger": [{"trigger": "sun", "event": "sunrise"}],
                "condition": [],
                "action": []
            }"#,
        )
        .unwrap();
        assert_eq!(config.triggers.len(), 1);
    }

    #[test]
    fn test_mode_defaults() {
        let config: AutomationConfig = serde_json::from_str(r#"{"triggers": []}"#).unwrap();
        assert_eq!(config.mode, AdmissionMode::Single);
        assert_eq!(config.max, 10);
        assert!(config.enabled);
    }

    #[test]
    fn test_validation_state() {
        let mut automation = Automation::from_config(sample_config());
        automation.set_validation(Some("minutes pattern out of range".to_string()));
        assert!(automation.last_error.is_some());
        automation.set_validation(None);
        assert!(automation.last_error.is_none());
    }
}
