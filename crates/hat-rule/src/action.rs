//! Action fragments
//!
//! Actions are the tasks a rule executes once triggered. Branch and loop
//! constructs (if/choose/repeat) nest conditions and further actions;
//! the dissector reserves a structural position for each of them.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::condition::Condition;
use crate::trigger::parse_duration;

fn default_enabled() -> bool {
    true
}

/// Deserialize a field that can be a single string or a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) => Ok(vec![s]),
        StringOrVec::Vec(v) => Ok(v),
    }
}

/// Target of a service call: entities, devices, areas
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Target {
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "string_or_vec"
    )]
    pub entity_id: Vec<String>,

    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "string_or_vec"
    )]
    pub device_id: Vec<String>,

    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "string_or_vec"
    )]
    pub area_id: Vec<String>,
}

impl Target {
    pub fn is_empty(&self) -> bool {
        self.entity_id.is_empty() && self.device_id.is_empty() && self.area_id.is_empty()
    }
}

/// Action fragment, dispatched by shape
///
/// Untagged: variant order matters, the flattened condition shape must
/// come last because it matches most broadly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    /// if/then/else branch
    If(IfAction),

    /// First-matching-option branch
    Choose(ChooseAction),

    /// count/while/until loop
    Repeat(RepeatAction),

    /// Concurrent branches
    Parallel(ParallelAction),

    /// Explicit nested sequence
    Sequence(SequenceAction),

    /// Service call
    Service(ServiceAction),

    /// Fixed wait
    Delay(DelayAction),

    /// Fire an event
    Event(EventAction),

    /// Stop the sequence
    Stop(StopAction),

    /// Mid-sequence condition check
    Condition(Condition),
}

impl Action {
    /// Whether the fragment is enabled; disabled fragments dissect to nothing
    pub fn enabled(&self) -> bool {
        match self {
            Action::If(a) => a.enabled,
            Action::Choose(a) => a.enabled,
            Action::Repeat(a) => a.enabled,
            Action::Parallel(a) => a.enabled,
            Action::Sequence(a) => a.enabled,
            Action::Service(a) => a.enabled,
            Action::Delay(a) => a.enabled,
            Action::Event(a) => a.enabled,
            Action::Stop(a) => a.enabled,
            Action::Condition(c) => c.enabled(),
        }
    }
}

/// Service call action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// "domain.service", e.g. "light.turn_on"
    pub service: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ServiceAction {
    /// The domain part of the service name, when well-formed
    pub fn domain(&self) -> Option<&str> {
        self.service.split_once('.').map(|(domain, _)| domain)
    }
}

/// Delay action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub delay: DelaySpec,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Delay given as HH:MM:SS text or as split components
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelaySpec {
    Text(String),
    Components {
        #[serde(default)]
        hours: u64,
        #[serde(default)]
        minutes: u64,
        #[serde(default)]
        seconds: u64,
        #[serde(default)]
        milliseconds: u64,
    },
}

impl DelaySpec {
    /// The concrete duration, when the declaration is well-formed
    pub fn to_duration(&self) -> Option<Duration> {
        match self {
            DelaySpec::Text(s) => parse_duration(s).ok(),
            DelaySpec::Components {
                hours,
                minutes,
                seconds,
                milliseconds,
            } => Some(Duration::from_millis(
                hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + milliseconds,
            )),
        }
    }
}

/// Event action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub event: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub event_data: HashMap<String, serde_json::Value>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Stop action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Stop reason
    pub stop: String,

    /// Whether stopping counts as an error
    #[serde(default)]
    pub error: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// if/then/else action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub r#if: Vec<Condition>,

    pub then: Vec<Action>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub r#else: Vec<Action>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// choose/default action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub choose: Vec<ChooseOption>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default: Vec<Action>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// One guarded branch of a choose action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseOption {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    pub sequence: Vec<Action>,
}

/// repeat action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub repeat: RepeatConfig,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Loop discipline of a repeat action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepeatConfig {
    /// Fixed iteration count
    Count { count: u64, sequence: Vec<Action> },

    /// Loop while the conditions hold
    While {
        r#while: Vec<Condition>,
        sequence: Vec<Action>,
    },

    /// Loop until the conditions hold
    Until {
        until: Vec<Condition>,
        sequence: Vec<Action>,
    },
}

/// Explicit nested sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub sequence: Vec<Action>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Concurrent branches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub parallel: Vec<Action>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}
