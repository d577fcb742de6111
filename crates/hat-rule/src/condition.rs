//! Condition fragments
//!
//! Conditions are the state tests of a rule. and/or/not are recursive
//! combinators, not leaves; the dissector reserves a structural position
//! for each of them.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::trigger::{option_duration_serde, EntityIdSpec, NumericValue, StateMatch, SunEvent};

fn default_enabled() -> bool {
    true
}

/// Condition fragment, dispatched by its `condition:` kind tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// Entity state equality
    State(StateCondition),

    /// Numeric thresholds
    NumericState(NumericStateCondition),

    /// Time-of-day / weekday window
    Time(TimeCondition),

    /// Sun position
    Sun(SunCondition),

    /// Zone membership
    Zone(ZoneCondition),

    /// Template truth
    Template(TemplateCondition),

    /// Which trigger fired
    Trigger(TriggerCondition),

    /// All children must pass
    And(LogicCondition),

    /// Any child must pass
    Or(LogicCondition),

    /// No child may pass
    Not(LogicCondition),
}

impl Condition {
    /// Whether the fragment is enabled; disabled fragments dissect to nothing
    pub fn enabled(&self) -> bool {
        match self {
            Condition::State(c) => c.enabled,
            Condition::NumericState(c) => c.enabled,
            Condition::Time(c) => c.enabled,
            Condition::Sun(c) => c.enabled,
            Condition::Zone(c) => c.enabled,
            Condition::Template(c) => c.enabled,
            Condition::Trigger(c) => c.enabled,
            Condition::And(c) | Condition::Or(c) | Condition::Not(c) => c.enabled,
        }
    }

    /// Combinator constructor, mostly for tests and fixtures
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(LogicCondition {
            conditions,
            enabled: true,
        })
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or(LogicCondition {
            conditions,
            enabled: true,
        })
    }

    pub fn not(conditions: Vec<Condition>) -> Self {
        Condition::Not(LogicCondition {
            conditions,
            enabled: true,
        })
    }
}

/// State equality condition
///
/// A match value that parses as an entity id is a cross-entity equality
/// check, not a literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateCondition {
    pub entity_id: EntityIdSpec,

    pub state: StateMatch,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Duration the state must have been held
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub r#for: Option<Duration>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Numeric threshold condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericStateCondition {
    pub entity_id: EntityIdSpec,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<NumericValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<NumericValue>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Time window condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<NaiveTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<NaiveTime>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekday: Vec<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Sun position condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SunCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<SunEvent>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub after_offset: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<SunEvent>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub before_offset: Option<Duration>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Zone membership condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneCondition {
    pub entity_id: EntityIdSpec,

    pub zone: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Template condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateCondition {
    pub value_template: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Did-trigger-X-fire condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub id: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Shared shape of the and/or/not combinators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicCondition {
    pub conditions: Vec<Condition>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}
