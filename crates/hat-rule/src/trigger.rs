//! Trigger fragments
//!
//! Triggers are the event detectors of a rule. The dissector turns each
//! one into the Start-role entities the compiled artifact reads its
//! trigger-section inputs for.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_enabled() -> bool {
    true
}

/// Trigger fragment, dispatched by its `trigger:` kind tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    /// Entity state change
    State(StateTrigger),

    /// Numeric value crossing a threshold
    NumericState(NumericStateTrigger),

    /// Any event with optional data matching
    Event(EventTrigger),

    /// Fixed time of day
    Time(TimeTrigger),

    /// Cron-like time pattern
    TimePattern(TimePatternTrigger),

    /// Template turning true
    Template(TemplateTrigger),

    /// Entity entering/leaving a zone
    Zone(ZoneTrigger),

    /// Geolocation source entering/leaving a zone
    GeoLocation(GeoLocationTrigger),

    /// Sunrise/sunset
    Sun(SunTrigger),

    /// Runtime start/shutdown
    Homeassistant(HomeassistantTrigger),

    /// MQTT message on a topic
    Mqtt(MqttTrigger),

    /// Incoming webhook
    Webhook(WebhookTrigger),

    /// Device-bound trigger (integration-specific)
    Device(DeviceTrigger),

    /// Calendar event start/end
    Calendar(CalendarTrigger),

    /// Tag scan
    Tag(TagTrigger),

    /// Persistent notification added/removed
    PersistentNotification(PersistentNotificationTrigger),
}

impl Trigger {
    /// The declared trigger id, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Trigger::State(t) => t.id.as_deref(),
            Trigger::NumericState(t) => t.id.as_deref(),
            Trigger::Event(t) => t.id.as_deref(),
            Trigger::Time(t) => t.id.as_deref(),
            Trigger::TimePattern(t) => t.id.as_deref(),
            Trigger::Template(t) => t.id.as_deref(),
            Trigger::Zone(t) => t.id.as_deref(),
            Trigger::GeoLocation(t) => t.id.as_deref(),
            Trigger::Sun(t) => t.id.as_deref(),
            Trigger::Homeassistant(t) => t.id.as_deref(),
            Trigger::Mqtt(t) => t.id.as_deref(),
            Trigger::Webhook(t) => t.id.as_deref(),
            Trigger::Device(t) => t.id.as_deref(),
            Trigger::Calendar(t) => t.id.as_deref(),
            Trigger::Tag(t) => t.id.as_deref(),
            Trigger::PersistentNotification(t) => t.id.as_deref(),
        }
    }

    /// Whether the fragment is enabled; disabled fragments dissect to nothing
    pub fn enabled(&self) -> bool {
        match self {
            Trigger::State(t) => t.enabled,
            Trigger::NumericState(t) => t.enabled,
            Trigger::Event(t) => t.enabled,
            Trigger::Time(t) => t.enabled,
            Trigger::TimePattern(t) => t.enabled,
            Trigger::Template(t) => t.enabled,
            Trigger::Zone(t) => t.enabled,
            Trigger::GeoLocation(t) => t.enabled,
            Trigger::Sun(t) => t.enabled,
            Trigger::Homeassistant(t) => t.enabled,
            Trigger::Mqtt(t) => t.enabled,
            Trigger::Webhook(t) => t.enabled,
            Trigger::Device(t) => t.enabled,
            Trigger::Calendar(t) => t.enabled,
            Trigger::Tag(t) => t.enabled,
            Trigger::PersistentNotification(t) => t.enabled,
        }
    }

    /// The trigger platform name
    pub fn platform(&self) -> &'static str {
        match self {
            Trigger::State(_) => "state",
            Trigger::NumericState(_) => "numeric_state",
            Trigger::Event(_) => "event",
            Trigger::Time(_) => "time",
            Trigger::TimePattern(_) => "time_pattern",
            Trigger::Template(_) => "template",
            Trigger::Zone(_) => "zone",
            Trigger::GeoLocation(_) => "geo_location",
            Trigger::Sun(_) => "sun",
            Trigger::Homeassistant(_) => "homeassistant",
            Trigger::Mqtt(_) => "mqtt",
            Trigger::Webhook(_) => "webhook",
            Trigger::Device(_) => "device",
            Trigger::Calendar(_) => "calendar",
            Trigger::Tag(_) => "tag",
            Trigger::PersistentNotification(_) => "persistent_notification",
        }
    }
}

/// State change trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Entities to monitor (single or list)
    pub entity_id: EntityIdSpec,

    /// Previous state to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<StateMatch>,

    /// New state to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<StateMatch>,

    /// Attribute to monitor instead of the state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Duration the state must be held
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub r#for: Option<Duration>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Numeric threshold trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericStateTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub entity_id: EntityIdSpec,

    /// Attribute to monitor (state if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Fire when the value rises above this (literal or entity reference)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<NumericValue>,

    /// Fire when the value falls below this (literal or entity reference)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<NumericValue>,

    /// Duration the value must be held
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub r#for: Option<Duration>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Event trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub event_type: String,

    /// Optional event data to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<serde_json::Value>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Fixed time trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Time to fire at (HH:MM:SS or a datetime entity)
    pub at: TimeSpec,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Time pattern trigger, e.g. minutes: "/5"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimePatternTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Hours pattern (0-23, * or /N)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,

    /// Minutes pattern (0-59, * or /N)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<String>,

    /// Seconds pattern (0-59, * or /N)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Template trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Template that fires on turning true
    pub value_template: String,

    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub r#for: Option<Duration>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Zone enter/leave trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Person or device tracker entities
    pub entity_id: EntityIdSpec,

    /// Zone entity
    pub zone: String,

    pub event: ZoneEvent,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Geolocation source enter/leave trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoLocationTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Geolocation source attribute value
    pub source: String,

    pub zone: String,

    pub event: ZoneEvent,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Sunrise/sunset trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SunTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub event: SunEvent,

    /// Offset from the event, e.g. "-00:30:00"
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub offset: Option<Duration>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Runtime lifecycle trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeassistantTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub event: HassEvent,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// MQTT topic trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub topic: String,

    /// Optional exact payload to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Webhook trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub webhook_id: String,

    #[serde(default)]
    pub allowed_methods: Vec<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Device trigger (integration-specific shape behind fixed keys)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub device_id: String,

    /// Integration domain owning the device
    pub domain: String,

    /// Trigger type within the integration
    pub r#type: String,

    /// Remaining integration-specific fields
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Calendar event trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub entity_id: String,

    pub event: CalendarEvent,

    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub offset: Option<Duration>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Tag scan trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub tag_id: String,

    /// Restrict to scans from this device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Persistent notification trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentNotificationTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// added / removed / updated
    #[serde(default)]
    pub update_type: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// --- Supporting types ---

/// Entity reference field that accepts a single id or a list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityIdSpec {
    Single(String),
    List(Vec<String>),
}

impl EntityIdSpec {
    /// All referenced ids, in declaration order
    pub fn ids(&self) -> Vec<&str> {
        match self {
            EntityIdSpec::Single(id) => vec![id.as_str()],
            EntityIdSpec::List(ids) => ids.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// State match that accepts a single value or a list of alternatives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateMatch {
    Single(String),
    List(Vec<String>),
}

impl StateMatch {
    /// All accepted values, in declaration order
    pub fn values(&self) -> Vec<&str> {
        match self {
            StateMatch::Single(s) => vec![s.as_str()],
            StateMatch::List(list) => list.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// Time field: a fixed HH:MM:SS or a datetime entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    Fixed(NaiveTime),
    Entity(String),
}

/// Threshold field: a literal number or an entity reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Literal(f64),
    Entity(String),
}

/// Zone event direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneEvent {
    Enter,
    Leave,
}

/// Sun event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

/// Runtime lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HassEvent {
    Start,
    Shutdown,
}

/// Calendar event edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEvent {
    Start,
    End,
}

// --- Duration serde helpers ---

pub(crate) mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_str(&super::format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            None => Ok(None),
            Some(s) => super::parse_duration(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Format a duration as HH:MM:SS
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Parse HH:MM:SS, MM:SS or plain-seconds durations
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let parse =
        |p: &str, what: &str| p.parse::<u64>().map_err(|_| format!("invalid {}", what));
    match parts.len() {
        1 => Ok(Duration::from_secs(parse(parts[0], "seconds")?)),
        2 => Ok(Duration::from_secs(
            parse(parts[0], "minutes")? * 60 + parse(parts[1], "seconds")?,
        )),
        3 => Ok(Duration::from_secs(
            parse(parts[0], "hours")? * 3600
                + parse(parts[1], "minutes")? * 60
                + parse(parts[2], "seconds")?,
        )),
        _ => Err("invalid duration format".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_trigger_deserialize() {
        let json = r#"{
            "trigger": "state",
            "entity_id": "binary_sensor.motion",
            "to": "on",
            "for": "00:01:00"
        }"#;

        let trigger: Trigger = serde_json::from_str(json).unwrap();
        assert_eq!(trigger.platform(), "state");
        assert!(trigger.enabled());
        if let Trigger::State(t) = trigger {
            assert_eq!(t.r#for, Some(Duration::from_secs(60)));
        } else {
            panic!("expected state trigger");
        }
    }

    #[test]
    fn test_numeric_state_entity_reference() {
        let json = r#"{
            "trigger": "numeric_state",
            "entity_id": "sensor.indoor_temp",
            "above": "sensor.outdoor_temp"
        }"#;

        let trigger: Trigger = serde_json::from_str(json).unwrap();
        if let Trigger::NumericState(t) = trigger {
            assert_eq!(
                t.above,
                Some(NumericValue::Entity("sensor.outdoor_temp".to_string()))
            );
        } else {
            panic!("expected numeric_state trigger");
        }
    }

    #[test]
    fn test_disabled_trigger() {
        let json = r#"{
            "trigger": "sun",
            "event": "sunset",
            "enabled": false
        }"#;

        let trigger: Trigger = serde_json::from_str(json).unwrap();
        assert!(!trigger.enabled());
    }

    #[test]
    fn test_device_trigger_extra_data() {
        let json = r#"{
            "trigger": "device",
            "device_id": "abc123",
            "domain": "zha",
            "type": "remote_button_short_press",
            "subtype": "turn_on"
        }"#;

        let trigger: Trigger = serde_json::from_str(json).unwrap();
        if let Trigger::Device(t) = trigger {
            assert_eq!(t.domain, "zha");
            assert_eq!(t.data.get("subtype").unwrap(), "turn_on");
        } else {
            panic!("expected device trigger");
        }
    }

    #[test]
    fn test_entity_id_spec() {
        let single: EntityIdSpec = serde_json::from_str(r#""light.test""#).unwrap();
        assert_eq!(single.ids(), vec!["light.test"]);

        let list: EntityIdSpec = serde_json::from_str(r#"["light.one", "light.two"]"#).unwrap();
        assert_eq!(list.ids(), vec!["light.one", "light.two"]);
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("05:30").unwrap(), Duration::from_secs(330));
        assert_eq!(parse_duration("01:00:00").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("1:2:3:4").is_err());
        assert_eq!(format_duration(Duration::from_secs(3690)), "01:01:30");
    }

    #[test]
    fn test_mqtt_and_tag_triggers() {
        let mqtt: Trigger = serde_json::from_str(
            r#"{"trigger": "mqtt", "topic": "home/garden/moisture"}"#,
        )
        .unwrap();
        assert_eq!(mqtt.platform(), "mqtt");

        let tag: Trigger =
            serde_json::from_str(r#"{"trigger": "tag", "tag_id": "front_door_nfc"}"#).unwrap();
        assert_eq!(tag.platform(), "tag");
    }
}
