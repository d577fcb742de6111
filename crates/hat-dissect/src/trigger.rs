//! Trigger dissection
//!
//! One function per trigger kind, all sharing the `(fragment, cursor)`
//! contract. Every entity discovered here has role Start and consumes a
//! trigger-section input slot.

use serde_json::Value;
use std::sync::OnceLock;
use tracing::trace;

use hat_core::{Cursor, Entity, ParameterRole};
use hat_rule::trigger::{
    format_duration, CalendarTrigger, DeviceTrigger, EventTrigger, GeoLocationTrigger,
    HomeassistantTrigger, MqttTrigger, NumericStateTrigger, PersistentNotificationTrigger,
    StateTrigger, SunTrigger, TagTrigger, TemplateTrigger, TimePatternTrigger, TimeSpec,
    TimeTrigger, WebhookTrigger, ZoneTrigger,
};
use hat_rule::{EntityIdSpec, NumericValue, StateMatch, Trigger};

use crate::error::{DissectError, DissectResult};
use crate::support::{
    as_entity_ref, group_scope, integration_of, push_input_entity, slugify, Expected,
};

const ROLE: ParameterRole = ParameterRole::Start;

/// Dissect a list of triggers, threading the cursor through each
pub fn dissect_triggers(
    triggers: &[Trigger],
    cursor: Cursor,
) -> DissectResult<(Vec<Entity>, Cursor)> {
    let mut entities = Vec::new();
    let mut cursor = cursor;
    for trigger in triggers {
        let (found, next) = dissect_trigger(trigger, cursor)?;
        entities.extend(found);
        cursor = next;
    }
    Ok((entities, cursor))
}

/// Dissect one trigger fragment.
///
/// Disabled fragments are no-ops: zero entities, cursor unchanged.
pub fn dissect_trigger(trigger: &Trigger, cursor: Cursor) -> DissectResult<(Vec<Entity>, Cursor)> {
    if !trigger.enabled() {
        trace!(platform = trigger.platform(), "skipping disabled trigger");
        return Ok((Vec::new(), cursor));
    }

    match trigger {
        Trigger::State(t) => Ok(dissect_state(t, cursor)),
        Trigger::NumericState(t) => Ok(dissect_numeric_state(t, cursor)),
        Trigger::Event(t) => Ok(dissect_event(t, cursor)),
        Trigger::Time(t) => Ok(dissect_time(t, cursor)),
        Trigger::TimePattern(t) => dissect_time_pattern(t, cursor),
        Trigger::Template(t) => Ok(dissect_template(t, cursor)),
        Trigger::Zone(t) => Ok(dissect_zone(t, cursor)),
        Trigger::GeoLocation(t) => Ok(dissect_geo_location(t, cursor)),
        Trigger::Sun(t) => Ok(dissect_sun(t, cursor)),
        Trigger::Homeassistant(t) => Ok(dissect_homeassistant(t, cursor)),
        Trigger::Mqtt(t) => Ok(dissect_mqtt(t, cursor)),
        Trigger::Webhook(t) => Ok(dissect_webhook(t, cursor)),
        Trigger::Device(t) => Ok(dissect_device(t, cursor)),
        Trigger::Calendar(t) => Ok(dissect_calendar(t, cursor)),
        Trigger::Tag(t) => Ok(dissect_tag(t, cursor)),
        Trigger::PersistentNotification(t) => Ok(dissect_persistent_notification(t, cursor)),
    }
}

fn state_match_value(m: &StateMatch) -> Value {
    match m {
        StateMatch::Single(s) => Value::String(s.clone()),
        StateMatch::List(list) => Value::Array(
            list.iter()
                .map(|s| Value::String(s.clone()))
                .collect(),
        ),
    }
}

fn entity_names(spec: &EntityIdSpec, attribute: Option<&str>) -> Vec<(String, String)> {
    spec.ids()
        .iter()
        .map(|raw| {
            let name = match (as_entity_ref(raw), attribute) {
                (Some(id), Some(attr)) => id.with_attribute(attr),
                _ => match attribute {
                    Some(attr) => format!("{}.{}", raw, attr),
                    None => raw.to_string(),
                },
            };
            (integration_of(raw), name)
        })
        .collect()
}

fn dissect_state(t: &StateTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let names = entity_names(&t.entity_id, t.attribute.as_deref());
    let mut entities = Vec::new();
    let mut inner = group_scope(cursor, names.len());

    // A single `to` value that parses as an entity id is a cross-entity
    // equality: the referenced entity joins the list as a reciprocal.
    let to_ref = match &t.to {
        Some(StateMatch::Single(s)) => as_entity_ref(s),
        _ => None,
    };
    // A multi-valued `to` list expands into one entity per value, under
    // a group position reserved for the value list itself.
    let value_list: Option<&[String]> = match &t.to {
        Some(StateMatch::List(values)) if values.len() > 1 => Some(values),
        _ => None,
    };

    for (integration, name) in &names {
        if let Some(values) = value_list {
            let (anchor, after) = inner.reserve();
            let mut scoped = after.under(anchor);
            for value in values {
                let expected = Expected::new()
                    .put_opt("from", t.from.as_ref().map(state_match_value))
                    .put("to", value.clone())
                    .put_opt("attribute", t.attribute.clone())
                    .put_opt("for", t.r#for.map(format_duration));
                scoped =
                    push_input_entity(&mut entities, scoped, ROLE, integration, name, expected);
            }
            inner = inner.rejoin(scoped);
            continue;
        }

        let expected = Expected::new()
            .put_opt("from", t.from.as_ref().map(state_match_value))
            .put_opt("to", t.to.as_ref().map(state_match_value))
            .put_opt("attribute", t.attribute.clone())
            .put_opt("for", t.r#for.map(format_duration));
        inner = push_input_entity(&mut entities, inner, ROLE, integration, name, expected);

        if let Some(other) = &to_ref {
            let mirrored = Expected::new().put("state", name.clone());
            inner = push_input_entity(
                &mut entities,
                inner,
                ROLE,
                other.domain(),
                &other.to_string(),
                mirrored,
            );
        }
    }

    (entities, cursor.rejoin(inner))
}

fn numeric_value(v: &NumericValue) -> Value {
    match v {
        NumericValue::Literal(n) => serde_json::to_value(n).unwrap_or(Value::Null),
        NumericValue::Entity(e) => Value::String(e.clone()),
    }
}

fn dissect_numeric_state(t: &NumericStateTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let names = entity_names(&t.entity_id, t.attribute.as_deref());
    let mut entities = Vec::new();
    let mut inner = group_scope(cursor, names.len());

    for (integration, name) in &names {
        let expected = Expected::new()
            .put_opt("above", t.above.as_ref().map(numeric_value))
            .put_opt("below", t.below.as_ref().map(numeric_value))
            .put_opt("attribute", t.attribute.clone())
            .put_opt("for", t.r#for.map(format_duration));
        inner = push_input_entity(&mut entities, inner, ROLE, integration, name, expected);

        // Threshold given as a live entity: emit the reciprocal, mirrored
        // (above on one implies below on the other).
        for (threshold, mirror_key) in [(&t.above, "below"), (&t.below, "above")] {
            if let Some(NumericValue::Entity(raw)) = threshold {
                if let Some(other) = as_entity_ref(raw) {
                    let mirrored = Expected::new().put(mirror_key, name.clone());
                    inner = push_input_entity(
                        &mut entities,
                        inner,
                        ROLE,
                        other.domain(),
                        &other.to_string(),
                        mirrored,
                    );
                }
            }
        }
    }

    (entities, cursor.rejoin(inner))
}

fn dissect_event(t: &EventTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let name = format!("event.{}", slugify(&t.event_type));
    let expected = Expected::new()
        .put("event_type", t.event_type.clone())
        .put_opt("event_data", t.event_data.clone());
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, ROLE, "event", &name, expected);
    (entities, cursor)
}

fn dissect_time(t: &TimeTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let at = match &t.at {
        TimeSpec::Fixed(time) => Value::String(time.format("%H:%M:%S").to_string()),
        TimeSpec::Entity(entity) => Value::String(entity.clone()),
    };
    let expected = Expected::new().put("at", at);
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, ROLE, "time", "time.time", expected);
    (entities, cursor)
}

fn time_pattern_regex() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^(?:\*|/(\d+)|(\d+))$").expect("valid regex"))
}

fn check_pattern_field(
    field: &'static str,
    value: Option<&String>,
    bound: u64,
) -> DissectResult<()> {
    let Some(value) = value else { return Ok(()) };
    let invalid = || DissectError::InvalidTimePattern {
        field,
        value: value.clone(),
    };

    let captures = time_pattern_regex().captures(value).ok_or_else(invalid)?;
    if let Some(step) = captures.get(1) {
        let step: u64 = step.as_str().parse().map_err(|_| invalid())?;
        if step == 0 {
            return Err(invalid());
        }
    } else if let Some(fixed) = captures.get(2) {
        let fixed: u64 = fixed.as_str().parse().map_err(|_| invalid())?;
        if fixed >= bound {
            return Err(invalid());
        }
    }
    Ok(())
}

fn dissect_time_pattern(
    t: &TimePatternTrigger,
    cursor: Cursor,
) -> DissectResult<(Vec<Entity>, Cursor)> {
    // The one hard validation failure in dissection: an inconsistent
    // pattern would compile into a predicate that can never be satisfied.
    check_pattern_field("hours", t.hours.as_ref(), 24)?;
    check_pattern_field("minutes", t.minutes.as_ref(), 60)?;
    check_pattern_field("seconds", t.seconds.as_ref(), 60)?;

    let expected = Expected::new()
        .put_opt("hours", t.hours.clone())
        .put_opt("minutes", t.minutes.clone())
        .put_opt("seconds", t.seconds.clone());
    let mut entities = Vec::new();
    let cursor = push_input_entity(
        &mut entities,
        cursor,
        ROLE,
        "time_pattern",
        "time_pattern.time_pattern",
        expected,
    );
    Ok((entities, cursor))
}

fn dissect_template(t: &TemplateTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    // The template itself cannot be evaluated without a live runtime; the
    // entity's runtime input is the template's already-evaluated truth.
    let expected = Expected::new()
        .put("value_template", t.value_template.clone())
        .put_opt("for", t.r#for.map(format_duration));
    let mut entities = Vec::new();
    let cursor = push_input_entity(
        &mut entities,
        cursor,
        ROLE,
        "template",
        "template.template",
        expected,
    );
    (entities, cursor)
}

fn dissect_zone(t: &ZoneTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let names = entity_names(&t.entity_id, None);
    let mut entities = Vec::new();
    let mut inner = group_scope(cursor, names.len());

    for (integration, name) in &names {
        let expected = Expected::new()
            .put("zone", t.zone.clone())
            .put("event", zone_event_value(t.event));
        inner = push_input_entity(&mut entities, inner, ROLE, integration, name, expected);
    }

    (entities, cursor.rejoin(inner))
}

fn zone_event_value(event: hat_rule::trigger::ZoneEvent) -> Value {
    serde_json::to_value(event).unwrap_or(Value::Null)
}

fn dissect_geo_location(t: &GeoLocationTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let name = format!("geo_location.{}", slugify(&t.source));
    let expected = Expected::new()
        .put("source", t.source.clone())
        .put("zone", t.zone.clone())
        .put("event", zone_event_value(t.event));
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, ROLE, "geo_location", &name, expected);
    (entities, cursor)
}

fn dissect_sun(t: &SunTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let expected = Expected::new()
        .put(
            "event",
            serde_json::to_value(t.event).unwrap_or(Value::Null),
        )
        .put_opt("offset", t.offset.map(format_duration));
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, ROLE, "sun", "sun.sun", expected);
    (entities, cursor)
}

fn dissect_homeassistant(t: &HomeassistantTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let expected = Expected::new().put(
        "event",
        serde_json::to_value(t.event).unwrap_or(Value::Null),
    );
    let mut entities = Vec::new();
    let cursor = push_input_entity(
        &mut entities,
        cursor,
        ROLE,
        "homeassistant",
        "homeassistant.homeassistant",
        expected,
    );
    (entities, cursor)
}

fn dissect_mqtt(t: &MqttTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let name = format!("mqtt.{}", slugify(&t.topic));
    let expected = Expected::new()
        .put("topic", t.topic.clone())
        .put_opt("payload", t.payload.clone());
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, ROLE, "mqtt", &name, expected);
    (entities, cursor)
}

fn dissect_webhook(t: &WebhookTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let name = format!("webhook.{}", slugify(&t.webhook_id));
    let methods = if t.allowed_methods.is_empty() {
        None
    } else {
        Some(Value::Array(
            t.allowed_methods
                .iter()
                .map(|m| Value::String(m.clone()))
                .collect(),
        ))
    };
    let expected = Expected::new()
        .put("webhook_id", t.webhook_id.clone())
        .put_opt("allowed_methods", methods);
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, ROLE, "webhook", &name, expected);
    (entities, cursor)
}

fn dissect_device(t: &DeviceTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    // Device-bound triggers synthesize <domain>.<device_id>.
    let name = format!("{}.{}", t.domain, slugify(&t.device_id));
    let mut expected = Expected::new()
        .put("device_id", t.device_id.clone())
        .put("type", t.r#type.clone());
    for (key, value) in &t.data {
        expected = expected.put(key, value.clone());
    }
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, ROLE, &t.domain, &name, expected);
    (entities, cursor)
}

fn dissect_calendar(t: &CalendarTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let expected = Expected::new()
        .put(
            "event",
            serde_json::to_value(t.event).unwrap_or(Value::Null),
        )
        .put_opt("offset", t.offset.map(format_duration));
    let mut entities = Vec::new();
    let cursor = push_input_entity(
        &mut entities,
        cursor,
        ROLE,
        &integration_of(&t.entity_id),
        &t.entity_id,
        expected,
    );
    (entities, cursor)
}

fn dissect_tag(t: &TagTrigger, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let name = format!("tag.{}", slugify(&t.tag_id));
    let expected = Expected::new()
        .put("tag_id", t.tag_id.clone())
        .put_opt("device_id", t.device_id.clone());
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, ROLE, "tag", &name, expected);
    (entities, cursor)
}

fn dissect_persistent_notification(
    t: &PersistentNotificationTrigger,
    cursor: Cursor,
) -> (Vec<Entity>, Cursor) {
    let update_types = if t.update_type.is_empty() {
        None
    } else {
        Some(Value::Array(
            t.update_type
                .iter()
                .map(|u| Value::String(u.clone()))
                .collect(),
        ))
    };
    let expected = Expected::new()
        .put_opt("update_type", update_types)
        .put_opt("notification_id", t.notification_id.clone());
    let mut entities = Vec::new();
    let cursor = push_input_entity(
        &mut entities,
        cursor,
        ROLE,
        "persistent_notification",
        "persistent_notification.persistent_notification",
        expected,
    );
    (entities, cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trigger(raw: serde_json::Value) -> Trigger {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_numeric_state_single_entity() {
        // Scenario: {above: 20, below: 30} on one entity at position 1.
        let t = trigger(json!({
            "trigger": "numeric_state",
            "entity_id": "sensor.temperature",
            "above": 20,
            "below": 30
        }));

        let (entities, end) = dissect_trigger(&t, Cursor::start()).unwrap();
        assert_eq!(entities.len(), 1);
        let entity = &entities[0];
        assert_eq!(entity.position, 1);
        assert_eq!(entity.parent, None);
        assert_eq!(entity.role, ParameterRole::Start);
        assert_eq!(entity.entity_name, "sensor.temperature");
        let expected = entity.expected_value.as_ref().unwrap();
        assert_eq!(expected.get("above"), Some(&json!(20.0)));
        assert_eq!(expected.get("below"), Some(&json!(30.0)));
        assert_eq!(end.position, 2);
        assert_eq!(end.real_position, 1);
    }

    #[test]
    fn test_multi_entity_group() {
        let t = trigger(json!({
            "trigger": "state",
            "entity_id": ["light.one", "light.two"],
            "to": "on"
        }));

        let (entities, end) = dissect_trigger(&t, Cursor::start()).unwrap();
        // Position 1 is the group anchor; no entity is emitted for it.
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].position, 2);
        assert_eq!(entities[0].parent, Some(1));
        assert_eq!(entities[1].position, 3);
        assert_eq!(entities[1].parent, Some(1));
        assert_eq!(end.position, 4);
        assert_eq!(end.real_position, 2);
        assert_eq!(end.parent, None);
    }

    #[test]
    fn test_single_entity_skips_group() {
        let t = trigger(json!({
            "trigger": "state",
            "entity_id": "light.solo",
            "to": "on"
        }));

        let (entities, _) = dissect_trigger(&t, Cursor::start()).unwrap();
        assert_eq!(entities[0].position, 1);
        assert_eq!(entities[0].parent, None);
    }

    #[test]
    fn test_value_list_expands_per_value() {
        let t = trigger(json!({
            "trigger": "state",
            "entity_id": "light.a",
            "to": ["on", "off"]
        }));

        let (entities, end) = dissect_trigger(&t, Cursor::start()).unwrap();
        // Position 1 anchors the value list; one entity per value.
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].position, 2);
        assert_eq!(entities[0].parent, Some(1));
        assert_eq!(entities[1].parent, Some(1));
        assert_eq!(
            entities[0].expected_value.as_ref().unwrap().get("to"),
            Some(&json!("on"))
        );
        assert_eq!(
            entities[1].expected_value.as_ref().unwrap().get("to"),
            Some(&json!("off"))
        );
        assert_eq!(end.real_position, 2);

        // A one-element list short-circuits: no anchor, one entity.
        let single = trigger(json!({
            "trigger": "state",
            "entity_id": "light.a",
            "to": ["on"]
        }));
        let (entities, _) = dissect_trigger(&single, Cursor::start()).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].position, 1);
        assert_eq!(entities[0].parent, None);
    }

    #[test]
    fn test_cross_entity_threshold_reciprocity() {
        let t = trigger(json!({
            "trigger": "numeric_state",
            "entity_id": "sensor.indoor",
            "above": "sensor.outdoor"
        }));

        let (entities, end) = dissect_trigger(&t, Cursor::start()).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].parent, entities[1].parent);

        let primary = entities[0].expected_value.as_ref().unwrap();
        assert_eq!(primary.get("above"), Some(&json!("sensor.outdoor")));

        let reciprocal = entities[1].expected_value.as_ref().unwrap();
        assert_eq!(reciprocal.get("below"), Some(&json!("sensor.indoor")));

        // Both consume their own input slot.
        assert_eq!(end.real_position, 2);
    }

    #[test]
    fn test_state_equality_reciprocity() {
        let t = trigger(json!({
            "trigger": "state",
            "entity_id": "sensor.mode_a",
            "to": "sensor.mode_b"
        }));

        let (entities, _) = dissect_trigger(&t, Cursor::start()).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].entity_name, "sensor.mode_b");
        let mirrored = entities[1].expected_value.as_ref().unwrap();
        assert_eq!(mirrored.get("state"), Some(&json!("sensor.mode_a")));
    }

    #[test]
    fn test_disabled_trigger_is_noop() {
        let t = trigger(json!({
            "trigger": "sun",
            "event": "sunrise",
            "enabled": false
        }));

        let start = Cursor::start();
        let (entities, end) = dissect_trigger(&t, start).unwrap();
        assert!(entities.is_empty());
        assert_eq!(end, start);
    }

    #[test]
    fn test_attribute_scoped_name() {
        let t = trigger(json!({
            "trigger": "numeric_state",
            "entity_id": "climate.bedroom",
            "attribute": "temperature",
            "below": 16
        }));

        let (entities, _) = dissect_trigger(&t, Cursor::start()).unwrap();
        assert_eq!(entities[0].entity_name, "climate.bedroom.temperature");
        assert_eq!(entities[0].integration, "climate");
    }

    #[test]
    fn test_time_pattern_validation() {
        let good = trigger(json!({"trigger": "time_pattern", "minutes": "/5"}));
        assert!(dissect_trigger(&good, Cursor::start()).is_ok());

        let bad_step = trigger(json!({"trigger": "time_pattern", "minutes": "/0"}));
        assert_eq!(
            dissect_trigger(&bad_step, Cursor::start()).unwrap_err(),
            DissectError::InvalidTimePattern {
                field: "minutes",
                value: "/0".to_string()
            }
        );

        let out_of_range = trigger(json!({"trigger": "time_pattern", "hours": "24"}));
        assert!(dissect_trigger(&out_of_range, Cursor::start()).is_err());

        let garbage = trigger(json!({"trigger": "time_pattern", "seconds": "every"}));
        assert!(dissect_trigger(&garbage, Cursor::start()).is_err());
    }

    #[test]
    fn test_synthesized_names() {
        let cases = [
            (
                json!({"trigger": "mqtt", "topic": "home/garden/soil"}),
                "mqtt.home_garden_soil",
            ),
            (
                json!({"trigger": "webhook", "webhook_id": "rain-started"}),
                "webhook.rain_started",
            ),
            (
                json!({"trigger": "device", "device_id": "ab12", "domain": "zha", "type": "remote_button_short_press"}),
                "zha.ab12",
            ),
            (json!({"trigger": "sun", "event": "sunset"}), "sun.sun"),
            (
                json!({"trigger": "tag", "tag_id": "Front Door"}),
                "tag.front_door",
            ),
        ];

        for (raw, want) in cases {
            let (entities, _) = dissect_trigger(&trigger(raw), Cursor::start()).unwrap();
            assert_eq!(entities[0].entity_name, want);
        }
    }

    #[test]
    fn test_trigger_list_threads_cursor() {
        let triggers: Vec<Trigger> = vec![
            trigger(json!({"trigger": "state", "entity_id": "light.a", "to": "on"})),
            trigger(json!({"trigger": "sun", "event": "sunset"})),
        ];

        let (entities, end) = dissect_triggers(&triggers, Cursor::start()).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].position, 1);
        assert_eq!(entities[1].position, 2);
        assert_eq!(end.real_position, 2);
    }
}
