//! Condition dissection
//!
//! Leaf conditions emit Input-role entities (ActionInput when the
//! condition sits inside an action branch or loop body). The and/or/not
//! combinators are structural: each reserves one position as the parent
//! anchor of its children and emits no entity of its own.

use serde_json::Value;
use tracing::trace;

use hat_core::{Cursor, Entity, ParameterRole};
use hat_rule::condition::{
    LogicCondition, NumericStateCondition, StateCondition, SunCondition, TemplateCondition,
    TimeCondition, TriggerCondition, ZoneCondition,
};
use hat_rule::trigger::format_duration;
use hat_rule::{Condition, NumericValue, StateMatch};

use crate::error::DissectResult;
use crate::support::{
    as_entity_ref, group_scope, integration_of, push_input_entity, slugify, Expected,
};

/// Dissect a list of conditions, threading the cursor through each
pub fn dissect_conditions(
    conditions: &[Condition],
    role: ParameterRole,
    cursor: Cursor,
) -> DissectResult<(Vec<Entity>, Cursor)> {
    let mut entities = Vec::new();
    let mut cursor = cursor;
    for condition in conditions {
        let (found, next) = dissect_condition(condition, role, cursor)?;
        entities.extend(found);
        cursor = next;
    }
    Ok((entities, cursor))
}

/// Dissect one condition fragment.
///
/// `role` is Input on the condition path and ActionInput inside action
/// branch/loop bodies. Disabled fragments are no-ops.
pub fn dissect_condition(
    condition: &Condition,
    role: ParameterRole,
    cursor: Cursor,
) -> DissectResult<(Vec<Entity>, Cursor)> {
    if !condition.enabled() {
        trace!("skipping disabled condition");
        return Ok((Vec::new(), cursor));
    }

    match condition {
        Condition::And(c) | Condition::Or(c) | Condition::Not(c) => {
            dissect_combinator(c, role, cursor)
        }
        Condition::State(c) => Ok(dissect_state(c, role, cursor)),
        Condition::NumericState(c) => Ok(dissect_numeric_state(c, role, cursor)),
        Condition::Time(c) => Ok(dissect_time(c, role, cursor)),
        Condition::Sun(c) => Ok(dissect_sun(c, role, cursor)),
        Condition::Zone(c) => Ok(dissect_zone(c, role, cursor)),
        Condition::Template(c) => Ok(dissect_template(c, role, cursor)),
        Condition::Trigger(c) => Ok(dissect_trigger_condition(c, role, cursor)),
    }
}

fn dissect_combinator(
    combinator: &LogicCondition,
    role: ParameterRole,
    cursor: Cursor,
) -> DissectResult<(Vec<Entity>, Cursor)> {
    // The combinator reserves a position for itself but never appears as
    // an entity; its children carry it as their parent.
    let (anchor, after) = cursor.reserve();
    let (entities, inner) =
        dissect_conditions(&combinator.conditions, role, after.under(anchor))?;
    Ok((entities, cursor.rejoin(inner)))
}

fn condition_entity_names(ids: Vec<&str>, attribute: Option<&str>) -> Vec<(String, String)> {
    ids.iter()
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

fn dissect_state(c: &StateCondition, role: ParameterRole, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let names = condition_entity_names(c.entity_id.ids(), c.attribute.as_deref());
    let mut entities = Vec::new();
    let mut inner = group_scope(cursor, names.len());

    // A single match value that parses as an entity id is a cross-entity
    // state equality; the referenced entity is emitted as its reciprocal.
    let state_ref = match &c.state {
        StateMatch::Single(s) => as_entity_ref(s),
        StateMatch::List(_) => None,
    };
    // A multi-valued match list expands into one entity per value, under
    // a group position reserved for the value list itself.
    let value_list: Option<&[String]> = match &c.state {
        StateMatch::List(values) if values.len() > 1 => Some(values),
        _ => None,
    };

    for (integration, name) in &names {
        if let Some(values) = value_list {
            let (anchor, after) = inner.reserve();
            let mut scoped = after.under(anchor);
            for value in values {
                let expected = Expected::new()
                    .put("state", value.clone())
                    .put_opt("attribute", c.attribute.clone())
                    .put_opt("for", c.r#for.map(format_duration));
                scoped =
                    push_input_entity(&mut entities, scoped, role, integration, name, expected);
            }
            inner = inner.rejoin(scoped);
            continue;
        }

        let expected = Expected::new()
            .put("state", state_match_value(&c.state))
            .put_opt("attribute", c.attribute.clone())
            .put_opt("for", c.r#for.map(format_duration));
        inner = push_input_entity(&mut entities, inner, role, integration, name, expected);

        if let Some(other) = &state_ref {
            let mirrored = Expected::new().put("state", name.clone());
            inner = push_input_entity(
                &mut entities,
                inner,
                role,
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

fn dissect_numeric_state(
    c: &NumericStateCondition,
    role: ParameterRole,
    cursor: Cursor,
) -> (Vec<Entity>, Cursor) {
    let names = condition_entity_names(c.entity_id.ids(), c.attribute.as_deref());
    let mut entities = Vec::new();
    let mut inner = group_scope(cursor, names.len());

    for (integration, name) in &names {
        let expected = Expected::new()
            .put_opt("above", c.above.as_ref().map(numeric_value))
            .put_opt("below", c.below.as_ref().map(numeric_value))
            .put_opt("attribute", c.attribute.clone());
        inner = push_input_entity(&mut entities, inner, role, integration, name, expected);

        for (threshold, mirror_key) in [(&c.above, "below"), (&c.below, "above")] {
            if let Some(NumericValue::Entity(raw)) = threshold {
                if let Some(other) = as_entity_ref(raw) {
                    let mirrored = Expected::new().put(mirror_key, name.clone());
                    inner = push_input_entity(
                        &mut entities,
                        inner,
                        role,
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

fn dissect_time(c: &TimeCondition, role: ParameterRole, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let weekdays = if c.weekday.is_empty() {
        None
    } else {
        Some(Value::Array(
            c.weekday
                .iter()
                .map(|d| Value::String(d.clone()))
                .collect(),
        ))
    };
    let expected = Expected::new()
        .put_opt("after", c.after.map(|t| t.format("%H:%M:%S").to_string()))
        .put_opt("before", c.before.map(|t| t.format("%H:%M:%S").to_string()))
        .put_opt("weekday", weekdays);
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, role, "time", "time.time", expected);
    (entities, cursor)
}

fn dissect_sun(c: &SunCondition, role: ParameterRole, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let expected = Expected::new()
        .put_opt(
            "after",
            c.after.map(|e| serde_json::to_value(e).unwrap_or(Value::Null)),
        )
        .put_opt("after_offset", c.after_offset.map(format_duration))
        .put_opt(
            "before",
            c.before.map(|e| serde_json::to_value(e).unwrap_or(Value::Null)),
        )
        .put_opt("before_offset", c.before_offset.map(format_duration));
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, role, "sun", "sun.sun", expected);
    (entities, cursor)
}

fn dissect_zone(c: &ZoneCondition, role: ParameterRole, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let names = condition_entity_names(c.entity_id.ids(), None);
    let mut entities = Vec::new();
    let mut inner = group_scope(cursor, names.len());

    for (integration, name) in &names {
        let expected = Expected::new().put("zone", c.zone.clone());
        inner = push_input_entity(&mut entities, inner, role, integration, name, expected);
    }

    (entities, cursor.rejoin(inner))
}

fn dissect_template(
    c: &TemplateCondition,
    role: ParameterRole,
    cursor: Cursor,
) -> (Vec<Entity>, Cursor) {
    let expected = Expected::new().put("value_template", c.value_template.clone());
    let mut entities = Vec::new();
    let cursor = push_input_entity(
        &mut entities,
        cursor,
        role,
        "template",
        "template.template",
        expected,
    );
    (entities, cursor)
}

fn dissect_trigger_condition(
    c: &TriggerCondition,
    role: ParameterRole,
    cursor: Cursor,
) -> (Vec<Entity>, Cursor) {
    let name = format!("trigger.{}", slugify(&c.id));
    let expected = Expected::new().put("id", c.id.clone());
    let mut entities = Vec::new();
    let cursor = push_input_entity(&mut entities, cursor, role, "trigger", &name, expected);
    (entities, cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(raw: serde_json::Value) -> Condition {
        serde_json::from_value(raw).unwrap()
    }

    fn dissect(raw: serde_json::Value) -> (Vec<Entity>, Cursor) {
        dissect_condition(&condition(raw), ParameterRole::Input, Cursor::start()).unwrap()
    }

    #[test]
    fn test_or_reserves_own_position() {
        // Scenario: OR at position 1 anchors children starting at 2.
        let (entities, end) = dissect(json!({
            "condition": "or",
            "conditions": [
                {"condition": "state", "entity_id": "light.one", "state": "on"},
                {"condition": "state", "entity_id": "light.two", "state": "on"}
            ]
        }));

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
    fn test_nested_combinators() {
        let (entities, end) = dissect(json!({
            "condition": "and",
            "conditions": [
                {"condition": "not", "conditions": [
                    {"condition": "state", "entity_id": "lock.front", "state": "unlocked"}
                ]},
                {"condition": "sun", "after": "sunset"}
            ]
        }));

        // and=1, not=2, lock entity=3, sun entity=4
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].position, 3);
        assert_eq!(entities[0].parent, Some(2));
        assert_eq!(entities[1].position, 4);
        assert_eq!(entities[1].parent, Some(1));
        assert_eq!(end.position, 5);
    }

    #[test]
    fn test_role_propagates_into_combinators() {
        let c = condition(json!({
            "condition": "and",
            "conditions": [
                {"condition": "state", "entity_id": "cover.garage", "state": "open"}
            ]
        }));

        let (entities, _) =
            dissect_condition(&c, ParameterRole::ActionInput, Cursor::start()).unwrap();
        assert_eq!(entities[0].role, ParameterRole::ActionInput);
    }

    #[test]
    fn test_state_equality_reciprocity() {
        let (entities, end) = dissect(json!({
            "condition": "state",
            "entity_id": "sensor.upstairs_mode",
            "state": "sensor.downstairs_mode"
        }));

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].parent, entities[1].parent);
        assert_eq!(entities[1].entity_name, "sensor.downstairs_mode");
        let mirrored = entities[1].expected_value.as_ref().unwrap();
        assert_eq!(mirrored.get("state"), Some(&json!("sensor.upstairs_mode")));
        assert_eq!(end.real_position, 2);
    }

    #[test]
    fn test_literal_state_has_no_reciprocal() {
        let (entities, _) = dissect(json!({
            "condition": "state",
            "entity_id": "media_player.tv",
            "state": "playing"
        }));
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn test_trigger_condition_entity() {
        let (entities, end) = dissect(json!({
            "condition": "trigger",
            "id": "motion_detected"
        }));

        assert_eq!(entities[0].entity_name, "trigger.motion_detected");
        assert_eq!(entities[0].integration, "trigger");
        assert_eq!(end.real_position, 1);
    }

    #[test]
    fn test_time_condition_expected() {
        let (entities, _) = dissect(json!({
            "condition": "time",
            "after": "08:00:00",
            "before": "20:00:00",
            "weekday": ["mon", "fri"]
        }));

        let expected = entities[0].expected_value.as_ref().unwrap();
        assert_eq!(expected.get("after"), Some(&json!("08:00:00")));
        assert_eq!(expected.get("weekday"), Some(&json!(["mon", "fri"])));
    }

    #[test]
    fn test_disabled_child_inside_combinator() {
        let (entities, end) = dissect(json!({
            "condition": "and",
            "conditions": [
                {"condition": "state", "entity_id": "light.a", "state": "on", "enabled": false},
                {"condition": "state", "entity_id": "light.b", "state": "on"}
            ]
        }));

        // The disabled child consumes nothing; the anchor still does.
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].position, 2);
        assert_eq!(end.position, 3);
        assert_eq!(end.real_position, 1);
    }
}
