//! Walk-level properties of the dissector, checked across a spread of
//! rule shapes: position monotonicity, input-slot accounting, reciprocal
//! pairs, and idempotence.

use hat_core::{Cursor, ParameterRole};
use hat_dissect::{dissect_action, dissect_condition, dissect_trigger, dissect_triggers};
use hat_rule::{Action, Condition, Trigger};
use serde_json::json;

fn trigger(raw: serde_json::Value) -> Trigger {
    serde_json::from_value(raw).unwrap()
}

fn condition(raw: serde_json::Value) -> Condition {
    serde_json::from_value(raw).unwrap()
}

fn action(raw: serde_json::Value) -> Action {
    serde_json::from_value(raw).unwrap()
}

fn sample_triggers() -> Vec<Trigger> {
    vec![
        trigger(json!({"trigger": "state", "entity_id": "light.a", "to": "on"})),
        trigger(json!({"trigger": "state", "entity_id": ["light.b", "light.c"], "to": ["on", "off"]})),
        trigger(json!({"trigger": "numeric_state", "entity_id": "sensor.t", "above": 20, "below": 30})),
        trigger(json!({"trigger": "numeric_state", "entity_id": "sensor.in", "above": "sensor.out"})),
        trigger(json!({"trigger": "event", "event_type": "doorbell_pressed"})),
        trigger(json!({"trigger": "time", "at": "07:30:00"})),
        trigger(json!({"trigger": "time_pattern", "minutes": "/15"})),
        trigger(json!({"trigger": "template", "value_template": "{{ x > 1 }}"})),
        trigger(json!({"trigger": "zone", "entity_id": "person.ann", "zone": "home", "event": "enter"})),
        trigger(json!({"trigger": "sun", "event": "sunset", "offset": "00:30:00"})),
        trigger(json!({"trigger": "mqtt", "topic": "home/door", "payload": "open"})),
        trigger(json!({"trigger": "webhook", "webhook_id": "rain"})),
        trigger(json!({"trigger": "device", "device_id": "d1", "domain": "zha", "type": "button"})),
        trigger(json!({"trigger": "calendar", "entity_id": "calendar.trash", "event": "start"})),
        trigger(json!({"trigger": "tag", "tag_id": "nfc1"})),
        trigger(json!({"trigger": "homeassistant", "event": "start"})),
    ]
}

#[test]
fn position_monotonicity_over_all_trigger_kinds() {
    for t in sample_triggers() {
        let start = Cursor::start();
        let (entities, end) = dissect_trigger(&t, start).unwrap();
        assert!(end.position >= start.position, "{:?}", t);
        assert!(end.real_position >= start.real_position, "{:?}", t);
        assert_eq!(
            entities.is_empty(),
            end == start,
            "equality iff nothing contributed: {:?}",
            t
        );
    }
}

#[test]
fn slot_accounting_matches_consuming_roles() {
    let fragments = vec![
        condition(json!({"condition": "or", "conditions": [
            {"condition": "numeric_state", "entity_id": "sensor.a", "above": "sensor.b"},
            {"condition": "state", "entity_id": ["light.x", "light.y"], "state": "on"}
        ]})),
        condition(json!({"condition": "time", "after": "06:00:00"})),
    ];

    for c in fragments {
        let start = Cursor::start();
        let (entities, end) = dissect_condition(&c, ParameterRole::Input, start).unwrap();
        let consuming = entities
            .iter()
            .filter(|e| e.role.consumes_input())
            .count() as u32;
        assert_eq!(consuming, end.real_position - start.real_position);
    }

    // Output entities are independent of the input-slot counter.
    let a = action(json!({"service": "light.turn_on", "target": {"entity_id": ["light.a", "light.b"]}}));
    let (entities, end) = dissect_action(&a, Cursor::start()).unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(end.real_position, 0);
}

#[test]
fn reciprocity_for_entity_valued_constraints() {
    let cases = vec![
        trigger(json!({"trigger": "numeric_state", "entity_id": "sensor.a", "above": "sensor.b"})),
        trigger(json!({"trigger": "numeric_state", "entity_id": "sensor.a", "below": "sensor.b"})),
        trigger(json!({"trigger": "state", "entity_id": "sensor.a", "to": "sensor.b"})),
    ];

    for t in cases {
        let (entities, _) = dissect_trigger(&t, Cursor::start()).unwrap();
        assert_eq!(entities.len(), 2, "{:?}", t);
        assert_eq!(entities[0].parent, entities[1].parent);

        let primary_keys: Vec<&String> = entities[0]
            .expected_value
            .as_ref()
            .unwrap()
            .keys()
            .collect();
        let mirror_keys: Vec<&String> = entities[1]
            .expected_value
            .as_ref()
            .unwrap()
            .keys()
            .collect();
        assert!(!primary_keys.is_empty());
        assert!(!mirror_keys.is_empty());

        // Mirrored numeric keys flip above/below; state equality mirrors
        // the state key back at the primary.
        if primary_keys.contains(&&"above".to_string()) {
            assert!(mirror_keys.contains(&&"below".to_string()));
        } else if primary_keys.contains(&&"below".to_string()) {
            assert!(mirror_keys.contains(&&"above".to_string()));
        } else {
            assert!(mirror_keys.contains(&&"state".to_string()));
        }
    }
}

#[test]
fn dissection_is_idempotent() {
    let triggers = sample_triggers();
    let first = dissect_triggers(&triggers, Cursor::start()).unwrap();
    let second = dissect_triggers(&triggers, Cursor::start()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn disabled_and_malformed_fragments_consume_nothing() {
    let cases = vec![
        trigger(json!({"trigger": "state", "entity_id": "light.a", "to": "on", "enabled": false})),
        trigger(json!({"trigger": "mqtt", "topic": "x", "enabled": false})),
    ];
    for t in cases {
        let start = Cursor::start();
        let (entities, end) = dissect_trigger(&t, start).unwrap();
        assert!(entities.is_empty());
        assert_eq!(end, start);
    }

    let malformed_service = action(json!({"service": "nodomain"}));
    let (entities, end) = dissect_action(&malformed_service, Cursor::start()).unwrap();
    assert!(entities.is_empty());
    assert_eq!(end, Cursor::start());
}

#[test]
fn deep_action_tree_parent_chain() {
    let a = action(json!({
        "if": [{"condition": "state", "entity_id": "alarm.home", "state": "armed"}],
        "then": [
            {"repeat": {"count": 2, "sequence": [
                {"service": "siren.turn_on", "target": {"entity_id": "siren.outdoor"}}
            ]}}
        ],
        "else": [
            {"choose": [{
                "conditions": [{"condition": "sun", "after": "sunset"}],
                "sequence": [{"service": "light.turn_on", "target": {"entity_id": "light.path"}}]
            }]}
        ]
    }));

    let (entities, end) = dissect_action(&a, Cursor::start()).unwrap();
    // if=1, guard=2, repeat=3, siren=4, choose=5, sun=6, light=7
    assert_eq!(entities.len(), 4);
    assert_eq!(entities[0].position, 2);
    assert_eq!(entities[0].parent, Some(1));
    assert_eq!(entities[1].position, 4);
    assert_eq!(entities[1].parent, Some(3));
    assert_eq!(entities[2].position, 6);
    assert_eq!(entities[2].parent, Some(5));
    assert_eq!(entities[3].position, 7);
    assert_eq!(entities[3].parent, Some(5));
    assert_eq!(end.position, 8);
    assert_eq!(end.real_position, 2);
    assert_eq!(end.parent, None);
}
