//! Whole-artifact compilation against a realistic automation: section
//! agreement with the dissector, baked constraints, slot layout, and the
//! generated entry point.

use hat_compile::{compile_automation, writer};
use hat_core::ParameterRole;
use hat_rule::{Automation, AutomationConfig};
use serde_json::json;

fn automation() -> Automation {
    let config: AutomationConfig = serde_json::from_value(json!({
        "id": "evening_comfort",
        "alias": "Evening comfort",
        "mode": "parallel",
        "max": 3,
        "triggers": [
            {"trigger": "numeric_state", "entity_id": "sensor.living_room_temp",
             "above": 20, "below": 30, "id": "comfort_band"},
            {"trigger": "state", "entity_id": "binary_sensor.presence", "to": "on"}
        ],
        "conditions": [
            {"condition": "or", "conditions": [
                {"condition": "sun", "after": "sunset"},
                {"condition": "time", "after": "17:00:00", "before": "23:00:00"}
            ]}
        ],
        "actions": [
            {"service": "light.turn_on",
             "target": {"entity_id": ["light.sofa", "light.reading"]},
             "data": {"brightness": 180}},
            {"if": [{"condition": "state", "entity_id": "media_player.tv", "state": "playing"}],
             "then": [{"service": "light.turn_off", "target": {"entity_id": "light.ceiling"}}]},
            {"repeat": {"count": 2, "sequence": [
                {"service": "cover.close_cover", "target": {"entity_id": "cover.blinds"}}
            ]}}
        ]
    }))
    .unwrap();
    Automation::from_config(config)
}

#[test]
fn artifact_sections_and_entities_agree() {
    let automation = automation();
    let artifact = compile_automation(&automation).unwrap();
    let dissected = hat_dissect::dissect_automation(&automation).unwrap();
    assert_eq!(artifact.entities, dissected);

    // One input slot per trigger entity.
    assert_eq!(artifact.entities.trigger.input_slots(), 2);
    assert_eq!(artifact.entities.condition.input_slots(), 2);
    // One if-guard consumes the only action input slot.
    assert_eq!(artifact.entities.action.input_slots(), 1);
}

#[test]
fn baked_constraints_and_slots() {
    let artifact = compile_automation(&automation()).unwrap();
    let source = &artifact.source;

    // Numeric band baked with exclusive borders, slot 0.
    assert!(source.contains("_in_range(_num(_get(inputs, 0)), 20.0, 30.0)"));
    assert!(source.contains("candidates.append(\"comfort_band\")"));
    // Presence trigger on slot 1.
    assert!(source.contains("_get(inputs, 1) == \"on\""));

    // OR condition over sun and time window.
    assert!(source.contains(
        "((_req(inputs, 0) == \"below_horizon\") or _time_ok(_req(inputs, 1), \"17:00:00\", \"23:00:00\", None))"
    ));

    // Group service call resolved to one target-group record.
    assert!(source.contains("\"entity\": \"light.target_group\""));
    assert!(source.contains("\"entity_id\": [\"light.sofa\", \"light.reading\"]"));
    assert!(source.contains("\"data\": {\"brightness\": 180}"));

    // Repeat body tagged with its count.
    assert!(source.contains("for _ in range(2):"));
    assert!(source.contains("\"repeat\": 2})"));
}

#[test]
fn output_entities_do_not_consume_slots() {
    let artifact = compile_automation(&automation()).unwrap();
    let outputs: Vec<_> = artifact
        .entities
        .action
        .entities
        .iter()
        .filter(|e| e.role == ParameterRole::Output)
        .collect();

    assert_eq!(outputs.len(), 3);
    assert_eq!(artifact.entities.action.input_slots(), 1);
}

#[test]
fn artifact_is_reproducible_and_writable() {
    let automation = automation();
    let first = compile_automation(&automation).unwrap();
    let second = compile_automation(&automation).unwrap();
    assert_eq!(first.source, second.source);

    let dir = tempfile::tempdir().unwrap();
    let path = writer::write_artifact(dir.path(), &first).unwrap();
    assert!(path.ends_with("evening_comfort.py"));
    let on_disk = std::fs::read_to_string(path).unwrap();
    assert_eq!(on_disk, first.source);
}

#[test]
fn time_pattern_error_propagates() {
    let config: AutomationConfig = serde_json::from_value(json!({
        "id": "broken",
        "triggers": [{"trigger": "time_pattern", "minutes": "/0"}],
        "actions": []
    }))
    .unwrap();
    let automation = Automation::from_config(config);

    let err = compile_automation(&automation).unwrap_err();
    assert!(err.to_string().contains("minutes"));
}

#[test]
fn entry_point_shape() {
    let artifact = compile_automation(&automation()).unwrap();
    let source = &artifact.source;

    assert!(source.contains("payload = json.loads(sys.argv[1])"));
    assert!(source.contains("trigger_inputs, condition_inputs, action_inputs = payload"));
    assert!(source.contains(
        "print(json.dumps({\"trigger\": trigger, \"condition\": condition, \"action\": action}))"
    ));
}
