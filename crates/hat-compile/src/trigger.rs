//! Trigger section compiler
//!
//! Walks the trigger list with the same cursor discipline as the
//! dissector and emits one candidate block per firing trigger. The
//! section evaluates to a boolean plus the id of the first trigger that
//! fired.

use hat_core::Cursor;
use hat_dissect::{dissect_trigger, DissectResult, Section};
use hat_rule::trigger::{TimeSpec, ZoneEvent};
use hat_rule::{NumericValue, StateMatch, Trigger};

use crate::pylit::{py_literal, py_str, py_tuple};

/// Compile the trigger section, returning its source and the section walk
pub fn compile_triggers(triggers: &[Trigger]) -> DissectResult<(String, Section)> {
    let mut lines = vec![
        "def check_trigger(inputs):".to_string(),
        "    candidates = []".to_string(),
    ];
    let mut entities = Vec::new();
    let mut cursor = Cursor::start();

    for trigger in triggers {
        let (found, end) = dissect_trigger(trigger, cursor)?;
        if found.is_empty() {
            cursor = end;
            continue;
        }

        let names: Vec<&str> = found.iter().map(|e| e.entity_name.as_str()).collect();
        let predicate = trigger_predicate(trigger, cursor.real_position);
        let id_literal = trigger
            .id()
            .map(py_str)
            .unwrap_or_else(|| "None".to_string());

        lines.push(format!("    # {}: {}", trigger.platform(), names.join(", ")));
        lines.push(format!("    if {}:", predicate));
        lines.push(format!("        candidates.append({})", id_literal));

        entities.extend(found);
        cursor = end;
    }

    lines.push("    if candidates:".to_string());
    lines.push("        return {\"triggered\": True, \"trigger_id\": candidates[0]}".to_string());
    lines.push("    return {\"triggered\": False, \"trigger_id\": None}".to_string());

    Ok((
        lines.join("\n") + "\n",
        Section {
            entities,
            end: cursor,
        },
    ))
}

/// Build the firing predicate of one trigger.
///
/// `base` is the first input slot the trigger's entities claim; slot
/// assignment here mirrors the dissector's claim order exactly.
fn trigger_predicate(trigger: &Trigger, base: u32) -> String {
    let mut slot = base;
    match trigger {
        Trigger::State(t) => {
            let to_ref = matches!(&t.to, Some(StateMatch::Single(s))
                if hat_core::EntityId::parse_ref(s).is_some());
            let value_list: Option<&[String]> = match &t.to {
                Some(StateMatch::List(values)) if values.len() > 1 => Some(values),
                _ => None,
            };
            let per_entity: Vec<String> = t
                .entity_id
                .ids()
                .iter()
                .map(|_| {
                    if let Some(values) = value_list {
                        // One slot per expanded value entity.
                        let per_value: Vec<String> = values
                            .iter()
                            .map(|value| {
                                let p = slot;
                                slot += 1;
                                format!("_get(inputs, {p}) == {}", py_str(value))
                            })
                            .collect();
                        return join_or(per_value);
                    }

                    let primary = slot;
                    slot += 1;
                    if to_ref {
                        let other = slot;
                        slot += 1;
                        format!(
                            "(_get(inputs, {p}) is not None and _get(inputs, {p}) == _get(inputs, {o}))",
                            p = primary,
                            o = other
                        )
                    } else {
                        state_match_predicate(primary, t.to.as_ref())
                    }
                })
                .collect();
            // Any monitored entity reaching the target state fires.
            join_or(per_entity)
        }

        Trigger::NumericState(t) => {
            let refs_above = numeric_ref(&t.above);
            let refs_below = numeric_ref(&t.below);
            let per_entity: Vec<String> = t
                .entity_id
                .ids()
                .iter()
                .map(|_| {
                    let primary = slot;
                    slot += 1;
                    let mut guards = Vec::new();
                    let above = bound_expr(&t.above, refs_above, &mut slot, &mut guards);
                    let below = bound_expr(&t.below, refs_below, &mut slot, &mut guards);
                    let range = format!(
                        "_in_range(_num(_get(inputs, {p})), {above}, {below})",
                        p = primary
                    );
                    if guards.is_empty() {
                        range
                    } else {
                        format!("({} and {})", guards.join(" and "), range)
                    }
                })
                .collect();
            join_or(per_entity)
        }

        Trigger::Event(_) | Trigger::Webhook(_) | Trigger::Device(_)
        | Trigger::PersistentNotification(_) => present(slot),

        Trigger::Time(t) => match &t.at {
            TimeSpec::Fixed(at) => format!(
                "_get(inputs, {slot}) == {}",
                py_str(&at.format("%H:%M:%S").to_string())
            ),
            TimeSpec::Entity(_) => present(slot),
        },

        Trigger::TimePattern(t) => format!(
            "_pattern_ok(_get(inputs, {slot}), {}, {}, {})",
            opt_str(t.hours.as_deref()),
            opt_str(t.minutes.as_deref()),
            opt_str(t.seconds.as_deref())
        ),

        Trigger::Template(_) => format!("_truthy(_get(inputs, {slot}))"),

        Trigger::Zone(t) => {
            let per_entity: Vec<String> = t
                .entity_id
                .ids()
                .iter()
                .map(|_| {
                    let p = slot;
                    slot += 1;
                    zone_predicate(p, &t.zone, t.event)
                })
                .collect();
            join_or(per_entity)
        }

        Trigger::GeoLocation(t) => zone_predicate(slot, &t.zone, t.event),

        Trigger::Sun(t) => format!(
            "_get(inputs, {slot}) == {}",
            py_literal(&serde_json::to_value(t.event).unwrap_or(serde_json::Value::Null))
        ),

        Trigger::Homeassistant(t) => format!(
            "_get(inputs, {slot}) == {}",
            py_literal(&serde_json::to_value(t.event).unwrap_or(serde_json::Value::Null))
        ),

        Trigger::Mqtt(t) => match &t.payload {
            Some(payload) => format!("_get(inputs, {slot}) == {}", py_str(payload)),
            None => present(slot),
        },

        Trigger::Calendar(t) => format!(
            "_get(inputs, {slot}) == {}",
            py_literal(&serde_json::to_value(t.event).unwrap_or(serde_json::Value::Null))
        ),

        Trigger::Tag(t) => format!("_get(inputs, {slot}) == {}", py_str(&t.tag_id)),
    }
}

fn present(slot: u32) -> String {
    format!("_get(inputs, {slot}) is not None")
}

fn join_or(parts: Vec<String>) -> String {
    match parts.len() {
        0 => "False".to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(" or ")),
    }
}

fn opt_str(value: Option<&str>) -> String {
    value.map(py_str).unwrap_or_else(|| "None".to_string())
}

fn state_match_predicate(slot: u32, to: Option<&StateMatch>) -> String {
    match to {
        None => present(slot),
        Some(StateMatch::Single(s)) => format!("_get(inputs, {slot}) == {}", py_str(s)),
        Some(StateMatch::List(values)) => {
            let refs: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
            format!("_get(inputs, {slot}) in {}", py_tuple(&refs))
        }
    }
}

fn numeric_ref(value: &Option<NumericValue>) -> bool {
    matches!(value, Some(NumericValue::Entity(raw))
        if hat_core::EntityId::parse_ref(raw).is_some())
}

/// Bound expression for one threshold; entity-referenced thresholds claim
/// the reciprocal's slot and guard against it being absent.
fn bound_expr(
    value: &Option<NumericValue>,
    is_ref: bool,
    slot: &mut u32,
    guards: &mut Vec<String>,
) -> String {
    match value {
        None => "None".to_string(),
        Some(NumericValue::Literal(n)) => {
            py_literal(&serde_json::to_value(n).unwrap_or(serde_json::Value::Null))
        }
        Some(NumericValue::Entity(_)) if is_ref => {
            let other = *slot;
            *slot += 1;
            guards.push(format!("_get(inputs, {other}) is not None"));
            format!("_num(_get(inputs, {other}))")
        }
        // Reference string that is not a well-formed entity id: the
        // dissector emitted no reciprocal, so there is nothing to compare.
        Some(NumericValue::Entity(_)) => "None".to_string(),
    }
}

fn zone_predicate(slot: u32, zone: &str, event: ZoneEvent) -> String {
    match event {
        ZoneEvent::Enter => format!("_get(inputs, {slot}) == {}", py_str(zone)),
        ZoneEvent::Leave => format!(
            "(_get(inputs, {slot}) is not None and _get(inputs, {slot}) != {})",
            py_str(zone)
        ),
    }
}
