//! Condition section compiler
//!
//! Compiles the condition tree to one boolean expression over the strict
//! `_req` accessors. A missing required input raises inside the generated
//! code and the section reports an explicit error result, never a silent
//! fail.

use hat_core::{Cursor, Entity, ParameterRole};
use hat_dissect::{dissect_condition, DissectResult, Section};
use hat_rule::condition::{
    NumericStateCondition, StateCondition, SunCondition, TimeCondition, ZoneCondition,
};
use hat_rule::trigger::SunEvent;
use hat_rule::{Condition, NumericValue, StateMatch};

use crate::pylit::{py_literal, py_str, py_tuple};

/// Compile the condition section, returning its source and the section walk
pub fn compile_conditions(conditions: &[Condition]) -> DissectResult<(String, Section)> {
    let mut entities = Vec::new();
    let mut cursor = Cursor::start();
    let mut exprs = Vec::new();

    for condition in conditions {
        let (expr, found, end) =
            compile_condition_expr(condition, ParameterRole::Input, cursor)?;
        if let Some(expr) = expr {
            exprs.push(expr);
        }
        entities.extend(found);
        cursor = end;
    }

    let combined = if exprs.is_empty() {
        "True".to_string()
    } else {
        exprs.join(" and ")
    };

    let source = [
        "def check_condition(inputs, trigger_id=None):".to_string(),
        "    try:".to_string(),
        format!("        ok = {combined}"),
        "        return {\"result\": \"pass\" if ok else \"fail\", \"detail\": None}".to_string(),
        "    except InputError as exc:".to_string(),
        "        return {\"result\": \"error\", \"detail\": str(exc)}".to_string(),
    ]
    .join("\n")
        + "\n";

    Ok((
        source,
        Section {
            entities,
            end: cursor,
        },
    ))
}

/// Compile one condition fragment into an expression, advancing the
/// cursor exactly as the dissector does.
///
/// Returns `None` for disabled fragments.
pub fn compile_condition_expr(
    condition: &Condition,
    role: ParameterRole,
    cursor: Cursor,
) -> DissectResult<(Option<String>, Vec<Entity>, Cursor)> {
    if !condition.enabled() {
        return Ok((None, Vec::new(), cursor));
    }

    match condition {
        Condition::And(c) => {
            let (exprs, entities, end) = compile_children(&c.conditions, role, cursor)?;
            let expr = if exprs.is_empty() {
                "True".to_string()
            } else {
                format!("({})", exprs.join(" and "))
            };
            Ok((Some(expr), entities, end))
        }
        Condition::Or(c) => {
            let (exprs, entities, end) = compile_children(&c.conditions, role, cursor)?;
            let expr = if exprs.is_empty() {
                "False".to_string()
            } else {
                format!("({})", exprs.join(" or "))
            };
            Ok((Some(expr), entities, end))
        }
        Condition::Not(c) => {
            let (exprs, entities, end) = compile_children(&c.conditions, role, cursor)?;
            let expr = if exprs.is_empty() {
                "True".to_string()
            } else {
                format!("(not ({}))", exprs.join(" or "))
            };
            Ok((Some(expr), entities, end))
        }
        leaf => {
            let (entities, end) = dissect_condition(leaf, role, cursor)?;
            let expr = leaf_expr(leaf, cursor.real_position);
            Ok((Some(expr), entities, end))
        }
    }
}

/// Children of a combinator share its reserved anchor position
fn compile_children(
    children: &[Condition],
    role: ParameterRole,
    cursor: Cursor,
) -> DissectResult<(Vec<String>, Vec<Entity>, Cursor)> {
    let (anchor, after) = cursor.reserve();
    let mut scoped = after.under(anchor);
    let mut exprs = Vec::new();
    let mut entities = Vec::new();

    for child in children {
        let (expr, found, end) = compile_condition_expr(child, role, scoped)?;
        if let Some(expr) = expr {
            exprs.push(expr);
        }
        entities.extend(found);
        scoped = end;
    }

    Ok((exprs, entities, cursor.rejoin(scoped)))
}

fn leaf_expr(condition: &Condition, base: u32) -> String {
    let mut slot = base;
    match condition {
        Condition::State(c) => state_expr(c, &mut slot),
        Condition::NumericState(c) => numeric_expr(c, &mut slot),
        Condition::Time(c) => time_expr(c, slot),
        Condition::Sun(c) => sun_expr(c, slot),
        Condition::Zone(c) => zone_expr(c, &mut slot),
        Condition::Template(_) => format!("_bool_req(inputs, {slot})"),
        Condition::Trigger(c) => {
            format!("_fired(inputs, {slot}, trigger_id, {})", py_str(&c.id))
        }
        // Combinators are handled by the caller.
        Condition::And(_) | Condition::Or(_) | Condition::Not(_) => "True".to_string(),
    }
}

fn state_expr(c: &StateCondition, slot: &mut u32) -> String {
    let state_ref = matches!(&c.state, StateMatch::Single(s)
        if hat_core::EntityId::parse_ref(s).is_some());
    let value_list: Option<&[String]> = match &c.state {
        StateMatch::List(values) if values.len() > 1 => Some(values),
        _ => None,
    };

    let per_entity: Vec<String> = c
        .entity_id
        .ids()
        .iter()
        .map(|_| {
            if let Some(values) = value_list {
                // One slot per expanded value entity; any may hold.
                let per_value: Vec<String> = values
                    .iter()
                    .map(|value| {
                        let p = *slot;
                        *slot += 1;
                        format!("(_req(inputs, {p}) == {})", py_str(value))
                    })
                    .collect();
                return format!("({})", per_value.join(" or "));
            }

            let primary = *slot;
            *slot += 1;
            if state_ref {
                let other = *slot;
                *slot += 1;
                format!("(_req(inputs, {primary}) == _req(inputs, {other}))")
            } else {
                match &c.state {
                    StateMatch::Single(s) => {
                        format!("(_req(inputs, {primary}) == {})", py_str(s))
                    }
                    StateMatch::List(values) => {
                        let refs: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
                        format!("(_req(inputs, {primary}) in {})", py_tuple(&refs))
                    }
                }
            }
        })
        .collect();

    join_and(per_entity)
}

fn numeric_expr(c: &NumericStateCondition, slot: &mut u32) -> String {
    let above_ref = is_entity_ref(&c.above);
    let below_ref = is_entity_ref(&c.below);

    let per_entity: Vec<String> = c
        .entity_id
        .ids()
        .iter()
        .map(|_| {
            let primary = *slot;
            *slot += 1;
            let above = strict_bound(&c.above, above_ref, slot);
            let below = strict_bound(&c.below, below_ref, slot);
            format!("_range_ok(_num_req(inputs, {primary}), {above}, {below})")
        })
        .collect();

    join_and(per_entity)
}

fn is_entity_ref(value: &Option<NumericValue>) -> bool {
    matches!(value, Some(NumericValue::Entity(raw))
        if hat_core::EntityId::parse_ref(raw).is_some())
}

fn strict_bound(value: &Option<NumericValue>, is_ref: bool, slot: &mut u32) -> String {
    match value {
        None => "None".to_string(),
        Some(NumericValue::Literal(n)) => {
            py_literal(&serde_json::to_value(n).unwrap_or(serde_json::Value::Null))
        }
        Some(NumericValue::Entity(_)) if is_ref => {
            let other = *slot;
            *slot += 1;
            format!("_num_req(inputs, {other})")
        }
        Some(NumericValue::Entity(_)) => "None".to_string(),
    }
}

fn time_expr(c: &TimeCondition, slot: u32) -> String {
    let after = c
        .after
        .map(|t| py_str(&t.format("%H:%M:%S").to_string()))
        .unwrap_or_else(|| "None".to_string());
    let before = c
        .before
        .map(|t| py_str(&t.format("%H:%M:%S").to_string()))
        .unwrap_or_else(|| "None".to_string());
    let weekdays = if c.weekday.is_empty() {
        "None".to_string()
    } else {
        let refs: Vec<&str> = c.weekday.iter().map(|d| d.as_str()).collect();
        py_tuple(&refs)
    };
    format!("_time_ok(_req(inputs, {slot}), {after}, {before}, {weekdays})")
}

/// Sun conditions test the horizon side the declared edge implies:
/// after sunset or before sunrise means the sun is below the horizon.
fn sun_expr(c: &SunCondition, slot: u32) -> String {
    let mut parts = Vec::new();
    if let Some(after) = c.after {
        let phase = match after {
            SunEvent::Sunrise => "above_horizon",
            SunEvent::Sunset => "below_horizon",
        };
        parts.push(format!("(_req(inputs, {slot}) == {})", py_str(phase)));
    }
    if let Some(before) = c.before {
        let phase = match before {
            SunEvent::Sunrise => "below_horizon",
            SunEvent::Sunset => "above_horizon",
        };
        parts.push(format!("(_req(inputs, {slot}) == {})", py_str(phase)));
    }
    if parts.is_empty() {
        return format!("(_req(inputs, {slot}) is not None)");
    }
    join_and(parts)
}

fn zone_expr(c: &ZoneCondition, slot: &mut u32) -> String {
    let per_entity: Vec<String> = c
        .entity_id
        .ids()
        .iter()
        .map(|_| {
            let p = *slot;
            *slot += 1;
            format!("(_req(inputs, {p}) == {})", py_str(&c.zone))
        })
        .collect();
    join_and(per_entity)
}

fn join_and(parts: Vec<String>) -> String {
    match parts.len() {
        0 => "True".to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(" and ")),
    }
}
