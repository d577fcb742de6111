//! Action dissection
//!
//! Condition fragments inside branch/loop bodies become ActionInput
//! entities; everything an action actually does becomes an Output entity,
//! which consumes a position but never a runtime input slot. Branch and
//! loop constructs reserve one structural position each.

use serde_json::Value;
use tracing::trace;

use hat_core::{Cursor, Entity, ParameterRole};
use hat_rule::action::{
    ChooseAction, DelayAction, EventAction, IfAction, ParallelAction, RepeatAction, RepeatConfig,
    SequenceAction, ServiceAction, StopAction,
};
use hat_rule::{Action, Condition};

use crate::condition::dissect_conditions;
use crate::error::DissectResult;
use crate::support::{integration_of, push_output_entity, slugify, Expected};

/// Dissect a list of actions, threading the cursor through each
pub fn dissect_actions(actions: &[Action], cursor: Cursor) -> DissectResult<(Vec<Entity>, Cursor)> {
    let mut entities = Vec::new();
    let mut cursor = cursor;
    for action in actions {
        let (found, next) = dissect_action(action, cursor)?;
        entities.extend(found);
        cursor = next;
    }
    Ok((entities, cursor))
}

/// Dissect one action fragment.
///
/// Disabled fragments are no-ops: zero entities, cursor unchanged.
pub fn dissect_action(action: &Action, cursor: Cursor) -> DissectResult<(Vec<Entity>, Cursor)> {
    if !action.enabled() {
        trace!("skipping disabled action");
        return Ok((Vec::new(), cursor));
    }

    match action {
        Action::Service(a) => Ok(dissect_service(a, cursor)),
        Action::Delay(a) => Ok(dissect_delay(a, cursor)),
        Action::Event(a) => Ok(dissect_event(a, cursor)),
        Action::Stop(a) => Ok(dissect_stop(a, cursor)),
        Action::Condition(c) => dissect_embedded_condition(c, cursor),
        Action::If(a) => dissect_if(a, cursor),
        Action::Choose(a) => dissect_choose(a, cursor),
        Action::Repeat(a) => dissect_repeat(a, cursor),
        Action::Parallel(a) => dissect_parallel(a, cursor),
        Action::Sequence(a) => dissect_sequence(a, cursor),
    }
}

fn data_value(data: &std::collections::HashMap<String, Value>) -> Option<Value> {
    if data.is_empty() {
        return None;
    }
    // Keys sorted so repeated compilation of the same call is identical.
    let mut keys: Vec<_> = data.keys().collect();
    keys.sort();
    let mut map = serde_json::Map::new();
    for key in keys {
        if let Some(value) = data.get(key) {
            map.insert(key.clone(), value.clone());
        }
    }
    Some(Value::Object(map))
}

/// Resolve a service call's target into exactly one Output entity.
fn dissect_service(a: &ServiceAction, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let Some(domain) = a.domain() else {
        // A service name without a domain is unrecognizable; contribute
        // nothing rather than inventing an entity.
        trace!(service = %a.service, "skipping malformed service action");
        return (Vec::new(), cursor);
    };

    let target = a.target.clone().unwrap_or_default();
    let expected = Expected::new().put("service", a.service.clone());

    let (integration, name, expected) = match (
        target.entity_id.as_slice(),
        target.device_id.as_slice(),
        target.area_id.as_slice(),
    ) {
        ([], [], []) => (
            domain.to_string(),
            a.service.clone(),
            expected,
        ),
        ([entity], [], []) => (
            integration_of(entity),
            entity.clone(),
            expected,
        ),
        ([], [device], []) => (
            domain.to_string(),
            format!("{}.{}", domain, slugify(device)),
            expected.put("device_id", device.clone()),
        ),
        _ => {
            // Several targets, or a mix of entity/device/area ids: one
            // synthesized group entity listing every identifier.
            let list = |ids: &[String]| {
                if ids.is_empty() {
                    None
                } else {
                    Some(Value::Array(
                        ids.iter().map(|s| Value::String(s.clone())).collect(),
                    ))
                }
            };
            (
                domain.to_string(),
                format!("{}.{}", domain, hat_core::TARGET_GROUP),
                expected
                    .put_opt("entity_id", list(&target.entity_id))
                    .put_opt("device_id", list(&target.device_id))
                    .put_opt("area_id", list(&target.area_id)),
            )
        }
    };

    let expected = expected.put_opt("data", data_value(&a.data));
    let mut entities = Vec::new();
    let cursor = push_output_entity(&mut entities, cursor, &integration, &name, expected);
    (entities, cursor)
}

fn dissect_delay(a: &DelayAction, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let delay = a
        .delay
        .to_duration()
        .map(hat_rule::trigger::format_duration);
    let expected = Expected::new().put_opt("delay", delay);
    let mut entities = Vec::new();
    let cursor = push_output_entity(&mut entities, cursor, "delay", "delay.delay", expected);
    (entities, cursor)
}

fn dissect_event(a: &EventAction, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let name = format!("event.{}", slugify(&a.event));
    let event_data = data_value(&a.event_data);
    let expected = Expected::new()
        .put("event", a.event.clone())
        .put_opt("event_data", event_data);
    let mut entities = Vec::new();
    let cursor = push_output_entity(&mut entities, cursor, "event", &name, expected);
    (entities, cursor)
}

fn dissect_stop(a: &StopAction, cursor: Cursor) -> (Vec<Entity>, Cursor) {
    let expected = Expected::new()
        .put("stop", a.stop.clone())
        .put("error", a.error);
    let mut entities = Vec::new();
    let cursor = push_output_entity(&mut entities, cursor, "stop", "stop.stop", expected);
    (entities, cursor)
}

fn dissect_embedded_condition(
    condition: &Condition,
    cursor: Cursor,
) -> DissectResult<(Vec<Entity>, Cursor)> {
    crate::condition::dissect_condition(condition, ParameterRole::ActionInput, cursor)
}

fn dissect_if(a: &IfAction, cursor: Cursor) -> DissectResult<(Vec<Entity>, Cursor)> {
    let (anchor, after) = cursor.reserve();
    let scoped = after.under(anchor);

    let (mut entities, scoped) =
        dissect_conditions(&a.r#if, ParameterRole::ActionInput, scoped)?;
    let (then_entities, scoped) = dissect_actions(&a.then, scoped)?;
    entities.extend(then_entities);
    let (else_entities, scoped) = dissect_actions(&a.r#else, scoped)?;
    entities.extend(else_entities);

    Ok((entities, cursor.rejoin(scoped)))
}

fn dissect_choose(a: &ChooseAction, cursor: Cursor) -> DissectResult<(Vec<Entity>, Cursor)> {
    let (anchor, after) = cursor.reserve();
    let mut scoped = after.under(anchor);
    let mut entities = Vec::new();

    for option in &a.choose {
        let (guard, next) =
            dissect_conditions(&option.conditions, ParameterRole::ActionInput, scoped)?;
        entities.extend(guard);
        let (body, next) = dissect_actions(&option.sequence, next)?;
        entities.extend(body);
        scoped = next;
    }

    let (default_entities, scoped) = dissect_actions(&a.default, scoped)?;
    entities.extend(default_entities);

    Ok((entities, cursor.rejoin(scoped)))
}

fn dissect_repeat(a: &RepeatAction, cursor: Cursor) -> DissectResult<(Vec<Entity>, Cursor)> {
    let (anchor, after) = cursor.reserve();
    let scoped = after.under(anchor);

    let (entities, scoped) = match &a.repeat {
        RepeatConfig::Count { sequence, .. } => dissect_actions(sequence, scoped)?,
        RepeatConfig::While { r#while, sequence } => {
            let (mut guard, next) =
                dissect_conditions(r#while, ParameterRole::ActionInput, scoped)?;
            let (body, next) = dissect_actions(sequence, next)?;
            guard.extend(body);
            (guard, next)
        }
        RepeatConfig::Until { until, sequence } => {
            let (mut guard, next) =
                dissect_conditions(until, ParameterRole::ActionInput, scoped)?;
            let (body, next) = dissect_actions(sequence, next)?;
            guard.extend(body);
            (guard, next)
        }
    };

    Ok((entities, cursor.rejoin(scoped)))
}

fn dissect_parallel(a: &ParallelAction, cursor: Cursor) -> DissectResult<(Vec<Entity>, Cursor)> {
    let (anchor, after) = cursor.reserve();
    let (entities, scoped) = dissect_actions(&a.parallel, after.under(anchor))?;
    Ok((entities, cursor.rejoin(scoped)))
}

fn dissect_sequence(a: &SequenceAction, cursor: Cursor) -> DissectResult<(Vec<Entity>, Cursor)> {
    let (anchor, after) = cursor.reserve();
    let (entities, scoped) = dissect_actions(&a.sequence, after.under(anchor))?;
    Ok((entities, cursor.rejoin(scoped)))
}
