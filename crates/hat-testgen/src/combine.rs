//! Cartesian combination of expanded domains into test cases

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use hat_core::{input_entities, Entity, Priority, TestCase};

use crate::domain::ValueDomain;
use crate::issue::DomainIssue;

/// What to combine: the three entity sections of one automation plus the
/// batch-uniform case metadata
#[derive(Debug, Clone)]
pub struct CombineRequest<'a> {
    pub automation_id: &'a str,
    pub trigger_entities: &'a [Entity],
    pub condition_entities: &'a [Entity],
    pub action_entities: &'a [Entity],
    pub requirement: Option<String>,
    pub priority: Priority,
}

/// Generated cases plus any field-scoped declaration issues
#[derive(Debug, Clone)]
pub struct CombineOutcome {
    pub cases: Vec<TestCase>,
    pub issues: Vec<DomainIssue>,
}

/// One input slot awaiting combination
struct Slot {
    section: usize,
    values: Vec<Value>,
}

/// Expand every input-consuming entity's domain and build the Cartesian
/// product across all of them, in input-slot order.
///
/// An entity without a declared domain, or with a malformed one, is
/// reported and excluded: its slot holds null in every generated case.
pub fn combine(
    request: &CombineRequest<'_>,
    domains: &HashMap<String, ValueDomain>,
) -> CombineOutcome {
    let sections = [
        request.trigger_entities,
        request.condition_entities,
        request.action_entities,
    ];

    let mut slots = Vec::new();
    let mut issues = Vec::new();

    for (section, entities) in sections.iter().enumerate() {
        for entity in input_entities(entities) {
            let values = match domains.get(&entity.entity_name) {
                None => {
                    issues.push(DomainIssue::new(
                        entity.entity_name.clone(),
                        "domain",
                        "no value domain declared",
                    ));
                    vec![Value::Null]
                }
                Some(domain) => match domain.expand(&entity.entity_name) {
                    Ok(values) => values,
                    Err(issue) => {
                        warn!(%issue, "excluding entity from combination");
                        issues.push(issue);
                        vec![Value::Null]
                    }
                },
            };
            slots.push(Slot { section, values });
        }
    }

    let total: usize = slots.iter().map(|s| s.values.len()).product();
    debug!(
        automation = request.automation_id,
        slots = slots.len(),
        cases = total,
        "combining value domains"
    );

    // An empty expansion (a half-open range with start == end) empties
    // the whole product.
    if total == 0 {
        return CombineOutcome {
            cases: Vec::new(),
            issues,
        };
    }

    let mut cases = Vec::with_capacity(total);
    // Odometer over the slots: the last slot varies fastest.
    let mut indices = vec![0usize; slots.len()];
    loop {
        let mut inputs: [Vec<Value>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for (slot, &index) in slots.iter().zip(&indices) {
            inputs[slot.section].push(slot.values[index].clone());
        }
        let [trigger_inputs, condition_inputs, action_inputs] = inputs;

        cases.push(TestCase {
            id: ulid::Ulid::new().to_string(),
            automation_id: request.automation_id.to_string(),
            requirement: request.requirement.clone(),
            priority: request.priority,
            trigger_inputs,
            condition_inputs,
            action_inputs,
            created_at: Utc::now(),
        });

        // Advance the odometer; done when it wraps.
        let mut wrapped = true;
        for position in (0..slots.len()).rev() {
            indices[position] += 1;
            if indices[position] < slots[position].values.len() {
                wrapped = false;
                break;
            }
            indices[position] = 0;
        }
        if wrapped || slots.is_empty() {
            break;
        }
    }

    CombineOutcome { cases, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hat_core::ParameterRole;
    use serde_json::json;

    fn entity(name: &str, role: ParameterRole) -> Entity {
        Entity::new(1, None, role, "sensor", name)
    }

    fn domains(pairs: &[(&str, Value)]) -> HashMap<String, ValueDomain> {
        pairs
            .iter()
            .map(|(name, raw)| {
                (
                    name.to_string(),
                    serde_json::from_value(raw.clone()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_cartesian_completeness() {
        let trigger = vec![entity("sensor.t", ParameterRole::Start)];
        let condition = vec![entity("binary_sensor.home", ParameterRole::Input)];
        let request = CombineRequest {
            automation_id: "a1",
            trigger_entities: &trigger,
            condition_entities: &condition,
            action_entities: &[],
            requirement: Some("REQ-1".to_string()),
            priority: Priority::High,
        };

        let outcome = combine(
            &request,
            &domains(&[
                ("sensor.t", json!({"start": 18, "end": 22})),
                ("binary_sensor.home", json!({"options": ["on", "off"]})),
            ]),
        );

        // 4 temperatures x 2 states
        assert_eq!(outcome.cases.len(), 8);
        assert!(outcome.issues.is_empty());
        for case in &outcome.cases {
            assert_eq!(case.trigger_inputs.len(), 1);
            assert_eq!(case.condition_inputs.len(), 1);
            assert!(case.action_inputs.is_empty());
            assert_eq!(case.requirement.as_deref(), Some("REQ-1"));
            assert_eq!(case.priority, Priority::High);
        }

        // First slot varies slowest: first four cases share temp 18.
        assert_eq!(outcome.cases[0].trigger_inputs[0], json!(18));
        assert_eq!(outcome.cases[0].condition_inputs[0], json!("on"));
        assert_eq!(outcome.cases[1].condition_inputs[0], json!("off"));
        assert_eq!(outcome.cases[2].trigger_inputs[0], json!(19));
    }

    #[test]
    fn test_output_entities_consume_no_slot() {
        let action = vec![entity("light.porch", ParameterRole::Output)];
        let request = CombineRequest {
            automation_id: "a1",
            trigger_entities: &[],
            condition_entities: &[],
            action_entities: &action,
            requirement: None,
            priority: Priority::default(),
        };

        let outcome = combine(&request, &HashMap::new());
        assert_eq!(outcome.cases.len(), 1);
        assert!(outcome.cases[0].action_inputs.is_empty());
    }

    #[test]
    fn test_malformed_domain_excluded_not_fatal() {
        let trigger = vec![
            entity("sensor.bad", ParameterRole::Start),
            entity("sensor.good", ParameterRole::Start),
        ];
        let request = CombineRequest {
            automation_id: "a1",
            trigger_entities: &trigger,
            condition_entities: &[],
            action_entities: &[],
            requirement: None,
            priority: Priority::default(),
        };

        let outcome = combine(
            &request,
            &domains(&[
                ("sensor.bad", json!({"start": 0, "end": 10, "step": 0})),
                ("sensor.good", json!({"options": [1, 2, 3]})),
            ]),
        );

        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].entity, "sensor.bad");
        // The bad slot is pinned to null; the good one still sweeps.
        assert_eq!(outcome.cases.len(), 3);
        assert!(outcome
            .cases
            .iter()
            .all(|c| c.trigger_inputs[0] == Value::Null));
    }

    #[test]
    fn test_missing_domain_reported() {
        let trigger = vec![entity("sensor.unknown", ParameterRole::Start)];
        let request = CombineRequest {
            automation_id: "a1",
            trigger_entities: &trigger,
            condition_entities: &[],
            action_entities: &[],
            requirement: None,
            priority: Priority::default(),
        };

        let outcome = combine(&request, &HashMap::new());
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].field, "domain");
        assert_eq!(outcome.cases.len(), 1);
    }

    #[test]
    fn test_empty_expansion_empties_the_product() {
        let trigger = vec![
            entity("sensor.a", ParameterRole::Start),
            entity("sensor.b", ParameterRole::Start),
        ];
        let request = CombineRequest {
            automation_id: "a1",
            trigger_entities: &trigger,
            condition_entities: &[],
            action_entities: &[],
            requirement: None,
            priority: Priority::default(),
        };

        let outcome = combine(
            &request,
            &domains(&[
                ("sensor.a", json!({"start": 5, "end": 5})),
                ("sensor.b", json!({"options": [1, 2]})),
            ]),
        );

        assert!(outcome.cases.is_empty());
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn test_no_input_slots_yields_one_case() {
        let request = CombineRequest {
            automation_id: "a1",
            trigger_entities: &[],
            condition_entities: &[],
            action_entities: &[],
            requirement: None,
            priority: Priority::default(),
        };

        let outcome = combine(&request, &HashMap::new());
        assert_eq!(outcome.cases.len(), 1);
    }
}
