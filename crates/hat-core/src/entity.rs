//! The dissected Entity record
//!
//! Dissection flattens a rule tree into a position-indexed list of these
//! records. Structure survives only as `parent` back-references, so the
//! compiler and scheduler can address any entity by a stable integer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How an entity participates in the compiled artifact's calling convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterRole {
    /// Trigger-path entity; consumes a trigger-section input slot
    Start,

    /// Condition-path entity; consumes a condition-section input slot
    Input,

    /// Condition embedded inside an action branch/loop body
    ActionInput,

    /// Action target/result; never consumes a runtime input
    Output,
}

impl ParameterRole {
    /// Whether this role consumes a real_position slot
    pub fn consumes_input(self) -> bool {
        !matches!(self, ParameterRole::Output)
    }
}

/// One referenced domain object plus the constraint the rule places on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique slot assigned during the depth-first walk
    pub position: u32,

    /// Position of the nearest enclosing structural node, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,

    /// Role within the artifact's calling convention
    pub role: ParameterRole,

    /// Platform/domain the entity belongs to
    pub integration: String,

    /// Deterministically derived identifier (dotted)
    pub entity_name: String,

    /// Literal constraint parameters lifted verbatim from the rule.
    /// Insertion order is preserved so re-compilation stays byte-identical.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<IndexMap<String, serde_json::Value>>,
}

impl Entity {
    /// Create an entity with no constraint
    pub fn new(
        position: u32,
        parent: Option<u32>,
        role: ParameterRole,
        integration: impl Into<String>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            position,
            parent,
            role,
            integration: integration.into(),
            entity_name: entity_name.into(),
            expected_value: None,
        }
    }

    /// Attach constraint parameters
    pub fn with_expected(mut self, expected: IndexMap<String, serde_json::Value>) -> Self {
        if !expected.is_empty() {
            self.expected_value = Some(expected);
        }
        self
    }
}

/// Input-consuming entities of a list, in discovery order.
///
/// The index of an entity in the returned vector is its real_position
/// within the section the list was dissected for.
pub fn input_entities(entities: &[Entity]) -> Vec<&Entity> {
    entities.iter().filter(|e| e.role.consumes_input()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn test_role_slot_consumption() {
        assert!(ParameterRole::Start.consumes_input());
        assert!(ParameterRole::Input.consumes_input());
        assert!(ParameterRole::ActionInput.consumes_input());
        assert!(!ParameterRole::Output.consumes_input());
    }

    #[test]
    fn test_empty_expected_stays_none() {
        let entity = Entity::new(1, None, ParameterRole::Start, "sensor", "sensor.temp")
            .with_expected(indexmap! {});
        assert!(entity.expected_value.is_none());
    }

    #[test]
    fn test_input_entities_ordering() {
        let entities = vec![
            Entity::new(1, None, ParameterRole::Start, "sensor", "sensor.a"),
            Entity::new(2, None, ParameterRole::Output, "light", "light.b"),
            Entity::new(3, None, ParameterRole::Input, "sensor", "sensor.c"),
        ];
        let inputs = input_entities(&entities);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].entity_name, "sensor.a");
        assert_eq!(inputs[1].entity_name, "sensor.c");
    }
}
