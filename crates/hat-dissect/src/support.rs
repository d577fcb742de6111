//! Shared helpers for the per-kind dissection functions

use hat_core::{Cursor, Entity, EntityId, ParameterRole};
use indexmap::IndexMap;
use serde_json::Value;

/// Reduce free-form source text (topics, webhook ids, device ids) to a
/// slug usable as the object part of a synthesized entity name.
pub fn slugify(raw: &str) -> String {
    let mut slug: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect();
    while slug.contains("__") {
        slug = slug.replace("__", "_");
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug.to_string()
    }
}

/// Builder for the verbatim constraint map of one entity
#[derive(Debug, Default)]
pub struct Expected(IndexMap<String, Value>);

impl Expected {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a constraint parameter
    pub fn put(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Insert only when present
    pub fn put_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.put(key, v),
            None => self,
        }
    }

    pub fn into_map(self) -> IndexMap<String, Value> {
        self.0
    }
}

/// Emit one input-consuming entity, advancing the cursor
pub fn push_input_entity(
    entities: &mut Vec<Entity>,
    cursor: Cursor,
    role: ParameterRole,
    integration: &str,
    entity_name: &str,
    expected: Expected,
) -> Cursor {
    let (position, cursor) = cursor.reserve();
    let (_, cursor) = cursor.claim_input();
    entities.push(
        Entity::new(position, cursor.parent, role, integration, entity_name)
            .with_expected(expected.into_map()),
    );
    cursor
}

/// Emit one Output entity (no input slot), advancing the cursor
pub fn push_output_entity(
    entities: &mut Vec<Entity>,
    cursor: Cursor,
    integration: &str,
    entity_name: &str,
    expected: Expected,
) -> Cursor {
    let (position, cursor) = cursor.reserve();
    entities.push(
        Entity::new(
            position,
            cursor.parent,
            ParameterRole::Output,
            integration,
            entity_name,
        )
        .with_expected(expected.into_map()),
    );
    cursor
}

/// Reserve a group anchor when a multi-valued field has more than one
/// element; a single element short-circuits with no position reserved.
pub fn group_scope(cursor: Cursor, len: usize) -> Cursor {
    if len > 1 {
        let (anchor, cursor) = cursor.reserve();
        cursor.under(anchor)
    } else {
        cursor
    }
}

/// Integration (domain) of a dotted entity name
pub fn integration_of(entity_name: &str) -> String {
    entity_name
        .split('.')
        .next()
        .unwrap_or(entity_name)
        .to_string()
}

/// Try to read a constraint value as a cross-entity reference
pub fn as_entity_ref(value: &str) -> Option<EntityId> {
    EntityId::parse_ref(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("home/garden/moisture"), "home_garden_moisture");
        assert_eq!(slugify("Front Door NFC"), "front_door_nfc");
        assert_eq!(slugify("--"), "unnamed");
        assert_eq!(slugify("abc123"), "abc123");
    }

    #[test]
    fn test_group_scope() {
        let single = group_scope(Cursor::start(), 1);
        assert_eq!(single, Cursor::start());

        let grouped = group_scope(Cursor::start(), 3);
        assert_eq!(grouped.position, 2);
        assert_eq!(grouped.parent, Some(1));
    }

    #[test]
    fn test_expected_builder() {
        let map = Expected::new()
            .put("above", 20)
            .put_opt("below", None::<i64>)
            .put_opt("for", Some("00:01:00"))
            .into_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_index(0).unwrap().0, "above");
    }
}
