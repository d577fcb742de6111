//! Entity ID type representing a domain.object_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("domain cannot be empty")]
    EmptyDomain,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error("domain must be a lowercase slug without leading/trailing or double underscores")]
    InvalidDomainChars,

    #[error("object_id must be a lowercase slug without leading/trailing underscores")]
    InvalidObjectIdChars,
}

/// A referenced domain object, e.g. "sensor.temperature"
///
/// Both parts must be lowercase alphanumeric slugs. An entity id is the
/// stable key a rule uses to reference a domain object; the dissector
/// additionally uses successful parsing to tell entity references apart
/// from literal values inside constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    /// Create a new EntityId from domain and object_id parts
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        if domain.is_empty() {
            return Err(EntityIdError::EmptyDomain);
        }
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId);
        }
        if !Self::is_valid_domain(&domain) {
            return Err(EntityIdError::InvalidDomainChars);
        }
        if !Self::is_valid_object_id(&object_id) {
            return Err(EntityIdError::InvalidObjectIdChars);
        }

        Ok(Self { domain, object_id })
    }

    /// Get the domain part of the entity ID
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Get the object_id part of the entity ID
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// The dotted name with an attribute suffix, e.g. "sensor.hygro.humidity"
    pub fn with_attribute(&self, attribute: &str) -> String {
        format!("{}.{}.{}", self.domain, self.object_id, attribute)
    }

    /// Parse a value as an entity reference, if it looks like one.
    ///
    /// Returns `None` for anything that is not a well-formed dotted slug,
    /// which is how literal strings ("on", "below_horizon") are told apart
    /// from cross-entity references ("sensor.outdoor_temp").
    pub fn parse_ref(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    /// Object_id rule: lowercase alphanumeric + underscore, no leading/trailing _
    fn is_valid_object_id(s: &str) -> bool {
        if s.starts_with('_') || s.ends_with('_') {
            return false;
        }
        s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    /// Domain rule: same as object_id, plus no double underscores
    fn is_valid_domain(s: &str) -> bool {
        if s.contains("__") {
            return false;
        }
        Self::is_valid_object_id(s)
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, object_id) = match s.split_once('.') {
            Some(parts) => parts,
            None => return Err(EntityIdError::InvalidFormat),
        };
        if object_id.contains('.') {
            return Err(EntityIdError::InvalidFormat);
        }
        Self::new(domain, object_id)
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_entity_id() {
        let id = EntityId::new("light", "living_room").unwrap();
        assert_eq!(id.domain(), "light");
        assert_eq!(id.object_id(), "living_room");
        assert_eq!(id.to_string(), "light.living_room");
    }

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "sensor.temperature".parse().unwrap();
        assert_eq!(id.domain(), "sensor");
        assert_eq!(id.object_id(), "temperature");
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(
            "no_separator".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "too.many.parts".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
    }

    #[test]
    fn test_ref_detection() {
        assert!(EntityId::parse_ref("sensor.outdoor_temp").is_some());
        assert!(EntityId::parse_ref("on").is_none());
        assert!(EntityId::parse_ref("21.5").is_none());
        assert!(EntityId::parse_ref("below_horizon").is_none());
    }

    #[test]
    fn test_underscore_rules() {
        assert!("_light.room".parse::<EntityId>().is_err());
        assert!("light_.room".parse::<EntityId>().is_err());
        assert!("light._room".parse::<EntityId>().is_err());
        assert!("my__light.room".parse::<EntityId>().is_err());
        assert!("light.my__room".parse::<EntityId>().is_ok());
        assert!("my_light.living_room".parse::<EntityId>().is_ok());
    }

    #[test]
    fn test_with_attribute() {
        let id: EntityId = "climate.bedroom".parse().unwrap();
        assert_eq!(id.with_attribute("temperature"), "climate.bedroom.temperature");
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = EntityId::new("switch", "kitchen").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"switch.kitchen\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
