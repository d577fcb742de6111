//! Field-scoped domain validation issues

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One malformed domain declaration, reported to the caller and excluded
/// from the combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("invalid value domain for {entity} ({field}): {reason}")]
pub struct DomainIssue {
    /// Entity the domain was declared for
    pub entity: String,

    /// The offending field within the declaration
    pub field: String,

    /// What was wrong with it
    pub reason: String,
}

impl DomainIssue {
    pub fn new(
        entity: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}
