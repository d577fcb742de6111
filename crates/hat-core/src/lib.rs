//! Core types for the automation test bench
//!
//! This crate provides the fundamental types shared by every subsystem:
//! EntityId, the dissected Entity record, the Cursor threaded through the
//! rule walk, the TestCase input vectors, and the artifact wire shapes.

mod artifact;
mod case;
mod cursor;
mod entity;
mod entity_id;

pub use artifact::{
    ActionRecord, ActionReport, ArtifactReport, ConditionReport, RepeatTag, TriggerReport,
};
pub use case::{CaseOutcome, CaseStatus, Priority, TestCase};
pub use cursor::Cursor;
pub use entity::{input_entities, Entity, ParameterRole};
pub use entity_id::{EntityId, EntityIdError};

/// Synthesized object id for a multi-entity service-call target
pub const TARGET_GROUP: &str = "target_group";

/// Condition section verdict strings emitted by compiled artifacts
pub mod verdict {
    pub const PASS: &str = "pass";
    pub const FAIL: &str = "fail";
    pub const ERROR: &str = "error";
}
