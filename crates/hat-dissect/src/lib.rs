//! Entity dissector
//!
//! Walks a rule tree depth-first and flattens it into a position-addressed
//! list of [`Entity`] records: the referenced domain objects plus the
//! constraints the rule places on them. Structure survives only as
//! `parent` back-references to the one position each combinator, branch or
//! loop node reserves for itself.
//!
//! Every per-kind function is pure and shares one contract: take a
//! fragment and a [`Cursor`], return the discovered entities and the
//! advanced cursor. Disabled or unrecognized fragments return the cursor
//! untouched.
//!
//! # Key Operations
//!
//! - [`dissect_trigger`] / [`dissect_triggers`] - Start-role entities
//! - [`dissect_condition`] / [`dissect_conditions`] - Input-role entities
//! - [`dissect_action`] / [`dissect_actions`] - ActionInput and Output entities
//! - [`dissect_automation`] - all three section walks of one automation

mod action;
mod condition;
mod error;
mod support;
mod trigger;

pub use action::{dissect_action, dissect_actions};
pub use condition::{dissect_condition, dissect_conditions};
pub use error::{DissectError, DissectResult};
pub use support::slugify;
pub use trigger::{dissect_trigger, dissect_triggers};

use hat_core::{Cursor, Entity, ParameterRole};
use hat_rule::Automation;

/// Entities and end cursor of one section walk
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub entities: Vec<Entity>,
    pub end: Cursor,
}

impl Section {
    /// Number of runtime input slots the section consumes
    pub fn input_slots(&self) -> u32 {
        self.end.real_position
    }
}

/// The three section walks of one automation
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationEntities {
    pub trigger: Section,
    pub condition: Section,
    pub action: Section,
}

impl AutomationEntities {
    /// All entities of all sections, trigger first, in walk order
    pub fn all(&self) -> impl Iterator<Item = &Entity> {
        self.trigger
            .entities
            .iter()
            .chain(&self.condition.entities)
            .chain(&self.action.entities)
    }
}

/// Dissect every section of an automation.
///
/// Each section is an independent walk starting from position 1 and input
/// slot 0; the order entities are discovered in is the contract the
/// compiled artifact and the generated input vectors agree on.
pub fn dissect_automation(automation: &Automation) -> DissectResult<AutomationEntities> {
    let (trigger_entities, trigger_end) = dissect_triggers(&automation.triggers, Cursor::start())?;
    let (condition_entities, condition_end) = dissect_conditions(
        &automation.conditions,
        ParameterRole::Input,
        Cursor::start(),
    )?;
    let (action_entities, action_end) = dissect_actions(&automation.actions, Cursor::start())?;

    tracing::debug!(
        automation = %automation.id,
        trigger_entities = trigger_entities.len(),
        condition_entities = condition_entities.len(),
        action_entities = action_entities.len(),
        "dissected automation"
    );

    Ok(AutomationEntities {
        trigger: Section {
            entities: trigger_entities,
            end: trigger_end,
        },
        condition: Section {
            entities: condition_entities,
            end: condition_end,
        },
        action: Section {
            entities: action_entities,
            end: action_end,
        },
    })
}
