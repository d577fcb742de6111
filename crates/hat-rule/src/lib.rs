//! Rule-description model
//!
//! This crate models the declarative automation format the test bench
//! ingests: triggers, conditions, actions, and the automation metadata
//! around them. The model is the input contract of the dissector and
//! compiler; kind tags and field names follow the home-automation
//! vocabulary the rules are written in.
//!
//! # Key Types
//!
//! - [`Trigger`] - event detector fragment
//! - [`Condition`] - state test fragment, including and/or/not combinators
//! - [`Action`] - task fragment, including branch/loop constructs
//! - [`Automation`] - complete rule plus admission metadata
//! - [`loader`] - thin YAML/JSON file loader

pub mod action;
pub mod automation;
pub mod condition;
pub mod loader;
pub mod trigger;

pub use action::{Action, ChooseOption, RepeatConfig, ServiceAction, Target};
pub use automation::{AdmissionMode, Automation, AutomationConfig};
pub use condition::Condition;
pub use loader::{LoadError, LoadResult};
pub use trigger::{EntityIdSpec, NumericValue, StateMatch, TimeSpec, Trigger};
