//! Test case generator
//!
//! Expands user-declared per-entity value domains into concrete values
//! and combines them, entity by entity in input-slot order, into the
//! Cartesian product of positional input vectors the compiled artifact
//! is driven with.
//!
//! Domain validation failures are field-scoped and recoverable: the
//! offending entity is excluded and reported, generation continues.

mod combine;
mod domain;
mod issue;

pub use combine::{combine, CombineOutcome, CombineRequest};
pub use domain::{StepUnit, ValueDomain};
pub use issue::DomainIssue;
