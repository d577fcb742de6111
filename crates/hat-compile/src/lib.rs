//! Script compiler
//!
//! Compiles an automation into a self-contained, positionally-driven
//! Python artifact with three sections: trigger evaluation, condition
//! evaluation, action execution. Each section is generated in lock-step
//! with the dissector's walk over the same fragments, so the entity list
//! and the generated slot reads always agree.
//!
//! The artifact is invoked with one argument, a serialized
//! `[trigger_inputs, condition_inputs, action_inputs]` list, and prints
//! one JSON result object on stdout.

mod action;
mod condition;
mod error;
mod prelude;
mod pylit;
mod trigger;
pub mod writer;

pub use action::compile_actions;
pub use condition::{compile_condition_expr, compile_conditions};
pub use error::{CompileError, CompileResult};
pub use trigger::compile_triggers;

use hat_dissect::AutomationEntities;
use hat_rule::Automation;
use tracing::debug;

/// A compiled automation: generated source plus the entity sections the
/// generation was driven by
#[derive(Debug, Clone)]
pub struct Artifact {
    pub automation_id: String,
    pub source: String,
    pub entities: AutomationEntities,
}

/// Accumulates generated source one closable section at a time.
///
/// Sections may be closed in any order; `finish` refuses to assemble a
/// script with an open section.
pub struct ScriptBuilder {
    automation_id: String,
    trigger: Option<String>,
    condition: Option<String>,
    action: Option<String>,
}

impl ScriptBuilder {
    pub fn new(automation_id: impl Into<String>) -> Self {
        Self {
            automation_id: automation_id.into(),
            trigger: None,
            condition: None,
            action: None,
        }
    }

    pub fn close_trigger_section(&mut self, source: String) {
        self.trigger = Some(source);
    }

    pub fn close_condition_section(&mut self, source: String) {
        self.condition = Some(source);
    }

    pub fn close_action_section(&mut self, source: String) {
        self.action = Some(source);
    }

    /// Assemble the final script: header, shared helpers, the three
    /// sections, entry point.
    pub fn finish(self) -> CompileResult<String> {
        let trigger = self.trigger.ok_or(CompileError::OpenSection("trigger"))?;
        let condition = self
            .condition
            .ok_or(CompileError::OpenSection("condition"))?;
        let action = self.action.ok_or(CompileError::OpenSection("action"))?;

        let mut source = String::new();
        source.push_str(&format!(
            "# Test artifact for automation '{}'. Generated file, do not edit.\n",
            self.automation_id
        ));
        source.push_str(prelude::PRELUDE);
        source.push_str("\n\n");
        source.push_str(&trigger);
        source.push_str("\n\n");
        source.push_str(&condition);
        source.push_str("\n\n");
        source.push_str(&action);
        source.push_str("\n\n");
        source.push_str(MAIN);
        Ok(source)
    }
}

const MAIN: &str = r#"def main():
    payload = json.loads(sys.argv[1])
    trigger_inputs, condition_inputs, action_inputs = payload
    trigger = check_trigger(trigger_inputs)
    condition = check_condition(condition_inputs, trigger.get("trigger_id"))
    try:
        action = run_action(action_inputs, trigger.get("trigger_id"))
    except InputError as exc:
        action = {"error": str(exc)}
    print(json.dumps({"trigger": trigger, "condition": condition, "action": action}))


if __name__ == "__main__":
    main()
"#;

/// Compile all three sections of an automation into one artifact
pub fn compile_automation(automation: &Automation) -> CompileResult<Artifact> {
    let (trigger_src, trigger_section) = compile_triggers(&automation.triggers)?;
    let (condition_src, condition_section) = compile_conditions(&automation.conditions)?;
    let (action_src, action_section) = compile_actions(&automation.actions)?;

    let mut builder = ScriptBuilder::new(&automation.id);
    builder.close_trigger_section(trigger_src);
    builder.close_condition_section(condition_src);
    builder.close_action_section(action_src);
    let source = builder.finish()?;

    debug!(
        automation = %automation.id,
        trigger_slots = trigger_section.input_slots(),
        condition_slots = condition_section.input_slots(),
        action_slots = action_section.input_slots(),
        "compiled artifact"
    );

    Ok(Artifact {
        automation_id: automation.id.clone(),
        source,
        entities: AutomationEntities {
            trigger: trigger_section,
            condition: condition_section,
            action: action_section,
        },
    })
}
