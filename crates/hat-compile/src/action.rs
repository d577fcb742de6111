//! Action section compiler
//!
//! Emits Python statements that honor branch/loop semantics over the
//! baked action structure: guards read ActionInput slots, every executed
//! Output entity appends one record. Record order is execution order.

use hat_core::{Cursor, Entity, ParameterRole};
use hat_dissect::{dissect_action, DissectResult, Section};
use hat_rule::action::{ChooseAction, IfAction, RepeatConfig};
use hat_rule::{Action, Condition};

use crate::condition::compile_condition_expr;
use crate::pylit::py_dict;

/// Compile the action section, returning its source and the section walk
pub fn compile_actions(actions: &[Action]) -> DissectResult<(String, Section)> {
    let mut emitter = Emitter {
        lines: vec![
            "def run_action(inputs, trigger_id=None):".to_string(),
            "    records = []".to_string(),
        ],
        entities: Vec::new(),
    };

    let ctx = Ctx {
        indent: 1,
        repeat: None,
    };
    let end = emitter.emit_actions(actions, Cursor::start(), &ctx)?;
    emitter.lines.push("    return records".to_string());

    Ok((
        emitter.lines.join("\n") + "\n",
        Section {
            entities: emitter.entities,
            end,
        },
    ))
}

/// Emission context: current indent and the repeat tag expression in
/// scope, when inside a repeat body
#[derive(Clone)]
struct Ctx {
    indent: usize,
    repeat: Option<String>,
}

impl Ctx {
    fn pad(&self) -> String {
        "    ".repeat(self.indent)
    }

    fn deeper(&self) -> Ctx {
        Ctx {
            indent: self.indent + 1,
            repeat: self.repeat.clone(),
        }
    }

    fn with_repeat(&self, tag: String) -> Ctx {
        Ctx {
            indent: self.indent + 1,
            repeat: Some(tag),
        }
    }
}

struct Emitter {
    lines: Vec<String>,
    entities: Vec<Entity>,
}

impl Emitter {
    fn emit_actions(
        &mut self,
        actions: &[Action],
        cursor: Cursor,
        ctx: &Ctx,
    ) -> DissectResult<Cursor> {
        let mut cursor = cursor;
        for action in actions {
            cursor = self.emit_action(action, cursor, ctx)?;
        }
        Ok(cursor)
    }

    /// Emit one action's statements, advancing the cursor exactly as the
    /// dissector does.
    fn emit_action(&mut self, action: &Action, cursor: Cursor, ctx: &Ctx) -> DissectResult<Cursor> {
        if !action.enabled() {
            return Ok(cursor);
        }

        match action {
            Action::Service(_) | Action::Delay(_) | Action::Event(_) => {
                let (entities, end) = dissect_action(action, cursor)?;
                for entity in &entities {
                    self.emit_record(entity, ctx);
                }
                self.entities.extend(entities);
                Ok(end)
            }

            Action::Stop(_) => {
                let (entities, end) = dissect_action(action, cursor)?;
                for entity in &entities {
                    self.emit_record(entity, ctx);
                }
                self.entities.extend(entities);
                self.lines.push(format!("{}return records", ctx.pad()));
                Ok(end)
            }

            Action::Condition(condition) => {
                let (expr, entities, end) =
                    compile_condition_expr(condition, ParameterRole::ActionInput, cursor)?;
                if let Some(expr) = expr {
                    self.lines.push(format!("{}if not ({expr}):", ctx.pad()));
                    self.lines
                        .push(format!("{}    return records", ctx.pad()));
                }
                self.entities.extend(entities);
                Ok(end)
            }

            Action::If(a) => self.emit_if(a, cursor, ctx),
            Action::Choose(a) => self.emit_choose(a, cursor, ctx),
            Action::Repeat(a) => {
                let (anchor, after) = cursor.reserve();
                let scoped = after.under(anchor);
                let scoped = self.emit_repeat(&a.repeat, anchor, scoped, ctx)?;
                Ok(cursor.rejoin(scoped))
            }

            Action::Parallel(a) => {
                let (anchor, after) = cursor.reserve();
                let scoped = self.emit_actions(&a.parallel, after.under(anchor), ctx)?;
                Ok(cursor.rejoin(scoped))
            }

            Action::Sequence(a) => {
                let (anchor, after) = cursor.reserve();
                let scoped = self.emit_actions(&a.sequence, after.under(anchor), ctx)?;
                Ok(cursor.rejoin(scoped))
            }
        }
    }

    fn emit_record(&mut self, entity: &Entity, ctx: &Ctx) {
        let expected = entity
            .expected_value
            .as_ref()
            .map(|map| format!(", \"expected\": {}", py_dict(map)))
            .unwrap_or_default();
        let repeat = ctx
            .repeat
            .as_ref()
            .map(|tag| format!(", \"repeat\": {tag}"))
            .unwrap_or_default();

        self.lines.push(format!(
            "{}records.append({{\"position\": {}, \"entity\": {}{expected}{repeat}}})",
            ctx.pad(),
            entity.position,
            crate::pylit::py_str(&entity.entity_name),
        ));
    }

    /// Body that produced no statements still needs one for Python
    fn emit_body(
        &mut self,
        actions: &[Action],
        cursor: Cursor,
        ctx: &Ctx,
    ) -> DissectResult<Cursor> {
        let before = self.lines.len();
        let end = self.emit_actions(actions, cursor, ctx)?;
        if self.lines.len() == before {
            self.lines.push(format!("{}pass", ctx.pad()));
        }
        Ok(end)
    }

    fn guard_expr(
        &mut self,
        conditions: &[Condition],
        cursor: Cursor,
    ) -> DissectResult<(String, Cursor)> {
        let mut cursor = cursor;
        let mut exprs = Vec::new();
        for condition in conditions {
            let (expr, entities, end) =
                compile_condition_expr(condition, ParameterRole::ActionInput, cursor)?;
            if let Some(expr) = expr {
                exprs.push(expr);
            }
            self.entities.extend(entities);
            cursor = end;
        }
        let combined = if exprs.is_empty() {
            "True".to_string()
        } else {
            exprs.join(" and ")
        };
        Ok((combined, cursor))
    }

    fn emit_if(&mut self, a: &IfAction, cursor: Cursor, ctx: &Ctx) -> DissectResult<Cursor> {
        let (anchor, after) = cursor.reserve();
        let scoped = after.under(anchor);

        let (guard, scoped) = self.guard_expr(&a.r#if, scoped)?;
        self.lines.push(format!("{}if {guard}:", ctx.pad()));
        let scoped = self.emit_body(&a.then, scoped, &ctx.deeper())?;

        let scoped = if a.r#else.is_empty() {
            scoped
        } else {
            self.lines.push(format!("{}else:", ctx.pad()));
            self.emit_body(&a.r#else, scoped, &ctx.deeper())?
        };

        Ok(cursor.rejoin(scoped))
    }

    fn emit_choose(
        &mut self,
        a: &ChooseAction,
        cursor: Cursor,
        ctx: &Ctx,
    ) -> DissectResult<Cursor> {
        let (anchor, after) = cursor.reserve();
        let mut scoped = after.under(anchor);

        for (index, option) in a.choose.iter().enumerate() {
            let (guard, next) = self.guard_expr(&option.conditions, scoped)?;
            let keyword = if index == 0 { "if" } else { "elif" };
            self.lines.push(format!("{}{keyword} {guard}:", ctx.pad()));
            scoped = self.emit_body(&option.sequence, next, &ctx.deeper())?;
        }

        if !a.default.is_empty() {
            if a.choose.is_empty() {
                scoped = self.emit_actions(&a.default, scoped, ctx)?;
            } else {
                self.lines.push(format!("{}else:", ctx.pad()));
                scoped = self.emit_body(&a.default, scoped, &ctx.deeper())?;
            }
        }

        Ok(cursor.rejoin(scoped))
    }

    fn emit_repeat(
        &mut self,
        config: &RepeatConfig,
        anchor: u32,
        cursor: Cursor,
        ctx: &Ctx,
    ) -> DissectResult<Cursor> {
        match config {
            RepeatConfig::Count { count, sequence } => {
                self.lines
                    .push(format!("{}for _ in range({count}):", ctx.pad()));
                self.emit_body(sequence, cursor, &ctx.with_repeat(count.to_string()))
            }

            RepeatConfig::While { r#while, sequence } => {
                // Inputs are fixed per run: a true guard would loop
                // forever, so the body is included once, tagged infinite.
                let (guard, cursor) = self.guard_expr(r#while, cursor)?;
                self.lines.push(format!("{}if {guard}:", ctx.pad()));
                self.emit_body(
                    sequence,
                    cursor,
                    &ctx.with_repeat("\"infinite\"".to_string()),
                )
            }

            RepeatConfig::Until { until, sequence } => {
                // The body runs at least once; a guard that never turns
                // true would repeat forever.
                let (guard, cursor) = self.guard_expr(until, cursor)?;
                self.lines
                    .push(format!("{}_done_{anchor} = {guard}", ctx.pad()));
                let tag = format!("1 if _done_{anchor} else \"infinite\"");
                let before = self.lines.len();
                let end = self.emit_actions(sequence, cursor, &Ctx {
                    indent: ctx.indent,
                    repeat: Some(tag),
                })?;
                if self.lines.len() == before {
                    self.lines.push(format!("{}pass", ctx.pad()));
                }
                Ok(end)
            }
        }
    }
}
