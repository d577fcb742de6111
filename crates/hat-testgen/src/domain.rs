//! Value domain declarations and their expansion
//!
//! A domain describes the values one entity's input slot should sweep:
//! a single value, enumerated options, a half-open numeric range, a
//! date/time range stepped by a unit-qualified duration, or a tuple of
//! independently ranged sub-fields.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::issue::DomainIssue;

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Step unit of a date/time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl StepUnit {
    fn duration(self, amount: i64) -> ChronoDuration {
        match self {
            StepUnit::Days => ChronoDuration::days(amount),
            StepUnit::Hours => ChronoDuration::hours(amount),
            StepUnit::Minutes => ChronoDuration::minutes(amount),
            StepUnit::Seconds => ChronoDuration::seconds(amount),
        }
    }
}

/// Per-entity value domain, dispatched by shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueDomain {
    /// Named sub-fields, each independently ranged, recombined into one
    /// mapping value per combination
    Tuple { fields: IndexMap<String, ValueDomain> },

    /// Enumerated options; expands to one value per option
    Options { options: Vec<Value> },

    /// Date/time range stepped by a unit-qualified duration
    DateRange {
        start: String,
        end: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<Value>,
        unit: StepUnit,
    },

    /// Half-open numeric range; integral inputs expand as integers,
    /// anything fractional as 2-decimal floats
    Range {
        start: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<Value>,
    },

    /// A single discrete value
    Single(Value),
}

impl ValueDomain {
    /// Expand the domain into concrete values.
    ///
    /// `entity` scopes any issue to the declaration being expanded.
    pub fn expand(&self, entity: &str) -> Result<Vec<Value>, DomainIssue> {
        match self {
            ValueDomain::Single(value) => Ok(vec![value.clone()]),
            ValueDomain::Options { options } => {
                if options.is_empty() {
                    Err(DomainIssue::new(entity, "options", "no options declared"))
                } else {
                    Ok(options.clone())
                }
            }
            ValueDomain::Range { start, end, step } => expand_range(entity, start, end, step),
            ValueDomain::DateRange {
                start,
                end,
                step,
                unit,
            } => expand_date_range(entity, start, end, step, *unit),
            ValueDomain::Tuple { fields } => expand_tuple(entity, fields),
        }
    }
}

fn as_number(entity: &str, field: &str, value: &Value) -> Result<f64, DomainIssue> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DomainIssue::new(entity, field, "not a finite number")),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| DomainIssue::new(entity, field, format!("'{s}' is not a number"))),
        other => Err(DomainIssue::new(
            entity,
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

fn is_integral(v: f64) -> bool {
    v.fract() == 0.0
}

/// Round to 2 decimals, away from accumulated float error
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn expand_range(
    entity: &str,
    start: &Value,
    end: &Option<Value>,
    step: &Option<Value>,
) -> Result<Vec<Value>, DomainIssue> {
    let start = as_number(entity, "start", start)?;
    let step = match step {
        Some(raw) => as_number(entity, "step", raw)?,
        None => 1.0,
    };
    if step <= 0.0 {
        return Err(DomainIssue::new(entity, "step", "step must be positive"));
    }

    let Some(end_raw) = end else {
        // No end bound: the range degenerates to its start value.
        return Ok(vec![number_value(start, is_integral(start))]);
    };
    let end = as_number(entity, "end", end_raw)?;
    if end < start {
        return Err(DomainIssue::new(entity, "end", "end is before start"));
    }

    let integral = is_integral(start) && is_integral(end) && is_integral(step);
    let mut values = Vec::new();
    let mut index: u64 = 0;
    loop {
        // Step counts multiply instead of accumulating, so long float
        // ranges do not drift.
        let v = start + step * index as f64;
        if v >= end {
            break;
        }
        values.push(number_value(if integral { v } else { round2(v) }, integral));
        index += 1;
    }
    Ok(values)
}

fn number_value(v: f64, integral: bool) -> Value {
    if integral {
        Value::Number((v as i64).into())
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// The three accepted date/time shapes, detected from the start field
#[derive(Clone, Copy, PartialEq)]
enum DateShape {
    DateTime,
    Date,
    Time,
}

fn parse_stamp(raw: &str) -> Option<(NaiveDateTime, DateShape)> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT) {
        return Some((dt, DateShape::DateTime));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some((d.and_time(NaiveTime::MIN), DateShape::Date));
    }
    if let Ok(t) = NaiveTime::parse_from_str(raw, TIME_FORMAT) {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
        return Some((epoch.and_time(t), DateShape::Time));
    }
    None
}

fn format_stamp(stamp: NaiveDateTime, shape: DateShape) -> String {
    match shape {
        DateShape::DateTime => stamp.format(DATE_TIME_FORMAT).to_string(),
        DateShape::Date => stamp.format(DATE_FORMAT).to_string(),
        DateShape::Time => stamp.format(TIME_FORMAT).to_string(),
    }
}

fn expand_date_range(
    entity: &str,
    start: &str,
    end: &str,
    step: &Option<Value>,
    unit: StepUnit,
) -> Result<Vec<Value>, DomainIssue> {
    let (start_stamp, shape) = parse_stamp(start).ok_or_else(|| {
        DomainIssue::new(entity, "start", format!("'{start}' matches no accepted format"))
    })?;
    let (end_stamp, end_shape) = parse_stamp(end).ok_or_else(|| {
        DomainIssue::new(entity, "end", format!("'{end}' matches no accepted format"))
    })?;
    if shape != end_shape {
        return Err(DomainIssue::new(
            entity,
            "end",
            "start and end use different formats",
        ));
    }
    if end_stamp < start_stamp {
        return Err(DomainIssue::new(entity, "end", "end is before start"));
    }

    let step = match step {
        Some(raw) => {
            let step = as_number(entity, "step", raw)?;
            if step <= 0.0 || !is_integral(step) {
                return Err(DomainIssue::new(
                    entity,
                    "step",
                    "step must be a positive whole number",
                ));
            }
            step as i64
        }
        None => 1,
    };

    let stride = unit.duration(step);
    let mut values = Vec::new();
    let mut cursor = start_stamp;
    while cursor < end_stamp {
        values.push(Value::String(format_stamp(cursor, shape)));
        cursor += stride;
    }
    Ok(values)
}

fn expand_tuple(
    entity: &str,
    fields: &IndexMap<String, ValueDomain>,
) -> Result<Vec<Value>, DomainIssue> {
    if fields.is_empty() {
        return Err(DomainIssue::new(entity, "fields", "no tuple fields declared"));
    }

    let mut expanded: Vec<(&String, Vec<Value>)> = Vec::with_capacity(fields.len());
    for (field, domain) in fields {
        let scoped = format!("{entity}.{field}");
        expanded.push((field, domain.expand(&scoped)?));
    }

    // Cartesian product over sub-fields, nested back into one mapping
    // value per combination.
    let mut combos: Vec<serde_json::Map<String, Value>> = vec![serde_json::Map::new()];
    for (field, values) in &expanded {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut grown = combo.clone();
                grown.insert((*field).clone(), value.clone());
                next.push(grown);
            }
        }
        combos = next;
    }

    Ok(combos.into_iter().map(Value::Object).collect())
}
