//! Rendering constraint values as Python literals
//!
//! Baked-in constants must be legal Python source. JSON string escaping
//! is a subset of Python's, so strings reuse the serde encoder; null and
//! booleans need the spelling swap.

use indexmap::IndexMap;
use serde_json::Value;

/// Render one value as a Python literal
pub fn py_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => py_str(s),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(py_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", py_str(k), py_literal(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

/// Render a string as a quoted Python literal
pub fn py_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Render an insertion-ordered constraint map as a Python dict literal
pub fn py_dict(map: &IndexMap<String, Value>) -> String {
    let rendered: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{}: {}", py_str(k), py_literal(v)))
        .collect();
    format!("{{{}}}", rendered.join(", "))
}

/// Render a list of strings as a Python tuple literal.
///
/// A one-element tuple keeps its trailing comma.
pub fn py_tuple(values: &[&str]) -> String {
    let rendered: Vec<String> = values.iter().map(|v| py_str(v)).collect();
    if rendered.len() == 1 {
        format!("({},)", rendered[0])
    } else {
        format!("({})", rendered.join(", "))
    }
}
