//! JSON output serialization for Sorrel query language values.
//!
//! This module provides JSON serialization with support for both compact and
//! pretty-printed output formats. Output is deterministic: object keys appear
//! in their insertion order, which the engine preserves end to end. The
//! compact form is the canonical serialization used by the `string()`
//! builtin and by key stringification in `groupBy`, `keyBy` and `uniqBy`.
//!
//! # Examples
//!
//! ```
//! use sorrel_lang::Value;
//! use sorrel_lang::output::{to_json, to_json_pretty};
//!
//! let value = Value::Number(42.0);
//!
//! // Compact output
//! assert_eq!(to_json(&value), "42");
//!
//! // Pretty output (identical for simple values)
//! assert_eq!(to_json_pretty(&value), "42");
//! ```

use crate::value::Value;
use indexmap::IndexMap;

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    pub fn print(&self, value: &Value) -> String {
        let mut out = String::new();
        self.write_value(value, 0, &mut out);
        out
    }

    fn write_value(&self, value: &Value, level: usize, out: &mut String) {
        match value {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => write_number(*n, out),
            Value::String(s) => write_escaped(s, out),
            Value::Array(arr) => self.write_array(arr, level, out),
            Value::Object(obj) => self.write_object(obj, level, out),
        }
    }

    fn write_array(&self, arr: &[Value], level: usize, out: &mut String) {
        if arr.is_empty() {
            out.push_str("[]");
            return;
        }
        out.push('[');
        for (i, item) in arr.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            self.break_line(level + 1, out);
            self.write_value(item, level + 1, out);
        }
        self.break_line(level, out);
        out.push(']');
    }

    fn write_object(&self, obj: &IndexMap<String, Value>, level: usize, out: &mut String) {
        if obj.is_empty() {
            out.push_str("{}");
            return;
        }
        out.push('{');
        for (i, (key, value)) in obj.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            self.break_line(level + 1, out);
            write_escaped(key, out);
            out.push(':');
            if self.pretty {
                out.push(' ');
            }
            self.write_value(value, level + 1, out);
        }
        self.break_line(level, out);
        out.push('}');
    }

    // In pretty mode every element starts on its own indented line;
    // compact mode emits nothing here
    fn break_line(&self, level: usize, out: &mut String) {
        if self.pretty {
            out.push('\n');
            for _ in 0..level {
                out.push_str("  ");
            }
        }
    }
}

/// Format a number the way `Display` for `f64` does (shortest round-trip,
/// integral values without a trailing `.0`). Non-finite numbers have no
/// JSON form and print as null.
fn write_number(n: f64, out: &mut String) {
    if n.is_finite() {
        out.push_str(&n.to_string());
    } else {
        out.push_str("null");
    }
}

/// Write a string in quoted JSON form, escaping quotes, backslashes and
/// control characters.
fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

// Convenience functions

/// Converts a Value to compact JSON string representation.
///
/// This is the canonical serialization: no extra whitespace, object keys in
/// insertion order, proper string escaping.
///
/// # Examples
///
/// ```
/// use sorrel_lang::Value;
/// use sorrel_lang::output::to_json;
/// use serde_json::json;
///
/// let value = Value::from_json(json!({"name": "Alice", "age": 30}));
/// assert_eq!(to_json(&value), r#"{"name":"Alice","age":30}"#);
/// ```
pub fn to_json(value: &Value) -> String {
    JsonPrinter::new(false).print(value)
}

/// Converts a Value to pretty-printed JSON string representation.
///
/// Produces human-readable output with 2-space indentation, one element or
/// property per line, object keys in insertion order.
///
/// # Examples
///
/// ```
/// use sorrel_lang::Value;
/// use sorrel_lang::output::to_json_pretty;
/// use serde_json::json;
///
/// let value = Value::from_json(json!({"age": 30}));
/// assert_eq!(to_json_pretty(&value), "{\n  \"age\": 30\n}");
/// ```
pub fn to_json_pretty(value: &Value) -> String {
    JsonPrinter::new(true).print(value)
}

#[test]
fn test_escaping_and_nesting() {
    let value = Value::from_json(serde_json::json!({
        "a\"b": ["x\ny", "\u{0001}"],
        "empty": {}
    }));
    assert_eq!(
        to_json(&value),
        r#"{"a\"b":["x\ny","\u0001"],"empty":{}}"#
    );
}

#[test]
fn test_pretty_layout() {
    let value = Value::from_json(serde_json::json!({"items": [1.5, null]}));
    assert_eq!(
        to_json_pretty(&value),
        "{\n  \"items\": [\n    1.5,\n    null\n  ]\n}"
    );
}
