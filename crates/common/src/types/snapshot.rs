// vtrace - Loop-aware execution trace capture
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Step snapshots recorded by the sandbox.
//!
//! A [`Snapshot`] is one instrumented execution step of the guest program: the
//! event that fired, the function and source line it fired in, and every local
//! binding visible at that moment. Values arrive already serialized by the
//! companion interpreter, either as canonical JSON or as a textual fallback.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Line number reported for the synthetic wrapper header.
///
/// The guest body is wrapped in a generated callable, so the wrapper's own
/// `call` event sits one line above the first source line.
pub const WRAPPER_HEADER_LINE: usize = 0;

/// Kind of instrumentation event that produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// About to execute a new source line
    Line,
    /// Entering a traced frame
    Call,
    /// Leaving a traced frame
    Return,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::Call => write!(f, "call"),
            Self::Return => write!(f, "return"),
        }
    }
}

/// Serialized value of one variable binding.
///
/// Equality is structural on the serialized form, which is what the diffing
/// stage compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingValue {
    /// Canonical JSON encoding of the value (object keys sorted)
    Json(serde_json::Value),
    /// Textual fallback for values that could not be serialized
    Text(String),
}

impl BindingValue {
    /// Render the value the way it appears inside an encoded trace.
    ///
    /// JSON values render as the interpreter's `str()` of the decoded value,
    /// so `true` becomes `True` and `{"a": [1, null]}` becomes
    /// `{'a': [1, None]}`. Top-level strings render raw and text fallbacks
    /// verbatim.
    pub fn render(&self) -> String {
        match self {
            Self::Json(serde_json::Value::String(s)) => s.clone(),
            Self::Json(value) => {
                let mut out = String::new();
                write_python(&mut out, value);
                out
            }
            Self::Text(text) => text.clone(),
        }
    }

    /// Whether this value came from the textual fallback path
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// Append the interpreter's `repr()` of a decoded JSON value
fn write_python(out: &mut String, value: &serde_json::Value) {
    use serde_json::Value;

    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(number) => out.push_str(&python_number(number)),
        Value::String(s) => write_python_str(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_python(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_python_str(out, key);
                out.push_str(": ");
                write_python(out, item);
            }
            out.push('}');
        }
    }
}

/// Integers print as-is; floats follow the interpreter's `repr()`, which
/// switches to exponent form outside `1e-4 <= |x| < 1e16`
fn python_number(number: &serde_json::Number) -> String {
    match number.as_f64() {
        Some(float) if number.is_f64() => python_float(float),
        _ => number.to_string(),
    }
}

fn python_float(float: f64) -> String {
    // `{:e}` yields the shortest round-trip digits, e.g. `-1.25e-7`
    let scientific = format!("{float:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return float.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else { return float.to_string() };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };

    if !(-4..16).contains(&exponent) {
        let mark = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}e{mark}{:02}", exponent.unsigned_abs());
    }

    let digits = mantissa.replace('.', "");
    if exponent < 0 {
        let zeros = "0".repeat(exponent.unsigned_abs() as usize - 1);
        return format!("{sign}0.{zeros}{digits}");
    }
    let split = exponent as usize + 1;
    if digits.len() > split {
        format!("{sign}{}.{}", &digits[..split], &digits[split..])
    } else {
        format!("{sign}{digits}{}.0", "0".repeat(split - digits.len()))
    }
}

/// Quoted string literal, single-quoted unless only double quotes avoid escaping
fn write_python_str(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch == quote => {
                out.push('\\');
                out.push(ch);
            }
            ch if (ch as u32) < 0x20 || ch == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", ch as u32));
            }
            ch => out.push(ch),
        }
    }
    out.push(quote);
}

impl fmt::Display for BindingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<serde_json::Value> for BindingValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Local bindings captured at one step, ordered by variable name
pub type Bindings = BTreeMap<String, BindingValue>;

/// One recorded execution step. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Monotonic 1-based step order within the run
    pub order: u64,
    /// Event that fired
    pub event: EventKind,
    /// Name of the enclosing function
    pub function: String,
    /// Source line number (1-based; [`WRAPPER_HEADER_LINE`] for the wrapper header)
    pub line: usize,
    /// Captured local bindings
    pub bindings: Bindings,
}

impl Snapshot {
    /// Create a snapshot for a `line` event with the given bindings
    pub fn line(order: u64, function: impl Into<String>, line: usize, bindings: Bindings) -> Self {
        Self { order, event: EventKind::Line, function: function.into(), line, bindings }
    }

    /// Whether this snapshot was taken on the synthetic wrapper header
    pub fn is_wrapper_header(&self) -> bool {
        self.line == WRAPPER_HEADER_LINE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_json_string_raw() {
        let value = BindingValue::Json(json!("abc"));
        assert_eq!(value.render(), "abc");
    }

    #[test]
    fn test_render_json_as_interpreter_text() {
        assert_eq!(BindingValue::Json(json!(true)).render(), "True");
        assert_eq!(BindingValue::Json(json!(false)).render(), "False");
        assert_eq!(BindingValue::Json(json!(null)).render(), "None");
        assert_eq!(BindingValue::Json(json!([1, 2])).render(), "[1, 2]");
        assert_eq!(
            BindingValue::Json(json!({"a": 1, "b": [true, null]})).render(),
            "{'a': 1, 'b': [True, None]}"
        );
        assert_eq!(BindingValue::Json(json!(["x", "it's"])).render(), r#"['x', "it's"]"#);
        assert_eq!(BindingValue::Json(json!(["a\nb"])).render(), r"['a\nb']");
        assert_eq!(BindingValue::Json(json!(-3)).render(), "-3");
    }

    #[test]
    fn test_render_float_exponent() {
        let render = |value: f64| BindingValue::Json(json!(value)).render();
        assert_eq!(render(2.5), "2.5");
        assert_eq!(render(0.0), "0.0");
        assert_eq!(render(100.0), "100.0");
        assert_eq!(render(-0.125), "-0.125");
        assert_eq!(render(0.0001), "0.0001");
        assert_eq!(render(1e-5), "1e-05");
        assert_eq!(render(1e16), "1e+16");
        assert_eq!(render(-1.5e300), "-1.5e+300");
    }

    #[test]
    fn test_equality_ignores_rendering() {
        // Distinct canonical values may share a rendering
        assert_ne!(BindingValue::Json(json!("True")), BindingValue::Json(json!(true)));
        assert_eq!(
            BindingValue::Json(json!("True")).render(),
            BindingValue::Json(json!(true)).render()
        );
    }

    #[test]
    fn test_render_text_fallback() {
        let value = BindingValue::Text("<object at 0x1>".to_string());
        assert!(value.is_fallback());
        assert_eq!(value.to_string(), "<object at 0x1>");
    }

    #[test]
    fn test_binding_wire_format() {
        let value: BindingValue = serde_json::from_str(r#"{"json": 5}"#).unwrap();
        assert_eq!(value, BindingValue::Json(json!(5)));

        let value: BindingValue = serde_json::from_str(r#"{"text": "{1, 2}"}"#).unwrap();
        assert_eq!(value, BindingValue::Text("{1, 2}".to_string()));
    }

    #[test]
    fn test_event_kind_serde() {
        let kind: EventKind = serde_json::from_str("\"return\"").unwrap();
        assert_eq!(kind, EventKind::Return);
        assert_eq!(serde_json::to_string(&EventKind::Call).unwrap(), "\"call\"");
    }
}
