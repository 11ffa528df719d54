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

//! Wire format spoken between the sandbox and its companion harness.

use serde::{Deserialize, Serialize};
use vtrace_common::types::{Bindings, EventKind, Snapshot};

/// Source of the companion harness executed by the interpreter
pub const HARNESS_SOURCE: &str = include_str!("harness.py");

/// Request written to the harness's stdin
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest<'a> {
    /// Subject source text
    pub source: &'a str,
    /// Ordered raw input lines
    pub inputs: &'a [String],
    /// Maximum number of captured steps
    pub step_budget: usize,
    /// Whether frames of functions defined in the subject are traced too
    pub trace_nested: bool,
}

/// Terminal status reported by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishedStatus {
    /// The subject returned normally
    Completed,
    /// The harness stopped the subject at the step budget
    Budget,
    /// The subject raised
    Error,
}

/// One line of harness output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GuestMessage {
    /// A captured step
    Step {
        /// 1-based step order assigned by the harness
        order: u64,
        /// Event that fired
        event: EventKind,
        /// Enclosing function name
        function: String,
        /// Subject-relative line number
        line: usize,
        /// Serialized local bindings
        #[serde(default)]
        locals: Bindings,
    },
    /// Terminal message; nothing follows it
    Finished {
        /// How the subject ended
        status: FinishedStatus,
        /// Exception description for [`FinishedStatus::Error`]
        #[serde(default)]
        reason: Option<String>,
    },
}

impl GuestMessage {
    /// Decode one output line
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Convert a step message into a snapshot
    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Self::Step { order, event, function, line, locals } => {
                Some(Snapshot { order, event, function, line, bindings: locals })
            }
            Self::Finished { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vtrace_common::types::BindingValue;

    #[test]
    fn test_decode_step() {
        let line = r#"{"type":"step","order":3,"event":"line","function":"f","line":2,"locals":{"a":{"json":[1,2]},"s":{"text":"{1, 2}"}}}"#;
        let snapshot = GuestMessage::decode(line).unwrap().into_snapshot().unwrap();

        assert_eq!(snapshot.order, 3);
        assert_eq!(snapshot.event, EventKind::Line);
        assert_eq!(snapshot.line, 2);
        assert_eq!(snapshot.bindings["a"], BindingValue::Json(json!([1, 2])));
        assert_eq!(snapshot.bindings["a"].render(), "[1, 2]");
        assert_eq!(snapshot.bindings["s"], BindingValue::Text("{1, 2}".to_string()));
    }

    #[test]
    fn test_decode_finished() {
        let message = GuestMessage::decode(r#"{"type":"finished","status":"budget"}"#).unwrap();
        assert_eq!(message, GuestMessage::Finished { status: FinishedStatus::Budget, reason: None });

        let message = GuestMessage::decode(
            r#"{"type":"finished","status":"error","reason":"EOFError: EOF when reading a line"}"#,
        )
        .unwrap();
        assert!(matches!(
            message,
            GuestMessage::Finished { status: FinishedStatus::Error, reason: Some(_) }
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(GuestMessage::decode("not json").is_err());
        assert!(GuestMessage::decode(r#"{"type":"mystery"}"#).is_err());
    }

    #[test]
    fn test_request_shape() {
        let inputs = vec!["1 2".to_string()];
        let request =
            RunRequest { source: "x = 1", inputs: &inputs, step_budget: 50, trace_nested: false };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"source": "x = 1", "inputs": ["1 2"], "step_budget": 50, "trace_nested": false})
        );
    }

    #[test]
    fn test_harness_is_embedded() {
        assert!(HARNESS_SOURCE.contains("sys.settrace"));
    }
}
