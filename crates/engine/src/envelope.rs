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

//! Record envelope embedding a trace string after the subject code.
//!
//! ```text
//! <code> # @Input = [<input>] @Expected = [<expected>] @Trace = <trace>
//! <code> # @Input = [<input>] @Expected = [<expected>] @Actual = [<actual>] @Trace = <trace>
//! ```
//!
//! Only the trace segment is ever located again; the rest is opaque.

use serde::{Deserialize, Serialize};

/// Marker introducing the trace segment, which runs to the end of the record
pub const TRACE_MARKER: &str = "@Trace = ";

/// Fields of the trailing comment of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAnnotation {
    /// Raw input of the case
    pub input: String,
    /// Expected output of the case
    pub expected: String,
    /// Output the subject actually produced, when known
    pub actual: Option<String>,
    /// Encoded trace string
    pub trace: String,
}

impl TraceAnnotation {
    /// Create an annotation without an actual output
    pub fn new(
        input: impl Into<String>,
        expected: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Self { input: input.into(), expected: expected.into(), actual: None, trace: trace.into() }
    }

    /// Attach the actual output
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    /// Render the trailing comment, leading ` # ` included
    pub fn render(&self) -> String {
        let mut comment = format!(" # @Input = [{}] @Expected = [{}]", self.input, self.expected);
        if let Some(actual) = &self.actual {
            comment.push_str(&format!(" @Actual = [{actual}]"));
        }
        comment.push(' ');
        comment.push_str(TRACE_MARKER);
        comment.push_str(&self.trace);
        comment
    }

    /// Append the comment to `code`
    pub fn annotate(&self, code: &str) -> String {
        format!("{code}{}", self.render())
    }
}

/// Locate the trace segment of a record
pub fn extract_trace_segment(record: &str) -> Option<&str> {
    let start = record.rfind(TRACE_MARKER)? + TRACE_MARKER.len();
    Some(record[start..].trim())
}

/// Replace the trace segment of a record, keeping everything before it
pub fn replace_trace_segment(record: &str, trace: &str) -> Option<String> {
    let start = record.rfind(TRACE_MARKER)? + TRACE_MARKER.len();
    Some(format!("{}{trace}", &record[..start]))
}
