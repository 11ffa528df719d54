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

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Category used when the caller does not provide one
pub const DEFAULT_CATEGORY: &str = "default";

/// Who owns wall-clock cancellation for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// This context owns the timer and cancels the run after the duration
    Owned(Duration),
    /// An enclosing scope owns cancellation; no timer is installed here
    Inherited,
}

impl Deadline {
    /// Duration of the timer this context must install, if any
    pub fn owned_limit(&self) -> Option<Duration> {
        match self {
            Self::Owned(limit) => Some(*limit),
            Self::Inherited => None,
        }
    }
}

impl From<Option<Duration>> for Deadline {
    fn from(limit: Option<Duration>) -> Self {
        limit.map_or(Self::Inherited, Self::Owned)
    }
}

/// Per-run parameters threaded explicitly through the sandbox and engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Routing category for reports and failure records
    pub category: String,
    /// Index of the input case within its subject
    pub case_index: usize,
    /// Cancellation ownership
    #[serde(skip, default = "inherited")]
    pub deadline: Deadline,
}

fn inherited() -> Deadline {
    Deadline::Inherited
}

impl Default for RunContext {
    fn default() -> Self {
        Self { category: DEFAULT_CATEGORY.to_string(), case_index: 0, deadline: Deadline::Inherited }
    }
}

impl RunContext {
    /// Create a context for `category` that inherits cancellation
    pub fn new(category: impl Into<String>) -> Self {
        Self { category: category.into(), ..Default::default() }
    }

    /// Set the input case index
    pub fn with_case(mut self, case_index: usize) -> Self {
        self.case_index = case_index;
        self
    }

    /// Set the cancellation ownership
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Context for work nested inside this one.
    ///
    /// The child keeps category and case but never owns a timer, so only one
    /// cancellation mechanism is active per execution.
    pub fn nested(&self) -> Self {
        Self { deadline: Deadline::Inherited, ..self.clone() }
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category, self.case_index)
    }
}
