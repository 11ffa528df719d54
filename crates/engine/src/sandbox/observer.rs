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

//! Step observers.
//!
//! The sandbox decodes every step streamed by the harness and hands it to a
//! [`StepObserver`] according to its event kind. Observers decide whether the
//! run may go on.

use tracing::trace;
use vtrace_common::types::{EventKind, Snapshot, TraceLog};

/// Verdict of an observer after seeing one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    /// Keep executing the guest
    Continue,
    /// Abort the guest immediately
    Halt,
}

/// Capability receiving the steps of one sandbox run
pub trait StepObserver {
    /// A new source line is about to execute
    fn on_line(&mut self, snapshot: Snapshot) -> StepControl;

    /// A traced frame was entered
    fn on_call(&mut self, snapshot: Snapshot) -> StepControl;

    /// A traced frame is about to return
    fn on_return(&mut self, snapshot: Snapshot) -> StepControl;

    /// Dispatch a snapshot to the handler of its event kind
    fn observe(&mut self, snapshot: Snapshot) -> StepControl {
        match snapshot.event {
            EventKind::Line => self.on_line(snapshot),
            EventKind::Call => self.on_call(snapshot),
            EventKind::Return => self.on_return(snapshot),
        }
    }
}

/// Observer that owns the Trace Log of a run and enforces the step budget.
///
/// The log never holds more than `budget` snapshots: a step arriving when
/// the log is full is dropped and halts the run.
#[derive(Debug)]
pub struct TraceRecorder {
    log: TraceLog,
    budget: usize,
    exhausted: bool,
}

impl TraceRecorder {
    /// Create a recorder accepting at most `budget` snapshots
    pub fn new(budget: usize) -> Self {
        Self { log: TraceLog::with_capacity(budget.min(1024)), budget, exhausted: false }
    }

    /// Whether a step was refused because the budget was reached
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of snapshots recorded so far
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Hand over the recorded log
    pub fn into_log(self) -> TraceLog {
        self.log
    }

    fn record(&mut self, snapshot: Snapshot) -> StepControl {
        if self.log.len() >= self.budget {
            self.exhausted = true;
            return StepControl::Halt;
        }

        trace!(order = snapshot.order, event = %snapshot.event, line = snapshot.line, "Recorded step");
        self.log.push(snapshot);
        StepControl::Continue
    }
}

impl StepObserver for TraceRecorder {
    fn on_line(&mut self, snapshot: Snapshot) -> StepControl {
        self.record(snapshot)
    }

    fn on_call(&mut self, snapshot: Snapshot) -> StepControl {
        self.record(snapshot)
    }

    fn on_return(&mut self, snapshot: Snapshot) -> StepControl {
        self.record(snapshot)
    }
}
