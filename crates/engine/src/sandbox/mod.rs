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

//! Instrumented execution sandbox.
//!
//! A run executes one subject over one input case inside a companion
//! interpreter process. The process wraps the subject in a synthetic
//! callable, hooks every line/call/return event of that callable, isolates
//! its standard streams and streams the captured steps back as JSON lines.
//!
//! # Components
//!
//! - [`Sandbox`] spawns the harness and pumps its output
//! - [`StepObserver`] receives each step; [`TraceRecorder`] keeps the log
//!   and enforces the step budget
//! - [`RunContext`] carries the run's category, case and deadline ownership

mod context;
mod observer;
mod protocol;
mod runner;

pub use context::*;
pub use observer::*;
pub use protocol::*;
pub use runner::{RunStatus, Sandbox, SandboxConfig, SandboxOutcome, DEFAULT_INTERPRETER};
