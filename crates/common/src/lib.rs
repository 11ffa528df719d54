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

//! vtrace Common - Shared functionality for vtrace components
//!
//! This crate provides the data model shared by the sandbox, the loop
//! detector, the compressor and the trace grammar, plus logging setup.

/// Snapshots, trace logs, diffs, loop regions and compressed traces
pub mod types;

/// Logging setup and utilities for consistent logging across vtrace components
pub mod logging;

pub use logging::*;
