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

//! Command modules for the vtrace CLI

pub mod batch;
pub mod compress;
pub mod config;
pub mod loops;
pub mod trace;
pub mod validate;

pub use batch::{batch, BatchArgs};
pub use compress::{compress, CompressArgs};
pub use config::{config, ConfigArgs};
pub use loops::{loops, LoopsArgs};
pub use trace::{trace, TraceArgs};
pub use validate::{validate, ValidateArgs};
