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

//! vtrace Engine - execution trace capture and loop-aware compression
//!
//! A subject program runs inside an instrumented sandbox that records its
//! local variables at every step. Loop regions detected in the source let the
//! compressor fold each loop run into its net effect, and the result is
//! serialized through a compact trace grammar that downstream consumers parse
//! and validate.

pub mod compress;
pub use compress::*;

pub mod core;
pub use self::core::*;

pub mod envelope;
pub use envelope::*;

pub mod grammar;
pub use grammar::*;

pub mod loops;
pub use loops::*;

pub mod orchestration;
pub use orchestration::*;

pub mod sandbox;
pub use sandbox::*;

pub mod utils;
pub use utils::*;
