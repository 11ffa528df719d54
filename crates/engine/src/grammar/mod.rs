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

//! Canonical trace grammar.
//!
//! ```text
//! TRACE ::= "[" ENTRY ( " | " ENTRY )* "]" | "[]"
//! ENTRY ::= LABEL ": " | LABEL ": {" PAIR ( " , " PAIR )* "}"
//! LABEL ::= <line number> | <loop-region tag>
//! PAIR  ::= <key> ": " <value>
//! ```
//!
//! Labels, keys and values are opaque text. The grammar has no escaping, so
//! separator sequences inside keys or values do not survive a round trip.
//!
//! - [`codec`] turns compressed traces into strings and strings back into a
//!   structured decode
//! - [`validate`] judges whether a trace string carries usable signal and
//!   prunes entries without payload

mod codec;
mod validate;

pub use codec::*;
pub use validate::*;
