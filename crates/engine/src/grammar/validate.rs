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

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use thiserror::Error;
use tracing::debug;

use super::{parse, GrammarError, ParsedTrace};

/// Reasons a trace string is not usable as a fault-localization signal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceRejection {
    /// The input is blank
    #[error("trace string is empty")]
    Empty,

    /// The input does not follow the trace grammar
    #[error("malformed trace: {0}")]
    Malformed(String),

    /// Every entry has an empty payload
    #[error("trace carries no variable changes")]
    NoSignal,
}

impl From<GrammarError> for TraceRejection {
    fn from(error: GrammarError) -> Self {
        match error {
            GrammarError::Empty => Self::Empty,
            GrammarError::Malformed(reason) => Self::Malformed(reason),
        }
    }
}

/// Decode a trace string and require at least one entry with payload pairs
pub fn validate(text: &str) -> Result<ParsedTrace, TraceRejection> {
    let parsed = parse(text)?;
    if !parsed.has_signal() {
        return Err(TraceRejection::NoSignal);
    }
    Ok(parsed)
}

/// Whether a trace string is well-formed and carries signal
pub fn is_valid(text: &str) -> bool {
    validate(text).is_ok()
}

/// Remove every entry without payload pairs and re-serialize.
///
/// Pruning an already pruned trace is a no-op.
pub fn prune(text: &str) -> Result<String, GrammarError> {
    Ok(parse(text)?.pruned().encode())
}

/// Validate many trace strings in parallel; each verdict is independent.
pub fn validate_batch<S>(traces: &[S]) -> Vec<Result<ParsedTrace, TraceRejection>>
where
    S: AsRef<str> + Sync,
{
    let verdicts: Vec<_> = traces.par_iter().map(|text| validate(text.as_ref())).collect();

    debug!(
        total = verdicts.len(),
        valid = verdicts.iter().filter(|verdict| verdict.is_ok()).count(),
        "Validated trace batch"
    );
    verdicts
}
