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

//! Loop-aware diff compression of trace logs.
//!
//! # Pipeline
//!
//! 1. **Pairwise diff**: every adjacent snapshot pair yields a [`Diff`]
//!    attached to the earlier snapshot's line. Transitions leaving the
//!    synthetic wrapper header are dropped.
//! 2. **Run detection**: consecutive diffs whose lines fall in the same loop
//!    region (first match wins) form a run.
//! 3. **Run collapsing**: a run folds into a single [`NetDiff`], last write
//!    wins per key.
//! 4. **Pass-through**: diffs outside runs become per-line entries, empty
//!    ones included.
//!
//! The walk is a single pass over the transitions; only the run currently
//! being folded is buffered.

use vtrace_common::types::{
    CompressedTrace, Diff, Entry, LoopRegions, NetDiff, TraceLog, WRAPPER_HEADER_LINE,
};

/// A diff together with the line it is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiff {
    /// Line of the earlier snapshot
    pub line: usize,
    /// Binding deltas of the transition
    pub diff: Diff,
}

/// Pairwise diffs of a trace log in execution order.
///
/// Transitions attached to the wrapper header are not part of the subject
/// and are skipped.
pub fn line_diffs(log: &TraceLog) -> impl Iterator<Item = LineDiff> + '_ {
    log.transitions().filter(|(before, _)| before.line != WRAPPER_HEADER_LINE).map(
        |(before, after)| LineDiff {
            line: before.line,
            diff: Diff::between(&before.bindings, &after.bindings),
        },
    )
}

/// Executed source lines in order, one per kept transition
pub fn coverage(log: &TraceLog) -> Vec<usize> {
    log.transitions()
        .map(|(before, _)| before.line)
        .filter(|line| *line != WRAPPER_HEADER_LINE)
        .collect()
}

/// Compress a trace log against the loop regions of the same source.
pub fn compress(log: &TraceLog, regions: &LoopRegions) -> CompressedTrace {
    let mut compressed = CompressedTrace::new();
    // (region index, folded summary) of the run in progress
    let mut run: Option<(usize, NetDiff)> = None;

    for LineDiff { line, diff } in line_diffs(log) {
        let region = regions.region_of(line);

        match (&mut run, region) {
            (Some((current, summary)), Some(index)) if *current == index => {
                summary.absorb(&diff);
                continue;
            }
            _ => {}
        }

        if let Some((index, summary)) = run.take() {
            compressed.push(Entry::Region { region: regions[index].clone(), summary });
        }

        match region {
            Some(index) => {
                let mut summary = NetDiff::default();
                summary.absorb(&diff);
                run = Some((index, summary));
            }
            None => compressed.push(Entry::Line { line, diff }),
        }
    }

    if let Some((index, summary)) = run {
        compressed.push(Entry::Region { region: regions[index].clone(), summary });
    }

    compressed
}
