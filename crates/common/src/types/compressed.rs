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

//! Compressed traces: per-line diffs interleaved with collapsed loop runs.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::{Diff, LoopRegion, NetDiff};

/// Separator between entries of an encoded trace
pub const ENTRY_SEPARATOR: &str = " | ";
/// Separator between a label and its payload, and between a key and its value
pub const LABEL_SEPARATOR: &str = ": ";
/// Separator between key/value pairs of a payload
pub const PAIR_SEPARATOR: &str = " , ";

/// One entry of a compressed trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    /// A single transition outside any loop run; the diff may be empty
    Line {
        /// Line of the earlier snapshot of the transition
        line: usize,
        /// Binding deltas of the transition
        diff: Diff,
    },
    /// A whole loop run folded into its net effect
    Region {
        /// The loop region the run executed in
        region: LoopRegion,
        /// Net effect of the run
        summary: NetDiff,
    },
}

impl Entry {
    /// Grammar label of the entry
    pub fn label(&self) -> String {
        match self {
            Self::Line { line, .. } => line.to_string(),
            Self::Region { region, .. } => region.tag(),
        }
    }

    /// Rendered `(key, value)` pairs of the payload, in key order
    pub fn rendered_pairs(&self) -> Vec<(String, String)> {
        match self {
            Self::Line { diff, .. } => {
                diff.iter().map(|(name, change)| (name.clone(), change.render())).collect()
            }
            Self::Region { summary, .. } => {
                summary.iter().map(|(name, change)| (name.clone(), change.render())).collect()
            }
        }
    }

    /// Whether the payload carries no binding change
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Line { diff, .. } => diff.is_empty(),
            Self::Region { summary, .. } => summary.is_empty(),
        }
    }
}

/// Text that cannot be represented unambiguously in the trace grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparatorCollision {
    /// Label of the entry holding the text
    pub label: String,
    /// Offending key or rendered value
    pub text: String,
}

/// Whether `sep` occurs in `before + text + after` overlapping `text`
fn straddles(before: &str, text: &str, after: &str, sep: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let joined = format!("{before}{text}{after}");
    let (start, end) = (before.len(), before.len() + text.len());
    joined
        .char_indices()
        .any(|(at, _)| at < end && at + sep.len() > start && joined[at..].starts_with(sep))
}

/// Ordered entries of a compressed trace, in original execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompressedTrace {
    entries: Vec<Entry>,
}

impl Deref for CompressedTrace {
    type Target = [Entry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl CompressedTrace {
    /// Create an empty compressed trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Whether any entry carries a binding change
    pub fn has_signal(&self) -> bool {
        self.entries.iter().any(|entry| !entry.is_empty())
    }

    /// Keys and values whose text would re-parse differently.
    ///
    /// The grammar defines no escaping. Pairs split at the first `:`, so a key
    /// may hold none. A value may hold `: ` but no entry or pair separator,
    /// including one formed together with the joiner text around it.
    pub fn separator_collisions(&self) -> Vec<SeparatorCollision> {
        let mut collisions = Vec::new();
        for entry in &self.entries {
            let label = entry.label();
            let pairs = entry.rendered_pairs();
            let last = pairs.len().saturating_sub(1);
            for (at, (key, value)) in pairs.into_iter().enumerate() {
                let before = if at == 0 { "{" } else { PAIR_SEPARATOR };
                let after = if at == last { "}" } else { PAIR_SEPARATOR };
                let breaks = |before: &str, text: &str, after: &str| {
                    [ENTRY_SEPARATOR, PAIR_SEPARATOR]
                        .iter()
                        .any(|sep| straddles(before, text, after, sep))
                };

                if key.contains(':') || breaks(before, &key, LABEL_SEPARATOR) {
                    collisions.push(SeparatorCollision { label: label.clone(), text: key });
                }
                if breaks(LABEL_SEPARATOR, &value, after) {
                    collisions.push(SeparatorCollision { label: label.clone(), text: value });
                }
            }
        }
        collisions
    }
}

impl From<Vec<Entry>> for CompressedTrace {
    fn from(entries: Vec<Entry>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for CompressedTrace {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
