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

use serde::{Deserialize, Serialize};
use std::ops::Deref;

use super::Snapshot;

/// Ordered snapshots of exactly one sandbox run.
///
/// The log only grows through [`TraceLog::push`] while the owning run is in
/// progress; afterwards it is handed over by value and only read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceLog {
    inner: Vec<Snapshot>,
}

impl Deref for TraceLog {
    type Target = [Snapshot];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl TraceLog {
    /// Create a new empty trace log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty trace log with room for `capacity` snapshots
    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: Vec::with_capacity(capacity) }
    }

    /// Append a snapshot to this log
    pub fn push(&mut self, snapshot: Snapshot) {
        self.inner.push(snapshot);
    }

    /// Get the number of snapshots
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over adjacent snapshot pairs in step order
    pub fn transitions(&self) -> impl Iterator<Item = (&Snapshot, &Snapshot)> + '_ {
        self.inner.windows(2).map(|pair| (&pair[0], &pair[1]))
    }

    /// Convert the log to serde_json::Value for dumping
    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl From<Vec<Snapshot>> for TraceLog {
    fn from(inner: Vec<Snapshot>) -> Self {
        Self { inner }
    }
}

impl FromIterator<Snapshot> for TraceLog {
    fn from_iter<I: IntoIterator<Item = Snapshot>>(iter: I) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}

// IntoIterator for owned TraceLog (moves out its contents)
impl IntoIterator for TraceLog {
    type Item = Snapshot;
    type IntoIter = std::vec::IntoIter<Snapshot>;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

// IntoIterator for &TraceLog (shared iteration)
impl<'a> IntoIterator for &'a TraceLog {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
