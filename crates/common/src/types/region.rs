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

use std::{collections::BTreeSet, fmt, ops::Deref};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Source lines forming one loop's full body, nesting flattened.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopRegion {
    lines: BTreeSet<usize>,
}

impl LoopRegion {
    /// Build a region from its member lines
    pub fn new(lines: impl IntoIterator<Item = usize>) -> Self {
        Self { lines: lines.into_iter().collect() }
    }

    /// Whether `line` belongs to this region
    pub fn contains(&self, line: usize) -> bool {
        self.lines.contains(&line)
    }

    /// First line of the region (the loop header)
    pub fn header(&self) -> Option<usize> {
        self.lines.first().copied()
    }

    /// Number of member lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the region has no member lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Member lines in ascending order
    pub fn lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines.iter().copied()
    }

    /// Grammar label of the region, e.g. `[3, 4, 5]`
    pub fn tag(&self) -> String {
        format!("[{}]", self.lines.iter().join(", "))
    }
}

impl fmt::Display for LoopRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// All loop regions of one source text, in detection (source) order.
///
/// Lookups are first-match-wins, which settles lines claimed by more than one
/// region deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopRegions {
    regions: Vec<LoopRegion>,
}

impl Deref for LoopRegions {
    type Target = [LoopRegion];

    fn deref(&self) -> &Self::Target {
        &self.regions
    }
}

impl LoopRegions {
    /// Create an empty region set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a region in detection order
    pub fn push(&mut self, region: LoopRegion) {
        self.regions.push(region);
    }

    /// Index of the first region containing `line`
    pub fn region_of(&self, line: usize) -> Option<usize> {
        self.regions.iter().position(|region| region.contains(line))
    }
}

impl From<Vec<LoopRegion>> for LoopRegions {
    fn from(regions: Vec<LoopRegion>) -> Self {
        Self { regions }
    }
}

impl FromIterator<LoopRegion> for LoopRegions {
    fn from_iter<I: IntoIterator<Item = LoopRegion>>(iter: I) -> Self {
        Self { regions: iter.into_iter().collect() }
    }
}
