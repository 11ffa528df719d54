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

//! Binding deltas between adjacent snapshots and their collapsed summaries.

use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut},
};

use serde::{Deserialize, Serialize};

use super::{BindingValue, Bindings};

/// Marker rendered for a binding that disappeared.
pub const REMOVED_MARKER: &str = "returned";

/// Change of a single binding across one transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// Present only in the later snapshot
    Introduced(BindingValue),
    /// Present in both with different serialized values
    Updated {
        /// Value in the earlier snapshot
        old: BindingValue,
        /// Value in the later snapshot
        new: BindingValue,
    },
    /// Present only in the earlier snapshot
    Removed,
}

impl Change {
    /// Render the change as a grammar value
    pub fn render(&self) -> String {
        match self {
            Self::Introduced(value) => value.render(),
            Self::Updated { old, new } => format!("{} -> {}", old.render(), new.render()),
            Self::Removed => REMOVED_MARKER.to_string(),
        }
    }
}

/// Variable deltas of one transition, keyed by variable name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diff {
    inner: BTreeMap<String, Change>,
}

impl Deref for Diff {
    type Target = BTreeMap<String, Change>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Diff {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Diff {
    /// Symmetric difference between two binding maps
    pub fn between(before: &Bindings, after: &Bindings) -> Self {
        let mut inner = BTreeMap::new();

        for (name, old) in before {
            match after.get(name) {
                None => {
                    inner.insert(name.clone(), Change::Removed);
                }
                Some(new) if new != old => {
                    inner.insert(
                        name.clone(),
                        Change::Updated { old: old.clone(), new: new.clone() },
                    );
                }
                Some(_) => {}
            }
        }

        for (name, new) in after {
            if !before.contains_key(name) {
                inner.insert(name.clone(), Change::Introduced(new.clone()));
            }
        }

        Self { inner }
    }
}

impl FromIterator<(String, Change)> for Diff {
    fn from_iter<I: IntoIterator<Item = (String, Change)>>(iter: I) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}

/// Net effect of a collapsed loop run on one binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetChange {
    /// The binding's value after the last write in the run
    Value(BindingValue),
    /// The last event in the run removed the binding
    Removed,
}

impl NetChange {
    /// Render the net change as a grammar value
    pub fn render(&self) -> String {
        match self {
            Self::Value(value) => value.render(),
            Self::Removed => REMOVED_MARKER.to_string(),
        }
    }
}

impl From<&Change> for NetChange {
    fn from(change: &Change) -> Self {
        match change {
            Change::Introduced(value) | Change::Updated { new: value, .. } => {
                Self::Value(value.clone())
            }
            Change::Removed => Self::Removed,
        }
    }
}

/// Collapsed summary of a loop run, keyed by variable name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetDiff {
    inner: BTreeMap<String, NetChange>,
}

impl Deref for NetDiff {
    type Target = BTreeMap<String, NetChange>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl NetDiff {
    /// Fold one more diff of the run into the summary; later writes win
    pub fn absorb(&mut self, diff: &Diff) {
        for (name, change) in diff.iter() {
            self.inner.insert(name.clone(), NetChange::from(change));
        }
    }
}

impl FromIterator<(String, NetChange)> for NetDiff {
    fn from_iter<I: IntoIterator<Item = (String, NetChange)>>(iter: I) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(pairs: &[(&str, serde_json::Value)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), BindingValue::Json(v.clone()))).collect()
    }

    #[test]
    fn test_between_classifies_every_key() {
        let before = bindings(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);
        let after = bindings(&[("a", json!(1)), ("b", json!(5)), ("d", json!("x"))]);

        let diff = Diff::between(&before, &after);

        assert_eq!(diff.len(), 3);
        assert!(!diff.contains_key("a"));
        assert_eq!(
            diff["b"],
            Change::Updated { old: BindingValue::Json(json!(2)), new: BindingValue::Json(json!(5)) }
        );
        assert_eq!(diff["c"], Change::Removed);
        assert_eq!(diff["d"], Change::Introduced(BindingValue::Json(json!("x"))));
    }

    #[test]
    fn test_between_identical_is_empty() {
        let state = bindings(&[("n", json!([1, 2]))]);
        assert!(Diff::between(&state, &state).is_empty());
    }

    #[test]
    fn test_fallback_text_compared_by_value() {
        let before: Bindings =
            [("s".to_string(), BindingValue::Text("{1, 2}".into()))].into_iter().collect();
        let after: Bindings =
            [("s".to_string(), BindingValue::Json(json!("{1, 2}")))].into_iter().collect();
        // A text fallback and a JSON string are different serialized forms
        assert_eq!(Diff::between(&before, &after).len(), 1);
    }

    #[test]
    fn test_change_render() {
        let updated = Change::Updated {
            old: BindingValue::Json(json!(1)),
            new: BindingValue::Json(json!(2)),
        };
        assert_eq!(updated.render(), "1 -> 2");
        assert_eq!(Change::Removed.render(), "returned");
        assert_eq!(Change::Introduced(BindingValue::Json(json!("hi"))).render(), "hi");
    }

    #[test]
    fn test_absorb_last_write_wins() {
        let mut net = NetDiff::default();
        let introduced: Diff =
            [("t".to_string(), Change::Introduced(BindingValue::Json(json!(0))))]
                .into_iter()
                .collect();
        let removed: Diff = [("t".to_string(), Change::Removed)].into_iter().collect();

        net.absorb(&introduced);
        assert_eq!(net["t"], NetChange::Value(BindingValue::Json(json!(0))));
        net.absorb(&removed);
        assert_eq!(net["t"], NetChange::Removed);
        net.absorb(&introduced);
        assert_eq!(net["t"], NetChange::Value(BindingValue::Json(json!(0))));
    }
}
