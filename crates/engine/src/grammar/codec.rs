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

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vtrace_common::types::{
    CompressedTrace, ENTRY_SEPARATOR, LABEL_SEPARATOR, PAIR_SEPARATOR,
};

/// Errors produced while decoding a trace string.
///
/// A single malformed entry fails the whole decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// The input is blank
    #[error("trace string is empty")]
    Empty,

    /// The input does not follow the trace grammar
    #[error("malformed trace: {0}")]
    Malformed(String),
}

/// One decoded entry: its label and its payload pairs, all opaque text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEntry {
    /// Line number or loop-region tag
    pub label: String,
    /// `(key, value)` pairs in textual order
    pub pairs: Vec<(String, String)>,
}

impl ParsedEntry {
    /// Whether the entry has no payload pairs
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The label as a line number, if it is one
    pub fn line(&self) -> Option<usize> {
        self.label.parse().ok()
    }
}

/// Structured decode of a trace string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedTrace {
    entries: Vec<ParsedEntry>,
}

impl Deref for ParsedTrace {
    type Target = [ParsedEntry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl ParsedTrace {
    /// Whether at least one entry carries a payload pair
    pub fn has_signal(&self) -> bool {
        self.entries.iter().any(|entry| !entry.is_empty())
    }

    /// Drop every entry without payload pairs
    pub fn pruned(self) -> Self {
        Self { entries: self.entries.into_iter().filter(|entry| !entry.is_empty()).collect() }
    }

    /// Serialize back into the canonical grammar
    pub fn encode(&self) -> String {
        encode_entries(self.entries.iter().map(|entry| {
            (entry.label.as_str(), entry.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        }))
    }
}

impl From<Vec<ParsedEntry>> for ParsedTrace {
    fn from(entries: Vec<ParsedEntry>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for ParsedTrace {
    type Item = ParsedEntry;
    type IntoIter = std::vec::IntoIter<ParsedEntry>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Serialize a compressed trace into the canonical grammar.
///
/// An empty trace encodes as `[]`.
pub fn encode(trace: &CompressedTrace) -> String {
    let rendered: Vec<(String, Vec<(String, String)>)> =
        trace.iter().map(|entry| (entry.label(), entry.rendered_pairs())).collect();

    encode_entries(rendered.iter().map(|(label, pairs)| {
        (label.as_str(), pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }))
}

fn encode_entries<'a, E, P>(entries: E) -> String
where
    E: IntoIterator<Item = (&'a str, P)>,
    P: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::from("[");

    for (index, (label, pairs)) in entries.into_iter().enumerate() {
        if index > 0 {
            out.push_str(ENTRY_SEPARATOR);
        }
        out.push_str(label);
        out.push_str(LABEL_SEPARATOR);

        let mut pairs = pairs.into_iter().peekable();
        if pairs.peek().is_some() {
            out.push('{');
            for (pair_index, (key, value)) in pairs.enumerate() {
                if pair_index > 0 {
                    out.push_str(PAIR_SEPARATOR);
                }
                out.push_str(key);
                out.push_str(LABEL_SEPARATOR);
                out.push_str(value);
            }
            out.push('}');
        }
    }

    out.push(']');
    out
}

/// Decode a trace string.
///
/// Decoding is lenient about whitespace around labels and payloads, and
/// accepts `{}` as an empty payload, but any entry that cannot be split into
/// a label and a (possibly empty) brace-delimited payload fails the whole
/// decode.
pub fn parse(text: &str) -> Result<ParsedTrace, GrammarError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GrammarError::Empty);
    }

    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| GrammarError::Malformed(format!("missing outer brackets in {text:?}")))?;

    if inner.trim().is_empty() {
        return Ok(ParsedTrace::default());
    }

    inner.split(ENTRY_SEPARATOR).map(parse_entry).collect::<Result<Vec<_>, _>>().map(Into::into)
}

fn parse_entry(raw: &str) -> Result<ParsedEntry, GrammarError> {
    let (label, payload) = raw
        .split_once(':')
        .ok_or_else(|| GrammarError::Malformed(format!("entry {raw:?} has no label separator")))?;

    let label = label.trim();
    if label.is_empty() {
        return Err(GrammarError::Malformed(format!("entry {raw:?} has an empty label")));
    }

    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(ParsedEntry { label: label.to_string(), pairs: Vec::new() });
    }

    let body = payload.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')).ok_or_else(
        || GrammarError::Malformed(format!("payload of entry {label:?} is not brace-delimited")),
    )?;

    let pairs = if body.trim().is_empty() {
        Vec::new()
    } else {
        body.split(PAIR_SEPARATOR)
            .map(|pair| parse_pair(label, pair))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(ParsedEntry { label: label.to_string(), pairs })
}

fn parse_pair(label: &str, raw: &str) -> Result<(String, String), GrammarError> {
    let (key, value) = raw.split_once(':').ok_or_else(|| {
        GrammarError::Malformed(format!("pair {raw:?} in entry {label:?} has no separator"))
    })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(GrammarError::Malformed(format!("pair {raw:?} in entry {label:?} has no key")));
    }

    // Only the separator's own space is stripped; values are opaque
    let value = value.strip_prefix(' ').unwrap_or(value);
    Ok((key.to_string(), value.to_string()))
}
