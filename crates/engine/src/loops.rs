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

//! Loop structure detection over line-numbered source text.
//!
//! The detector is a single linear scan driven by indentation and loop
//! keywords. It does not parse the guest language: an outer loop's region
//! swallows every line of its inner loops, sibling loops at the same level
//! merge into one region, and unusual layouts (line continuations, loops in
//! string literals) can be misclassified. Downstream only needs
//! line-to-some-loop membership, so these limitations are accepted as is.
//!
//! Input lines have the form `"<1-based line number> <code>"`. Physical lines
//! are separated by `\n`; the `|||` record separator used by upstream dataset
//! records is accepted as well.

use tracing::debug;
use vtrace_common::types::{LoopRegion, LoopRegions};

/// Separator between physical lines inside a joined upstream record
pub const JOINED_LINE_SEPARATOR: &str = "|||";

/// Tab stops used when measuring indentation
const TAB_WIDTH: usize = 8;

/// Produce the line-numbered form of raw source text.
///
/// Each physical line `code` at 1-based position `n` becomes `"n code"`.
pub fn number_lines(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(index, code)| format!("{} {code}", index + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Detect loop regions in line-numbered source text.
pub fn detect_loops(numbered_source: &str) -> LoopRegions {
    let mut scanner = LoopScanner::default();

    for raw in numbered_source.split('\n').flat_map(|line| line.split(JOINED_LINE_SEPARATOR)) {
        match parse_numbered_line(raw) {
            Some((line, code)) => scanner.feed(line, code),
            None => {
                if !raw.trim().is_empty() {
                    debug!(line = raw, "Skipping line with malformed numbering");
                }
            }
        }
    }

    scanner.finish()
}

/// Split `"<number> <code>"` into its parts. A line holding only a number
/// yields empty code.
fn parse_numbered_line(raw: &str) -> Option<(usize, &str)> {
    let raw = raw.trim_start().trim_end_matches('\r');
    let (number, code) = match raw.split_once(' ') {
        Some((number, code)) => (number, code),
        None => (raw, ""),
    };
    let line = number.parse::<usize>().ok()?;
    Some((line, code))
}

/// Indentation width of `code`, with tabs advancing to the next tab stop
fn indentation(code: &str) -> usize {
    code.chars()
        .take_while(|c| c.is_whitespace())
        .fold(0, |width, c| if c == '\t' { (width / TAB_WIDTH + 1) * TAB_WIDTH } else { width + 1 })
}

/// Whether a trimmed statement opens a loop
fn is_loop_header(statement: &str) -> bool {
    let statement = statement.strip_prefix("async").map_or(statement, |rest| {
        // `async for` only; `asyncfoo` is an identifier
        if rest.starts_with(char::is_whitespace) {
            rest.trim_start()
        } else {
            statement
        }
    });

    ["for", "while"].iter().any(|keyword| {
        statement.strip_prefix(keyword).is_some_and(|rest| {
            rest.chars().next().is_some_and(|c| !(c.is_alphanumeric() || c == '_'))
        })
    })
}

/// An open region: opener indentation plus member lines (header first)
#[derive(Debug)]
struct OpenRegion {
    indent: usize,
    lines: Vec<usize>,
}

#[derive(Debug, Default)]
struct LoopScanner {
    open: Option<OpenRegion>,
    regions: LoopRegions,
}

impl LoopScanner {
    fn feed(&mut self, line: usize, code: &str) {
        let statement = code.trim();
        if statement.is_empty() {
            // Blank lines neither join nor close a region
            return;
        }
        let indent = indentation(code);

        if is_loop_header(statement) {
            match &mut self.open {
                Some(region) => {
                    region.lines.push(line);
                    region.indent = region.indent.min(indent);
                }
                None => self.open = Some(OpenRegion { indent, lines: vec![line] }),
            }
            return;
        }

        let Some(region) = &mut self.open else {
            return;
        };
        if indent > region.indent {
            region.lines.push(line);
        } else {
            self.close();
        }
    }

    fn close(&mut self) {
        if let Some(region) = self.open.take() {
            // The header alone is not a body
            if region.lines.len() > 1 {
                self.regions.push(LoopRegion::new(region.lines));
            } else {
                debug!(header = region.lines[0], "Discarding loop region without body lines");
            }
        }
    }

    fn finish(mut self) -> LoopRegions {
        self.close();
        self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(regions: &LoopRegions) -> Vec<Vec<usize>> {
        regions.iter().map(|region| region.lines().collect()).collect()
    }

    #[test]
    fn test_number_lines() {
        assert_eq!(number_lines("a = 1\nfor i in x:\n    a += i"), "1 a = 1\n2 for i in x:\n3     a += i");
    }

    #[test]
    fn test_single_loop() {
        let source = number_lines("n = 3\nfor i in range(n):\n    n += i\nprint(n)");
        assert_eq!(lines_of(&detect_loops(&source)), vec![vec![2, 3]]);
    }

    #[test]
    fn test_nested_loops_flatten() {
        let source = number_lines(
            "for i in range(3):\n    for j in range(3):\n        s = i * j\n    t = i\ndone = 1",
        );
        assert_eq!(lines_of(&detect_loops(&source)), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn test_unterminated_region_is_emitted() {
        let source = number_lines("x = 0\nwhile x < 5:\n    x += 1");
        assert_eq!(lines_of(&detect_loops(&source)), vec![vec![2, 3]]);
    }

    #[test]
    fn test_header_without_body_is_discarded() {
        let source = number_lines("s = 0\nfor i in range(3): s += i\nprint(s)");
        assert!(detect_loops(&source).is_empty());
    }

    #[test]
    fn test_indented_loop_inside_function() {
        let source = number_lines(
            "def f(xs):\n    total = 0\n    for x in xs:\n        total += x\n    return total\nf([1])",
        );
        assert_eq!(lines_of(&detect_loops(&source)), vec![vec![3, 4]]);
    }

    #[test]
    fn test_sibling_loops_merge() {
        let source = number_lines("for a in x:\n    p = a\nfor b in y:\n    q = b\nend = 0");
        assert_eq!(lines_of(&detect_loops(&source)), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn test_blank_lines_keep_region_open() {
        let source = "1 for i in x:\n2     a = i\n3 \n4     b = i\n5 c = 0";
        assert_eq!(lines_of(&detect_loops(source)), vec![vec![1, 2, 4]]);
    }

    #[test]
    fn test_malformed_numbering_is_skipped() {
        let source = "1 for i in x:\nbogus line\n2     a = i\n3 b = 0";
        assert_eq!(lines_of(&detect_loops(source)), vec![vec![1, 2]]);
    }

    #[test]
    fn test_joined_record_separator() {
        let source = "1 while True:|||2     k += 1|||3 print(k)";
        assert_eq!(lines_of(&detect_loops(source)), vec![vec![1, 2]]);
    }

    #[test]
    fn test_tab_indentation() {
        let source = "1 for i in x:\n2 \ty = i\n3 z = 1";
        assert_eq!(lines_of(&detect_loops(source)), vec![vec![1, 2]]);
    }

    #[test]
    fn test_loop_keyword_detection() {
        assert!(is_loop_header("for i in x:"));
        assert!(is_loop_header("while(True):"));
        assert!(is_loop_header("async for item in stream:"));
        assert!(!is_loop_header("format = 1"));
        assert!(!is_loop_header("whileloop()"));
        assert!(!is_loop_header("for_each(x)"));
        assert!(!is_loop_header("asyncfor x"));
    }
}
