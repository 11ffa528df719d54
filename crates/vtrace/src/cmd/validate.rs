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

//! Validate command

use std::{io, path::PathBuf};

use clap::Args;
use eyre::{bail, Result};
use serde::Serialize;
use vtrace_engine::{extract_trace_segment, prune, replace_trace_segment, validate_batch};

use crate::utils::{read_text, write_json_lines};

/// Arguments of `vtrace validate`
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// File with one trace per line, or `-` for stdin
    pub file: Option<PathBuf>,

    /// Lines are annotated records; only their `@Trace = ` segment is checked
    #[arg(long)]
    pub records: bool,

    /// Print each line with empty entries removed instead of a verdict
    #[arg(long)]
    pub prune: bool,

    /// Fail when any line is rejected
    #[arg(long)]
    pub strict: bool,
}

/// Verdict printed for one input line
#[derive(Debug, Serialize)]
struct Verdict {
    line: usize,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection: Option<String>,
}

/// Judge or prune every non-blank line of the input
pub fn validate(args: &ValidateArgs) -> Result<()> {
    let text = read_text(args.file.as_deref())?;
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index + 1, line))
        .collect();

    if args.prune {
        return prune_lines(&lines, args.records);
    }

    let traces: Vec<&str> = lines
        .iter()
        .map(|&(_, line)| if args.records { extract_trace_segment(line).unwrap_or("") } else { line })
        .collect();

    let verdicts: Vec<Verdict> = validate_batch(&traces)
        .into_iter()
        .zip(&lines)
        .map(|(verdict, (line, _))| match verdict {
            Ok(parsed) => {
                Verdict { line: *line, valid: true, entries: Some(parsed.len()), rejection: None }
            }
            Err(rejection) => Verdict {
                line: *line,
                valid: false,
                entries: None,
                rejection: Some(rejection.to_string()),
            },
        })
        .collect();

    write_json_lines(&mut io::stdout().lock(), &verdicts)?;

    let rejected = verdicts.iter().filter(|verdict| !verdict.valid).count();
    tracing::info!(total = verdicts.len(), rejected, "Validated traces");
    if args.strict && rejected > 0 {
        bail!("{rejected} of {} traces rejected", verdicts.len());
    }
    Ok(())
}

fn prune_lines(lines: &[(usize, &str)], records: bool) -> Result<()> {
    for (number, line) in lines {
        let output = if records {
            let Some(trace) = extract_trace_segment(line) else {
                bail!("line {number}: record has no trace segment");
            };
            let pruned = prune(trace).map_err(|e| eyre::eyre!("line {number}: {e}"))?;
            replace_trace_segment(line, &pruned)
                .ok_or_else(|| eyre::eyre!("line {number}: record has no trace segment"))?
        } else {
            prune(line).map_err(|e| eyre::eyre!("line {number}: {e}"))?
        };
        println!("{output}");
    }
    Ok(())
}
