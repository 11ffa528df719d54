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

//! Compress command

use std::path::PathBuf;

use clap::Args;
use eyre::{Result, WrapErr};
use vtrace_common::types::TraceLog;
use vtrace_engine::{compress as compress_log, detect_loops, encode, number_lines};

use crate::utils::read_text;

/// Arguments of `vtrace compress`
#[derive(Debug, Args)]
pub struct CompressArgs {
    /// Trace Log as a JSON array of snapshots, or `-` for stdin
    pub log: Option<PathBuf>,

    /// Source of the traced program, used for loop detection
    #[arg(long)]
    pub source: PathBuf,

    /// The source file is already line-numbered
    #[arg(long)]
    pub numbered: bool,

    /// Drop entries without variable changes from the output
    #[arg(long)]
    pub prune: bool,
}

/// Compress a recorded log and print its encoded trace
pub fn compress(args: &CompressArgs) -> Result<()> {
    let log: TraceLog = serde_json::from_str(&read_text(args.log.as_deref())?)
        .wrap_err("Trace log is not a JSON array of snapshots")?;

    let source = read_text(Some(args.source.as_path()))?;
    let numbered = if args.numbered { source } else { number_lines(&source) };
    let regions = detect_loops(&numbered);

    let compressed = compress_log(&log, &regions);
    tracing::debug!(steps = log.len(), entries = compressed.len(), "Compressed trace log");

    let mut encoded = encode(&compressed);
    if args.prune {
        encoded = vtrace_engine::prune(&encoded)?;
    }
    println!("{encoded}");
    Ok(())
}
