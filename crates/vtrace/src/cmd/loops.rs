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

//! Loops command

use std::path::PathBuf;

use clap::Args;
use eyre::Result;
use vtrace_engine::{detect_loops, number_lines};

use crate::utils::read_text;

/// Arguments of `vtrace loops`
#[derive(Debug, Args)]
pub struct LoopsArgs {
    /// Source file, or `-` for stdin
    pub source: Option<PathBuf>,

    /// The input is already line-numbered (`<n> <code>` per line)
    #[arg(long)]
    pub numbered: bool,

    /// Print the regions as a JSON array instead of one tag per line
    #[arg(long)]
    pub json: bool,
}

/// Print the loop regions of a program
pub fn loops(args: &LoopsArgs) -> Result<()> {
    let text = read_text(args.source.as_deref())?;
    let numbered = if args.numbered { text } else { number_lines(&text) };

    let regions = detect_loops(&numbered);
    tracing::debug!(regions = regions.len(), "Detected loop regions");

    if args.json {
        println!("{}", serde_json::to_string(&regions)?);
    } else {
        for region in regions.iter() {
            println!("{}", region.tag());
        }
    }
    Ok(())
}
