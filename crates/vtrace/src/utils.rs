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

//! File helpers shared by the subcommands

use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
};

use eyre::{Result, WrapErr};
use serde::Serialize;

/// Read a whole file, or stdin when the path is `-` or absent
pub fn read_text(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).wrap_err("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Input lines of one case file, without line terminators
pub fn read_input_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read input case {}", path.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

/// Subject name derived from the file stem
pub fn subject_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "subject".to_string())
}

/// Write one JSON document per line
pub fn write_json_lines<T: Serialize>(out: &mut impl Write, items: &[T]) -> Result<()> {
    for item in items {
        serde_json::to_writer(&mut *out, item)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
