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

//! Locating the companion interpreter and checking its version.

use eyre::{eyre, Result, WrapErr};
use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::debug;

/// Interpreter names tried by [`find_default_interpreter`], in order
pub const INTERPRETER_CANDIDATES: &[&str] = &["python3", "python"];

/// Find an interpreter executable in the following order:
/// 1. `name` itself when it is a path to an existing file
/// 2. In the system PATH
pub fn find_interpreter(name: &str) -> Result<PathBuf> {
    let direct = Path::new(name);
    if direct.components().count() > 1 && direct.is_file() {
        debug!("Using interpreter at {:?}", direct);
        return Ok(direct.to_path_buf());
    }

    #[cfg(unix)]
    {
        if let Ok(output) = Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8(output.stdout)?.trim().to_string();
                if !path.is_empty() {
                    debug!("Found {} in PATH at {}", name, path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    #[cfg(windows)]
    {
        if let Ok(output) = Command::new("where").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8(output.stdout)?
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if !path.is_empty() {
                    debug!("Found {} in PATH at {}", name, path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(eyre!("Could not find interpreter {}. Make sure it is installed and in PATH.", name))
}

/// Find the first available interpreter among [`INTERPRETER_CANDIDATES`]
pub fn find_default_interpreter() -> Result<PathBuf> {
    INTERPRETER_CANDIDATES
        .iter()
        .find_map(|name| find_interpreter(name).ok())
        .ok_or_else(|| eyre!("No Python interpreter found (tried {:?})", INTERPRETER_CANDIDATES))
}

/// Version string reported by `interpreter --version`, e.g. `Python 3.11.4`
pub fn interpreter_version(interpreter: &Path) -> Result<String> {
    let output = Command::new(interpreter)
        .arg("--version")
        .output()
        .wrap_err_with(|| format!("Failed to run {}", interpreter.display()))?;

    if !output.status.success() {
        return Err(eyre!("{} --version exited with {}", interpreter.display(), output.status));
    }

    // Old interpreters print the version on stderr
    let text = if output.stdout.is_empty() { output.stderr } else { output.stdout };
    Ok(String::from_utf8(text)?.trim().to_string())
}
