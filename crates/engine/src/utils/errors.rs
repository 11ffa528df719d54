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

//! Failure records for runs that did not complete.
//!
//! Each abnormal run appends one line to `<error_dir>/<category>/<subject>.txt`.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Component, Path, PathBuf},
};

use eyre::{Result, WrapErr};
use tracing::{debug, warn};

use crate::sandbox::{RunContext, RunStatus};

/// Sanitize a path to prevent directory traversal attacks
pub fn sanitize_path(path: &Path) -> PathBuf {
    let mut sanitized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(name) => {
                sanitized.push(name);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                warn!("Skipping parent directory component in path: {:?}", path);
            }
            Component::RootDir => {
                warn!("Skipping root directory component in path: {:?}", path);
            }
            Component::Prefix(_) => {
                warn!("Skipping prefix component in path: {:?}", path);
            }
        }
    }

    if sanitized.as_os_str().is_empty() {
        sanitized.push("unnamed");
    }

    sanitized
}

/// Location of the failure record for `subject` under `category`
pub fn failure_record_path(error_dir: &Path, category: &str, subject: &str) -> PathBuf {
    let mut file = sanitize_path(Path::new(subject)).into_os_string();
    file.push(".txt");
    error_dir.join(sanitize_path(Path::new(category))).join(file)
}

/// Append a failure line for one run and return the record path
pub fn record_failure(
    error_dir: &Path,
    ctx: &RunContext,
    subject: &str,
    status: &RunStatus,
) -> Result<PathBuf> {
    let path = failure_record_path(error_dir, &ctx.category, subject);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{subject} case {} : {status}", ctx.case_index)
        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;

    debug!(path = %path.display(), %status, "Recorded run failure");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(sanitize_path(Path::new("../../etc/passwd")), PathBuf::from("etc/passwd"));
        assert_eq!(sanitize_path(Path::new("/abs/name")), PathBuf::from("abs/name"));
        assert_eq!(sanitize_path(Path::new("..")), PathBuf::from("unnamed"));
    }

    #[test]
    fn test_failure_record_layout() {
        let path = failure_record_path(Path::new("/errors"), "hard", "p001_3");
        assert_eq!(path, PathBuf::from("/errors/hard/p001_3.txt"));
    }

    #[test]
    fn test_records_append() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new("easy").with_case(1);

        record_failure(dir.path(), &ctx, "s1", &RunStatus::TimedOut).unwrap();
        let path = record_failure(
            dir.path(),
            &ctx.clone().with_case(2),
            "s1",
            &RunStatus::GuestError("EOFError: EOF when reading a line".to_string()),
        )
        .unwrap();

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "s1 case 1 : timed_out");
        assert_eq!(lines[1], "s1 case 2 : guest_error: EOFError: EOF when reading a line");
    }
}
