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

//! Batch command

use std::{fs, io, path::PathBuf};

use clap::Args;
use eyre::{Result, WrapErr};
use vtrace_engine::{run_batch, BatchOptions, Engine, EngineConfig, TraceJob};

use crate::{
    config::Config,
    utils::{read_text, write_json_lines},
};

/// Arguments of `vtrace batch`
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// JSON Lines file of jobs, or `-` for stdin
    pub jobs: Option<PathBuf>,

    /// Write reports here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of concurrent sandbox runs
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Parse one job per non-blank line
fn parse_jobs(text: &str, default_category: Option<&str>) -> Result<Vec<TraceJob>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let mut job: TraceJob = serde_json::from_str(line)
                .wrap_err_with(|| format!("Invalid job on line {}", index + 1))?;
            if job.category.is_none() {
                job.category = default_category.map(str::to_string);
            }
            Ok(job)
        })
        .collect()
}

/// Trace every job and write one report per line
pub async fn batch(args: &BatchArgs, config: EngineConfig, file: &Config) -> Result<()> {
    let jobs = parse_jobs(&read_text(args.jobs.as_deref())?, file.batch.category.as_deref())?;

    let mut options = BatchOptions { show_progress: !args.no_progress, ..Default::default() };
    if let Some(workers) = args.workers.or(file.batch.workers) {
        options.workers = workers;
    }

    let engine = Engine::new(config);
    let reports = run_batch(&engine, jobs, options).await?;

    match &args.output {
        Some(path) => {
            let mut out = fs::File::create(path)
                .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
            write_json_lines(&mut out, &reports)?;
            tracing::info!(reports = reports.len(), path = %path.display(), "Wrote batch reports");
        }
        None => write_json_lines(&mut io::stdout().lock(), &reports)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jobs_applies_default_category() {
        let text = r#"{"name": "a", "source": "x = 1"}

{"name": "b", "source": "y = 2", "category": "hard", "case": 1}
"#;
        let jobs = parse_jobs(text, Some("easy")).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].category.as_deref(), Some("easy"));
        assert_eq!(jobs[1].category.as_deref(), Some("hard"));
        assert_eq!(jobs[1].case, 1);
    }

    #[test]
    fn test_parse_jobs_reports_line() {
        let error = parse_jobs("{\"name\": \"a\", \"source\": \"x\"}\nnot json\n", None).unwrap_err();
        assert!(error.to_string().contains("line 2"));
    }
}
