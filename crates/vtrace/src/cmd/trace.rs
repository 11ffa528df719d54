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

//! Trace command

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use clap::Args;
use eyre::{bail, Result, WrapErr};
use serde::Serialize;
use serde_json::json;
use vtrace_engine::{
    Engine, EngineConfig, Subject, TraceAnnotation, TraceArtifacts, TraceReport, DEFAULT_CATEGORY,
};

use crate::utils::{read_input_lines, read_text, subject_name, write_json_lines};

/// Arguments of `vtrace trace`
#[derive(Debug, Args)]
pub struct TraceArgs {
    /// Python source file of the subject
    pub source: PathBuf,

    /// Input case file, one stdin line per line; repeat for more cases
    #[arg(short, long = "input")]
    pub inputs: Vec<PathBuf>,

    /// Expected output file of the matching input case; when given, each
    /// report also carries the source annotated with its trace
    #[arg(short, long = "expected")]
    pub expected: Vec<PathBuf>,

    /// Subject name used in reports (default: file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Run category used in reports and failure records
    #[arg(long, default_value = DEFAULT_CATEGORY)]
    pub category: String,

    /// Line-numbered form of the source to detect loops on
    #[arg(long)]
    pub numbered: Option<PathBuf>,

    /// Directory receiving the raw log and compressed trace of each case
    #[arg(long)]
    pub dump_log: Option<PathBuf>,
}

/// Trace every input case of one subject and print one report per line
pub async fn trace(args: &TraceArgs, config: EngineConfig) -> Result<()> {
    let name = args.name.clone().unwrap_or_else(|| subject_name(&args.source));
    let mut subject = Subject::new(name, read_text(Some(args.source.as_path()))?);
    if let Some(numbered) = &args.numbered {
        subject = subject.with_numbered(read_text(Some(numbered.as_path()))?);
    }

    // No input file means a single case with empty stdin
    let cases = if args.inputs.is_empty() {
        vec![Vec::new()]
    } else {
        args.inputs.iter().map(|path| read_input_lines(path)).collect::<Result<Vec<_>>>()?
    };

    let expected = if args.expected.is_empty() {
        None
    } else if args.expected.len() != cases.len() {
        bail!("Got {} expected output files for {} input cases", args.expected.len(), cases.len());
    } else {
        Some(
            args.expected
                .iter()
                .map(|path| {
                    fs::read_to_string(path)
                        .wrap_err_with(|| format!("Failed to read {}", path.display()))
                })
                .collect::<Result<Vec<_>>>()?,
        )
    };

    let engine = Engine::new(config);
    let regions = engine.detect(&subject).await;
    tracing::info!(subject = %subject.name, cases = cases.len(), regions = regions.len(), "Tracing subject");

    let mut reports = Vec::with_capacity(cases.len());
    for (index, inputs) in cases.iter().enumerate() {
        let ctx = engine.context(args.category.as_str(), index);
        let artifacts = engine.trace_with_regions(&subject, &regions, inputs, &ctx).await;

        if let Some(dir) = &args.dump_log {
            dump_artifacts(dir, &artifacts)?;
        }
        let record = expected.as_ref().map(|outputs| {
            TraceAnnotation::new(
                inputs.join("\n"),
                outputs[index].trim_end_matches(['\r', '\n']),
                artifacts.report.trace.as_str(),
            )
            .annotate(subject.source.trim_end())
        });
        reports.push(Reported { report: artifacts.report, record });
    }

    write_json_lines(&mut io::stdout().lock(), &reports)
}

/// A report line, optionally with the annotated record of its case
#[derive(Debug, Serialize)]
struct Reported {
    #[serde(flatten)]
    report: TraceReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<String>,
}

fn dump_artifacts(dir: &Path, artifacts: &TraceArtifacts) -> Result<()> {
    fs::create_dir_all(dir).wrap_err_with(|| format!("Failed to create {}", dir.display()))?;

    let report = &artifacts.report;
    let path = dir.join(format!("{}_{}.json", report.subject, report.case));
    let document = json!({
        "report": report,
        "regions": artifacts.regions,
        "log": artifacts.log,
        "compressed": artifacts.compressed,
    });

    fs::write(&path, serde_json::to_string_pretty(&document)?)
        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Dumped trace artifacts");
    Ok(())
}
