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

//! Bounded worker pool fanning out one sandbox run per (subject, case).

use std::{collections::HashMap, sync::Arc};

use eyre::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use vtrace_common::types::LoopRegions;

use crate::{sandbox::DEFAULT_CATEGORY, Engine, Subject, TraceReport};

/// One unit of batch work: a subject and one of its input cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceJob {
    /// Program under trace
    #[serde(flatten)]
    pub subject: Subject,
    /// Raw input lines of the case
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Input case index
    #[serde(default)]
    pub case: usize,
    /// Run category; defaults to [`DEFAULT_CATEGORY`]
    #[serde(default)]
    pub category: Option<String>,
}

/// Knobs of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum number of concurrent sandbox runs
    pub workers: usize,
    /// Draw a progress bar on the terminal
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map(usize::from).unwrap_or(4),
            show_progress: false,
        }
    }
}

/// Regions detected once per distinct source and shared by its cases
#[derive(Debug, Default)]
struct RegionCache {
    inner: Mutex<HashMap<String, Arc<LoopRegions>>>,
}

impl RegionCache {
    async fn get_or_detect(&self, engine: &Engine, subject: &Subject) -> Arc<LoopRegions> {
        let key = subject.numbered_source();
        if let Some(regions) = self.inner.lock().await.get(&key) {
            return regions.clone();
        }

        // Detection may race for the same source; both results are identical
        let regions = Arc::new(engine.detect(subject).await);
        self.inner.lock().await.entry(key).or_insert(regions).clone()
    }
}

/// Run every job with at most `options.workers` concurrent sandboxes.
///
/// Each job gets its own top-level context, so every run owns its deadline.
/// Reports come back in completion order.
pub async fn run_batch(
    engine: &Engine,
    jobs: Vec<TraceJob>,
    options: BatchOptions,
) -> Result<Vec<TraceReport>> {
    let total = jobs.len();
    let workers = options.workers.max(1);
    info!(total, workers, "Starting trace batch");

    let progress = if options.show_progress {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} Tracing [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}",
            )?
            .progress_chars("=> ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        Some(bar)
    } else {
        None
    };

    let cache = RegionCache::default();
    let reports: Vec<TraceReport> = stream::iter(jobs)
        .map(|job| {
            let cache = &cache;
            let progress = progress.as_ref();
            async move {
                let category = job.category.as_deref().unwrap_or(DEFAULT_CATEGORY);
                let ctx = engine.context(category, job.case);
                let regions = cache.get_or_detect(engine, &job.subject).await;

                let report = engine
                    .trace_with_regions(&job.subject, &regions, &job.inputs, &ctx)
                    .await
                    .report;

                if let Some(bar) = progress {
                    bar.set_message(format!("{} #{}", report.subject, report.case));
                    bar.inc(1);
                }
                debug!(subject = %report.subject, case = report.case, status = %report.status, "Job finished");
                report
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    if let Some(bar) = progress {
        bar.finish_with_message("done");
    }

    let completed = reports.iter().filter(|report| report.status.is_completed()).count();
    info!(total, completed, "Trace batch finished");
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineConfig;

    #[test]
    fn test_job_wire_format() {
        let job: TraceJob = serde_json::from_str(
            r#"{"name": "p1_0", "source": "print(input())", "inputs": ["7"], "case": 2, "category": "hard"}"#,
        )
        .unwrap();

        assert_eq!(job.subject.name, "p1_0");
        assert_eq!(job.subject.source, "print(input())");
        assert_eq!(job.subject.numbered, None);
        assert_eq!(job.inputs, vec!["7".to_string()]);
        assert_eq!(job.case, 2);
        assert_eq!(job.category.as_deref(), Some("hard"));
    }

    #[test]
    fn test_job_defaults() {
        let job: TraceJob = serde_json::from_str(r#"{"name": "s", "source": "x = 1"}"#).unwrap();
        assert!(job.inputs.is_empty());
        assert_eq!(job.case, 0);
        assert_eq!(job.category, None);
    }

    #[tokio::test]
    async fn test_unrunnable_jobs_still_report() {
        let engine =
            Engine::new(EngineConfig::default().with_interpreter("/nonexistent/vtrace-python"));
        let jobs = (0..3)
            .map(|case| TraceJob {
                subject: Subject::new("s", "for i in range(2):\n    x = i"),
                inputs: Vec::new(),
                case,
                category: None,
            })
            .collect();

        let reports =
            run_batch(&engine, jobs, BatchOptions { workers: 2, show_progress: false }).await.unwrap();

        assert_eq!(reports.len(), 3);
        let mut cases: Vec<usize> = reports.iter().map(|report| report.case).collect();
        cases.sort_unstable();
        assert_eq!(cases, vec![0, 1, 2]);
        assert!(reports.iter().all(|report| report.trace == "[]" && !report.has_signal));
        assert!(reports.iter().all(|report| report.category == DEFAULT_CATEGORY));
    }
}
