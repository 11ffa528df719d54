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

//! Core engine functionality for trace capture.
//!
//! This module ties the components together for one subject and input case.
//!
//! # Workflow Overview
//!
//! 1. **Detection**: Scan the line-numbered source for loop regions on a
//!    blocking worker
//! 2. **Execution**: Run the subject in the sandbox, concurrently with detection
//! 3. **Compression**: Collapse loop runs of the Trace Log into net effects
//! 4. **Encoding**: Serialize the compressed trace through the trace grammar
//! 5. **Reporting**: Judge the signal and record failures of abnormal runs
//!
//! # Key Components
//!
//! - [`EngineConfig`] - Engine configuration and settings
//! - [`Engine`] - Runs the workflow
//! - [`TraceReport`] - Serializable result of one run

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vtrace_common::types::{CompressedTrace, LoopRegions, TraceLog};

use crate::{
    compress::{compress, coverage},
    grammar::encode,
    loops::{detect_loops, number_lines},
    sandbox::{
        Deadline, RunContext, RunStatus, Sandbox, SandboxConfig, DEFAULT_INTERPRETER,
    },
    utils::record_failure,
};

/// Default maximum number of captured steps per run
pub const DEFAULT_STEP_BUDGET: usize = 3000;

/// Default wall-clock limit per run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the vtrace engine.
///
/// Contains settings that control sandbox execution and failure reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Interpreter executable running the companion harness
    pub interpreter: PathBuf,
    /// Maximum number of captured steps per run
    pub step_budget: usize,
    /// Wall-clock limit per run; `None` leaves cancellation to the caller
    pub timeout: Option<Duration>,
    /// Also trace functions defined inside the subject
    pub trace_nested_definitions: bool,
    /// Directory receiving failure records, if any
    pub error_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            step_budget: DEFAULT_STEP_BUDGET,
            timeout: Some(DEFAULT_TIMEOUT),
            trace_nested_definitions: false,
            error_dir: None,
        }
    }
}

impl EngineConfig {
    /// Set the interpreter executable
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Set the step budget
    pub fn with_step_budget(mut self, step_budget: usize) -> Self {
        self.step_budget = step_budget;
        self
    }

    /// Set the per-run wall-clock limit
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable tracing of functions defined in the subject
    pub fn with_trace_nested_definitions(mut self, enabled: bool) -> Self {
        self.trace_nested_definitions = enabled;
        self
    }

    /// Set the directory receiving failure records
    pub fn with_error_dir(mut self, error_dir: impl Into<PathBuf>) -> Self {
        self.error_dir = Some(error_dir.into());
        self
    }

    fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            interpreter: self.interpreter.clone(),
            step_budget: self.step_budget,
            trace_nested_definitions: self.trace_nested_definitions,
        }
    }
}

/// A program under trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Identifier used in reports and failure records
    pub name: String,
    /// Raw source text
    pub source: String,
    /// Line-numbered form of the source, when supplied upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numbered: Option<String>,
}

impl Subject {
    /// Create a subject from its raw source
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), source: source.into(), numbered: None }
    }

    /// Use upstream line-numbered text for loop detection
    pub fn with_numbered(mut self, numbered: impl Into<String>) -> Self {
        self.numbered = Some(numbered.into());
        self
    }

    /// Line-numbered text fed to the loop detector
    pub fn numbered_source(&self) -> String {
        self.numbered.clone().unwrap_or_else(|| number_lines(&self.source))
    }
}

/// Serializable summary of one traced run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceReport {
    /// Subject name
    pub subject: String,
    /// Input case index
    pub case: usize,
    /// Run category
    pub category: String,
    /// Terminal status of the sandbox run
    #[serde(flatten)]
    pub status: RunStatus,
    /// Number of recorded snapshots
    pub steps: usize,
    /// Encoded compressed trace
    pub trace: String,
    /// Executed lines in order
    pub coverage: Vec<usize>,
    /// Whether the trace carries at least one variable change
    pub has_signal: bool,
}

/// Everything produced for one run
#[derive(Debug, Clone)]
pub struct TraceArtifacts {
    /// The serializable report
    pub report: TraceReport,
    /// The raw Trace Log
    pub log: TraceLog,
    /// Loop regions the log was compressed against
    pub regions: LoopRegions,
    /// The compressed trace before encoding
    pub compressed: CompressedTrace,
}

/// The main Engine struct that traces subjects
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    sandbox: Sandbox,
}

impl Engine {
    /// Create a new Engine instance from configuration
    pub fn new(config: EngineConfig) -> Self {
        let sandbox = Sandbox::new(config.sandbox_config());
        Self { config, sandbox }
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Top-level context for a run; it owns the configured deadline
    pub fn context(&self, category: impl Into<String>, case_index: usize) -> RunContext {
        RunContext::new(category)
            .with_case(case_index)
            .with_deadline(Deadline::from(self.config.timeout))
    }

    /// Detect the loop regions of a subject on a blocking worker.
    ///
    /// Regions depend only on the source, so callers may reuse them across
    /// every input case of the subject.
    pub async fn detect(&self, subject: &Subject) -> LoopRegions {
        let numbered = subject.numbered_source();
        match tokio::task::spawn_blocking(move || detect_loops(&numbered)).await {
            Ok(regions) => regions,
            Err(error) => {
                warn!(subject = %subject.name, %error, "Loop detection task failed");
                LoopRegions::new()
            }
        }
    }

    /// Trace one input case of a subject and return its report
    pub async fn trace(&self, subject: &Subject, inputs: &[String], ctx: &RunContext) -> TraceReport {
        self.trace_detailed(subject, inputs, ctx).await.report
    }

    /// Trace one input case, running detection and execution concurrently
    pub async fn trace_detailed(
        &self,
        subject: &Subject,
        inputs: &[String],
        ctx: &RunContext,
    ) -> TraceArtifacts {
        let (regions, outcome) =
            tokio::join!(self.detect(subject), self.sandbox.run(&subject.source, inputs, ctx));
        self.assemble(subject, ctx, regions, outcome.log, outcome.status)
    }

    /// Trace one input case against previously detected regions
    pub async fn trace_with_regions(
        &self,
        subject: &Subject,
        regions: &LoopRegions,
        inputs: &[String],
        ctx: &RunContext,
    ) -> TraceArtifacts {
        let outcome = self.sandbox.run(&subject.source, inputs, ctx).await;
        self.assemble(subject, ctx, regions.clone(), outcome.log, outcome.status)
    }

    fn assemble(
        &self,
        subject: &Subject,
        ctx: &RunContext,
        regions: LoopRegions,
        log: TraceLog,
        status: RunStatus,
    ) -> TraceArtifacts {
        let compressed = compress(&log, &regions);

        for collision in compressed.separator_collisions() {
            warn!(
                subject = %subject.name,
                label = %collision.label,
                text = %collision.text,
                "Trace text contains a separator sequence and will not re-parse faithfully"
            );
        }

        let report = TraceReport {
            subject: subject.name.clone(),
            case: ctx.case_index,
            category: ctx.category.clone(),
            status,
            steps: log.len(),
            trace: encode(&compressed),
            coverage: coverage(&log),
            has_signal: compressed.has_signal(),
        };

        if report.status.is_completed() {
            debug!(subject = %subject.name, %ctx, steps = report.steps, "Traced subject");
        } else {
            info!(subject = %subject.name, %ctx, status = %report.status, "Run ended abnormally");
            self.record(subject, ctx, &report.status);
        }

        TraceArtifacts { report, log, regions, compressed }
    }

    fn record(&self, subject: &Subject, ctx: &RunContext, status: &RunStatus) {
        let Some(error_dir) = &self.config.error_dir else { return };
        if let Err(error) = record_failure(error_dir, ctx, &subject.name, status) {
            warn!(subject = %subject.name, %error, "Failed to record run failure");
        }
    }
}
