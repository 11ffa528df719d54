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

//! vtrace - Loop-aware execution traces
//!
//! Runs Python programs in a sandbox, compresses their line-level traces
//! around loops and encodes them in a compact textual grammar.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;
use tracing::Level;
use vtrace_engine::EngineConfig;

mod cmd;
mod config;
mod utils;

use config::{timeout_from_secs, Config};

/// Command-line interface for vtrace
#[derive(Debug, Parser)]
#[command(name = "vtrace")]
#[command(about = "Loop-aware execution traces of Python programs")]
#[command(version)]
pub struct Cli {
    /// Python interpreter running the subjects
    #[arg(long, global = true, env = "VTRACE_PYTHON")]
    pub interpreter: Option<String>,

    /// Maximum number of captured steps per run
    #[arg(long, global = true)]
    pub step_budget: Option<usize>,

    /// Wall-clock limit per run in seconds (0 disables the timer)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Also trace functions defined inside the subject
    #[arg(long, global = true)]
    pub trace_nested: bool,

    /// Directory receiving failure records of abnormal runs
    #[arg(long, global = true)]
    pub error_dir: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: Level,

    /// Also write logs to a rotating file in the temporary directory
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Trace a program against one or more input cases
    Trace(cmd::TraceArgs),
    /// Print the loop regions of a program
    Loops(cmd::LoopsArgs),
    /// Compress a recorded trace log against a program's loops
    Compress(cmd::CompressArgs),
    /// Check encoded traces for parseability and signal
    Validate(cmd::ValidateArgs),
    /// Trace a JSON Lines file of jobs with a worker pool
    Batch(cmd::BatchArgs),
    /// Show or initialize the configuration file
    Config(cmd::ConfigArgs),
}

impl Cli {
    /// Engine configuration: command line over file over defaults
    pub fn engine_config(&self, file: &Config) -> EngineConfig {
        let mut config = file.engine_config();

        if let Some(interpreter) = &self.interpreter {
            config = config.with_interpreter(interpreter);
        }
        if let Some(step_budget) = self.step_budget {
            config = config.with_step_budget(step_budget);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(timeout_from_secs(secs));
        }
        if self.trace_nested {
            config = config.with_trace_nested_definitions(true);
        }
        if let Some(error_dir) = &self.error_dir {
            config = config.with_error_dir(error_dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    vtrace_common::logging::init_logging("vtrace", cli.log_level, cli.log_file)?;

    let file_config = Config::load()?;
    let engine_config = cli.engine_config(&file_config);
    tracing::debug!(?engine_config, "Resolved engine configuration");

    match &cli.command {
        Commands::Trace(args) => cmd::trace(args, engine_config).await,
        Commands::Loops(args) => cmd::loops(args),
        Commands::Compress(args) => cmd::compress(args),
        Commands::Validate(args) => cmd::validate(args),
        Commands::Batch(args) => cmd::batch(args, engine_config, &file_config).await,
        Commands::Config(args) => cmd::config(args, &file_config, &engine_config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_command_line_overrides_file() {
        let file: Config =
            toml::from_str("[sandbox]\nstep_budget = 10\ntimeout_secs = 5\n").unwrap();
        let cli = Cli::parse_from(["vtrace", "--step-budget", "20", "loops", "x.py"]);

        let config = cli.engine_config(&file);
        assert_eq!(config.step_budget, 20);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_timeout_disables_timer() {
        let cli = Cli::parse_from(["vtrace", "loops", "x.py", "--timeout", "0"]);
        assert_eq!(cli.engine_config(&Config::default()).timeout, None);
    }
}
