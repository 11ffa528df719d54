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

//! Configuration file for the vtrace CLI
//!
//! Settings live in `~/.vtrace.toml` (or the file named by `VTRACE_CONFIG`).
//! Every field is optional; command-line flags take precedence over the file
//! and the file over built-in defaults.

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;
use vtrace_engine::{EngineConfig, DEFAULT_CATEGORY, DEFAULT_STEP_BUDGET, DEFAULT_TIMEOUT};

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "VTRACE_CONFIG";

/// Contents of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sandbox settings
    pub sandbox: SandboxSection,
    /// Batch settings
    pub batch: BatchSection,
}

/// `[sandbox]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    /// Interpreter executable
    pub interpreter: Option<String>,
    /// Maximum captured steps per run
    pub step_budget: Option<usize>,
    /// Wall-clock limit per run in seconds; 0 disables the timer
    pub timeout_secs: Option<u64>,
    /// Also trace functions defined inside the subject
    pub trace_nested_definitions: Option<bool>,
    /// Directory receiving failure records
    pub error_dir: Option<PathBuf>,
}

/// `[batch]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Concurrent sandbox runs
    pub workers: Option<usize>,
    /// Category for jobs that do not name one
    pub category: Option<String>,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home =
            dirs::home_dir().ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(".vtrace.toml"))
    }

    /// Load configuration from file, falling back to defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            debug!("Config file not found at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .wrap_err_with(|| format!("Failed to read config file: {config_path:?}"))?;

        let config: Self =
            toml::from_str(&content).wrap_err("Failed to parse config file as TOML")?;

        debug!("Loaded configuration from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;

        let content =
            toml::to_string_pretty(self).wrap_err("Failed to serialize config to TOML")?;

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("Failed to create {parent:?}"))?;
            }
        }
        fs::write(&config_path, content)
            .wrap_err_with(|| format!("Failed to write config file: {config_path:?}"))?;

        debug!("Saved configuration to {:?}", config_path);
        Ok(config_path)
    }

    /// Configuration with every built-in default spelled out
    pub fn documented_defaults() -> Self {
        Self {
            sandbox: SandboxSection {
                interpreter: Some(vtrace_engine::DEFAULT_INTERPRETER.to_string()),
                step_budget: Some(DEFAULT_STEP_BUDGET),
                timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
                trace_nested_definitions: Some(false),
                error_dir: None,
            },
            batch: BatchSection { workers: None, category: Some(DEFAULT_CATEGORY.to_string()) },
        }
    }

    /// Engine configuration from this file, before command-line overrides
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        let sandbox = &self.sandbox;

        if let Some(interpreter) = &sandbox.interpreter {
            config = config.with_interpreter(interpreter);
        }
        if let Some(step_budget) = sandbox.step_budget {
            config = config.with_step_budget(step_budget);
        }
        if let Some(secs) = sandbox.timeout_secs {
            config = config.with_timeout(timeout_from_secs(secs));
        }
        if let Some(enabled) = sandbox.trace_nested_definitions {
            config = config.with_trace_nested_definitions(enabled);
        }
        if let Some(error_dir) = &sandbox.error_dir {
            config = config.with_error_dir(error_dir);
        }
        config
    }
}

/// Seconds to an optional timer; zero means no timer
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
