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

//! Test utilities for integration tests

use std::{path::PathBuf, time::Duration};

use vtrace_engine::{Engine, EngineConfig, Subject};

/// Initialization utilities for tests
pub mod init {
    /// Initialize logging for a test
    pub fn init_test_environment() {
        vtrace_common::logging::ensure_test_logging(None);
    }
}

/// Interpreter available on this machine, or `None` to skip the test.
///
/// `VTRACE_PYTHON` takes precedence over the default candidates.
pub fn python_or_skip() -> Option<PathBuf> {
    init::init_test_environment();

    let found = match std::env::var("VTRACE_PYTHON") {
        Ok(name) => vtrace_engine::find_interpreter(&name),
        Err(_) => vtrace_engine::find_default_interpreter(),
    };
    match found {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("Skipping test, no Python interpreter: {e}");
            None
        }
    }
}

/// Engine settings used by the end-to-end tests
pub fn test_config(interpreter: PathBuf) -> EngineConfig {
    EngineConfig::default()
        .with_interpreter(interpreter)
        .with_timeout(Some(Duration::from_secs(20)))
}

/// Engine running subjects on `interpreter`
pub fn test_engine(interpreter: PathBuf) -> Engine {
    Engine::new(test_config(interpreter))
}

/// Subject from inline source lines
pub fn subject(name: &str, lines: &[&str]) -> Subject {
    Subject::new(name, lines.join("\n"))
}

/// Input lines of a case
pub fn inputs(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}
