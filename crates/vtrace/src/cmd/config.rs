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

//! Config command

use clap::Args;
use eyre::Result;
use vtrace_engine::{interpreter_version, EngineConfig};

use crate::config::Config;

/// Arguments of `vtrace config`
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write a configuration file with every default spelled out
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file when initializing
    #[arg(long, requires = "init")]
    pub force: bool,
}

/// Show the effective configuration or write a default file
pub fn config(args: &ConfigArgs, file: &Config, effective: &EngineConfig) -> Result<()> {
    let path = Config::config_path()?;

    if args.init {
        if path.exists() && !args.force {
            println!("Config file already exists at {} (use --force to overwrite)", path.display());
            return Ok(());
        }
        let written = Config::documented_defaults().save()?;
        println!("Wrote default configuration to {}", written.display());
        return Ok(());
    }

    println!("Config file: {}", path.display());
    if *file != Config::default() {
        println!("{}", toml::to_string_pretty(file)?);
    }

    println!("Interpreter: {}", effective.interpreter.display());
    match vtrace_engine::find_interpreter(&effective.interpreter.to_string_lossy())
        .and_then(|resolved| interpreter_version(&resolved))
    {
        Ok(version) => println!("Interpreter version: {version}"),
        Err(e) => println!("Interpreter unavailable: {e}"),
    }
    println!("Step budget: {}", effective.step_budget);
    match effective.timeout {
        Some(timeout) => println!("Timeout: {}s", timeout.as_secs()),
        None => println!("Timeout: disabled"),
    }
    println!("Trace nested definitions: {}", effective.trace_nested_definitions);
    if let Some(error_dir) = &effective.error_dir {
        println!("Error records: {}", error_dir.display());
    }
    Ok(())
}
