// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration: JSON file defaults overridden by CLI flags.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tandem_telemetry::ReportFormat;

/// Which consumer mode the dispatcher runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Handler runs on a dedicated thread.
    Blocking,
    /// Handler is awaited from a tokio task.
    Async,
}

/// Full set of knobs for a load run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub name: String,
    pub mode: Mode,
    pub producers: usize,
    pub items_per_producer: u64,
    pub capacity: usize,
    /// Simulated handler latency per batch.
    pub handler_delay_ms: u64,
    /// Make every n-th batch fail. `None` or `0` disables failures.
    pub fail_every: Option<u64>,
    pub report_interval_ms: u64,
    pub report_format: ReportFormat,
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: "tandem-load".to_string(),
            mode: Mode::Blocking,
            producers: 4,
            items_per_producer: 10_000,
            capacity: 1024,
            handler_delay_ms: 1,
            fail_every: None,
            report_interval_ms: 500,
            report_format: ReportFormat::Text,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Reads a configuration file. Missing fields take their default value.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn handler_delay(&self) -> Duration {
        Duration::from_millis(self.handler_delay_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn total_items(&self) -> u64 {
        self.producers as u64 * self.items_per_producer
    }

    pub fn validate(&self) -> Result<()> {
        if self.producers == 0 {
            anyhow::bail!("'producers' must be at least 1");
        }
        if self.report_interval_ms == 0 {
            anyhow::bail!("'report_interval_ms' must be positive");
        }
        Ok(())
    }
}

/// Command line of the `tandem-runtime` binary.
#[derive(Debug, Parser)]
#[command(name = "tandem-runtime", version, about = "Drive a tandem batch dispatcher with synthetic load")]
pub struct Cli {
    /// JSON configuration file; flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Consumer mode.
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Number of concurrent producers.
    #[arg(short, long)]
    pub producers: Option<usize>,

    /// Items each producer adds.
    #[arg(short = 'n', long)]
    pub items: Option<u64>,

    /// Simulated handler latency per batch, in milliseconds.
    #[arg(long)]
    pub handler_delay_ms: Option<u64>,

    /// Make every n-th batch fail.
    #[arg(long)]
    pub fail_every: Option<u64>,

    /// Interval between stats reports, in milliseconds.
    #[arg(long)]
    pub report_interval_ms: Option<u64>,

    /// Emit stats reports as JSON lines.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Merges the optional config file with the flags given on the command line.
    pub fn resolve(&self) -> Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::from_file(path)?,
            None => RuntimeConfig::default(),
        };

        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(producers) = self.producers {
            config.producers = producers;
        }
        if let Some(items) = self.items {
            config.items_per_producer = items;
        }
        if let Some(delay) = self.handler_delay_ms {
            config.handler_delay_ms = delay;
        }
        if let Some(every) = self.fail_every {
            config.fail_every = Some(every);
        }
        if let Some(interval) = self.report_interval_ms {
            config.report_interval_ms = interval;
        }
        if self.json {
            config.report_format = ReportFormat::Json;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "mode": "async", "producers": 2 }}"#).unwrap();

        let config = RuntimeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Async);
        assert_eq!(config.producers, 2);
        assert_eq!(config.items_per_producer, 10_000);
        assert_eq!(config.total_items(), 20_000);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "producer": 2 }}"#).unwrap();
        assert!(RuntimeConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "producers": 2, "handler_delay_ms": 7 }}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from([
            "tandem-runtime",
            "--config",
            &path,
            "--producers",
            "6",
            "--mode",
            "async",
            "--json",
        ]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.producers, 6);
        assert_eq!(config.handler_delay_ms, 7);
        assert_eq!(config.mode, Mode::Async);
        assert_eq!(config.report_format, ReportFormat::Json);
    }

    #[test]
    fn test_zero_producers_is_invalid() {
        let cli = Cli::parse_from(["tandem-runtime", "-p", "0"]);
        assert!(cli.resolve().is_err());
    }
}
