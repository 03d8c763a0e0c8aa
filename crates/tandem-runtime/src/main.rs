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

//! Load driver for tandem dispatchers.
//!
//! Spawns synthetic producers against a blocking or async dispatcher, logs
//! periodic stats and prints a JSON summary once everything has been flushed.

mod config;
mod workload;

use anyhow::Result;
use clap::Parser;

use config::{Cli, Mode};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve()?;
    tandem_telemetry::init_logging(&config.log_filter);

    log::info!(
        "Running {} producer(s) x {} item(s) against a {:?} dispatcher.",
        config.producers,
        config.items_per_producer,
        config.mode
    );

    let summary = match config.mode {
        Mode::Blocking => workload::run_blocking(&config)?,
        Mode::Async => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(workload::run_async(&config))?
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    summary.verify()
}
