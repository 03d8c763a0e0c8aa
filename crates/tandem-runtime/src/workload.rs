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

//! Synthetic producers and handler used by the load driver.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tandem_core::{AsyncBatchHandler, BatchDispatcher, DispatcherConfig, DispatcherStats};
use tandem_telemetry::{ReporterConfig, StatsReporter, StatsSource};

use crate::config::RuntimeConfig;

/// Outcome of a load run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub dispatcher: String,
    pub produced: u64,
    pub elapsed_ms: u64,
    pub items_per_sec: f64,
    pub stats: DispatcherStats,
}

impl Summary {
    fn new(dispatcher: &str, produced: u64, elapsed: Duration, stats: DispatcherStats) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            dispatcher: dispatcher.to_string(),
            produced,
            elapsed_ms: elapsed.as_millis() as u64,
            items_per_sec: if secs > 0.0 { produced as f64 / secs } else { 0.0 },
            stats,
        }
    }

    /// Every produced item must have been handed to the handler exactly once.
    pub fn verify(&self) -> Result<()> {
        if self.stats.items_dispatched != self.produced {
            anyhow::bail!(
                "produced {} item(s) but {} were dispatched",
                self.produced,
                self.stats.items_dispatched
            );
        }
        Ok(())
    }
}

/// Shared bookkeeping of the simulated handler, independent of the mode.
#[derive(Debug)]
struct SimulatedSink {
    fail_every: Option<u64>,
    batches: u64,
    checksum: u64,
}

impl SimulatedSink {
    fn new(config: &RuntimeConfig) -> Self {
        Self {
            fail_every: config.fail_every.filter(|n| *n > 0),
            batches: 0,
            checksum: 0,
        }
    }

    fn consume(&mut self, batch: &[u64]) -> Result<()> {
        self.batches += 1;
        self.checksum = batch.iter().fold(self.checksum, |acc, v| acc.wrapping_add(*v));
        match self.fail_every {
            Some(n) if self.batches % n == 0 => {
                anyhow::bail!("simulated failure on batch #{}", self.batches)
            }
            _ => Ok(()),
        }
    }
}

struct AsyncSink {
    sink: SimulatedSink,
    delay: Duration,
}

#[async_trait]
impl AsyncBatchHandler<u64> for AsyncSink {
    async fn handle(&mut self, batch: &[u64]) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sink.consume(batch)
    }
}

fn dispatcher_config(config: &RuntimeConfig) -> DispatcherConfig {
    DispatcherConfig::named(config.name.clone()).with_capacity(config.capacity)
}

fn reporter_config(config: &RuntimeConfig) -> ReporterConfig {
    ReporterConfig {
        interval: config.report_interval(),
        format: config.report_format,
        ..Default::default()
    }
}

/// Item `seq` of producer `producer`, unique across the run.
fn item(config: &RuntimeConfig, producer: usize, seq: u64) -> u64 {
    producer as u64 * config.items_per_producer + seq
}

/// Runs producers on OS threads against a blocking dispatcher.
pub fn run_blocking(config: &RuntimeConfig) -> Result<Summary> {
    let mut sink = SimulatedSink::new(config);
    let delay = config.handler_delay();
    let handler = move |batch: &[u64]| -> Result<()> {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        sink.consume(batch)
    };

    let dispatcher = Arc::new(
        BatchDispatcher::with_config(dispatcher_config(config), handler)
            .context("Failed to start blocking dispatcher")?,
    );
    let source: Arc<dyn StatsSource> = dispatcher.clone();
    let mut reporter = StatsReporter::start(source, reporter_config(config))?;

    let started = Instant::now();
    let producers: Vec<_> = (0..config.producers)
        .map(|p| {
            let dispatcher = Arc::clone(&dispatcher);
            let config = config.clone();
            thread::spawn(move || -> Result<()> {
                for seq in 0..config.items_per_producer {
                    dispatcher.add(item(&config, p, seq))?;
                }
                Ok(())
            })
        })
        .collect();

    for producer in producers {
        producer
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))??;
    }
    log::info!("All producers finished, flushing.");

    dispatcher.dispose();
    dispatcher.wait_terminated();
    let elapsed = started.elapsed();
    reporter.stop();

    Ok(Summary::new(
        dispatcher.name(),
        config.total_items(),
        elapsed,
        dispatcher.stats(),
    ))
}

/// Runs producers as tokio tasks against a suspending dispatcher.
pub async fn run_async(config: &RuntimeConfig) -> Result<Summary> {
    let handler = AsyncSink {
        sink: SimulatedSink::new(config),
        delay: config.handler_delay(),
    };
    let dispatcher = Arc::new(
        BatchDispatcher::with_config_async(dispatcher_config(config), handler)
            .context("Failed to start async dispatcher")?,
    );
    let source: Arc<dyn StatsSource> = dispatcher.clone();
    let mut reporter = StatsReporter::start(source, reporter_config(config))?;

    let started = Instant::now();
    let producers: Vec<_> = (0..config.producers)
        .map(|p| {
            let dispatcher = Arc::clone(&dispatcher);
            let config = config.clone();
            tokio::spawn(async move {
                for seq in 0..config.items_per_producer {
                    dispatcher.add(item(&config, p, seq))?;
                    if seq % 1_000 == 999 {
                        tokio::task::yield_now().await;
                    }
                }
                Ok::<(), tandem_core::DispatchError>(())
            })
        })
        .collect();

    for producer in producers {
        producer.await.context("producer task failed")??;
    }
    log::info!("All producers finished, flushing.");

    dispatcher.dispose();
    dispatcher.terminated().await;
    let elapsed = started.elapsed();
    reporter.stop();

    Ok(Summary::new(
        dispatcher.name(),
        config.total_items(),
        elapsed,
        dispatcher.stats(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    fn small(mode: Mode) -> RuntimeConfig {
        RuntimeConfig {
            mode,
            producers: 3,
            items_per_producer: 500,
            handler_delay_ms: 0,
            report_interval_ms: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_sink_fails_every_nth_batch() {
        let mut sink = SimulatedSink::new(&RuntimeConfig {
            fail_every: Some(2),
            ..Default::default()
        });
        assert!(sink.consume(&[1, 2]).is_ok());
        assert!(sink.consume(&[3]).is_err());
        assert!(sink.consume(&[4]).is_ok());
        assert_eq!(sink.checksum, 10);
    }

    #[test]
    fn test_blocking_run_dispatches_everything() {
        let summary = run_blocking(&small(Mode::Blocking)).unwrap();
        assert_eq!(summary.produced, 1_500);
        summary.verify().unwrap();
        assert!(summary.stats.batches_dispatched >= 1);
    }

    #[test]
    fn test_failures_are_counted_not_fatal() {
        let config = RuntimeConfig {
            fail_every: Some(1),
            ..small(Mode::Blocking)
        };
        let summary = run_blocking(&config).unwrap();
        summary.verify().unwrap();
        assert_eq!(
            summary.stats.handler_failures,
            summary.stats.batches_dispatched
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_run_dispatches_everything() {
        let summary = run_async(&small(Mode::Async)).await.unwrap();
        summary.verify().unwrap();
    }
}
