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

//! Background thread that periodically logs dispatcher counters.

use crossbeam_channel::{RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tandem_core::{BatchDispatcher, DispatcherStats};

/// Anything that can be sampled by a [`StatsReporter`].
pub trait StatsSource: Send + Sync {
    /// Name used to tag reports.
    fn source_name(&self) -> &str;
    /// Current counters.
    fn snapshot(&self) -> DispatcherStats;
    /// Items waiting for the next batch.
    fn pending(&self) -> usize;
}

impl<T: Send + 'static> StatsSource for BatchDispatcher<T> {
    fn source_name(&self) -> &str {
        self.name()
    }

    fn snapshot(&self) -> DispatcherStats {
        self.stats()
    }

    fn pending(&self) -> usize {
        BatchDispatcher::pending(self)
    }
}

/// Output format of reporter log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// A short human-readable line.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Configuration for a [`StatsReporter`].
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Time between two reports.
    pub interval: Duration,
    /// How reports are rendered.
    pub format: ReportFormat,
    /// Skip reports for intervals in which nothing happened.
    pub skip_idle: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            format: ReportFormat::Text,
            skip_idle: true,
        }
    }
}

/// Counters for one reporting interval.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Name of the sampled dispatcher.
    pub dispatcher: String,
    /// Actual length of the interval, in milliseconds.
    pub interval_ms: u64,
    /// Counter growth during the interval.
    pub delta: DispatcherStats,
    /// Counter values at the end of the interval.
    pub totals: DispatcherStats,
    /// Items waiting at the end of the interval.
    pub pending: usize,
}

impl StatsReport {
    /// Builds a report from two consecutive snapshots.
    pub fn between(
        dispatcher: &str,
        previous: &DispatcherStats,
        current: DispatcherStats,
        pending: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            dispatcher: dispatcher.to_string(),
            interval_ms: elapsed.as_millis() as u64,
            delta: current.since(previous),
            totals: current,
            pending,
        }
    }

    /// Whether nothing was added or dispatched during the interval.
    pub fn is_idle(&self) -> bool {
        self.delta.items_added == 0 && self.delta.batches_dispatched == 0
    }

    /// Renders the report as a single line.
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => format!(
                "[{}] +{} added, +{} dispatched in {} batch(es) (avg {:.1}), +{} failure(s), {} pending",
                self.dispatcher,
                self.delta.items_added,
                self.delta.items_dispatched,
                self.delta.batches_dispatched,
                self.delta.average_batch(),
                self.delta.handler_failures,
                self.pending,
            ),
            ReportFormat::Json => serde_json::to_string(self)
                .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}")),
        }
    }
}

/// Periodically logs the counters of a [`StatsSource`] on a background thread.
///
/// A final report covering the last partial interval is logged on stop.
pub struct StatsReporter {
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StatsReporter {
    /// Starts reporting on a thread named after the source.
    pub fn start(source: Arc<dyn StatsSource>, config: ReporterConfig) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let thread_name = format!("{}-stats", source.source_name());

        let handle = thread::Builder::new().name(thread_name).spawn(move || {
            let mut previous = source.snapshot();
            let mut last = Instant::now();
            log::debug!("Stats reporter for '{}' started.", source.source_name());

            loop {
                let stopping = match stop_rx.recv_timeout(config.interval) {
                    Err(RecvTimeoutError::Timeout) => false,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                };

                let current = source.snapshot();
                let report = StatsReport::between(
                    source.source_name(),
                    &previous,
                    current,
                    source.pending(),
                    last.elapsed(),
                );
                if !(config.skip_idle && report.is_idle()) || stopping {
                    log::info!("{}", report.render(config.format));
                }
                previous = current;
                last = Instant::now();

                if stopping {
                    break;
                }
            }
            log::debug!("Stats reporter for '{}' stopped.", source.source_name());
        })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops the reporter thread after it logs a final report.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        samples: AtomicUsize,
    }

    impl StatsSource for FakeSource {
        fn source_name(&self) -> &str {
            "fake"
        }

        fn snapshot(&self) -> DispatcherStats {
            let n = self.samples.fetch_add(1, Ordering::SeqCst) as u64;
            DispatcherStats {
                items_added: n * 10,
                items_dispatched: n * 10,
                batches_dispatched: n,
                ..Default::default()
            }
        }

        fn pending(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_report_between_snapshots() {
        let previous = DispatcherStats {
            items_added: 4,
            items_dispatched: 4,
            batches_dispatched: 1,
            ..Default::default()
        };
        let current = DispatcherStats {
            items_added: 10,
            items_dispatched: 8,
            batches_dispatched: 3,
            largest_batch: 4,
            ..Default::default()
        };

        let report =
            StatsReport::between("ingest", &previous, current, 2, Duration::from_millis(250));
        assert_eq!(report.delta.items_added, 6);
        assert_eq!(report.delta.batches_dispatched, 2);
        assert_eq!(report.interval_ms, 250);
        assert!(!report.is_idle());

        let text = report.render(ReportFormat::Text);
        assert!(text.starts_with("[ingest] +6 added"));
        assert!(text.contains("2 pending"));

        let json: serde_json::Value =
            serde_json::from_str(&report.render(ReportFormat::Json)).unwrap();
        assert_eq!(json["dispatcher"], "ingest");
        assert_eq!(json["delta"]["items_dispatched"], 4);
    }

    #[test]
    fn test_idle_report_detection() {
        let stats = DispatcherStats::default();
        let report = StatsReport::between("idle", &stats, stats, 0, Duration::ZERO);
        assert!(report.is_idle());
    }

    #[test]
    fn test_reporter_samples_until_stopped() {
        crate::init_test_logging();
        let source = Arc::new(FakeSource {
            samples: AtomicUsize::new(0),
        });
        let mut reporter = StatsReporter::start(
            source.clone(),
            ReporterConfig {
                interval: Duration::from_millis(5),
                ..Default::default()
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        reporter.stop();
        let taken = source.samples.load(Ordering::SeqCst);
        assert!(taken >= 2, "expected periodic sampling, got {taken}");

        thread::sleep(Duration::from_millis(20));
        assert_eq!(
            source.samples.load(Ordering::SeqCst),
            taken,
            "no sampling after stop"
        );
    }

    #[test]
    fn test_report_format_deserializes_lowercase() {
        let format: ReportFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, ReportFormat::Json);
    }

    #[test]
    fn test_dispatcher_is_a_stats_source() {
        let dispatcher =
            BatchDispatcher::new(|_: &[u8]| -> anyhow::Result<()> { Ok(()) }).unwrap();
        dispatcher.add(1).unwrap();
        dispatcher.dispose();
        dispatcher.wait_terminated();

        let source: &dyn StatsSource = &dispatcher;
        assert_eq!(source.source_name(), "tandem-dispatcher");
        assert_eq!(source.snapshot().items_dispatched, 1);
        assert_eq!(source.pending(), 0);
    }
}
