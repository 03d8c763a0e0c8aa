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

//! Counters kept by a dispatcher.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time snapshot of a dispatcher's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Items accepted by `add` / `add_all`.
    pub items_added: u64,
    /// Items refused because the dispatcher was disposed.
    pub items_rejected: u64,
    /// Handler invocations, successful or not.
    pub batches_dispatched: u64,
    /// Items handed to the handler across all batches.
    pub items_dispatched: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_failures: u64,
    /// Size of the largest batch seen so far.
    pub largest_batch: u64,
}

impl DispatcherStats {
    /// Items accepted but not yet handed to the handler.
    pub fn backlog(&self) -> u64 {
        self.items_added.saturating_sub(self.items_dispatched)
    }

    /// Mean batch size, or `0.0` before the first batch.
    pub fn average_batch(&self) -> f64 {
        if self.batches_dispatched == 0 {
            0.0
        } else {
            self.items_dispatched as f64 / self.batches_dispatched as f64
        }
    }

    /// Counter growth since an earlier snapshot. `largest_batch` is carried over as is.
    pub fn since(&self, earlier: &DispatcherStats) -> DispatcherStats {
        DispatcherStats {
            items_added: self.items_added.saturating_sub(earlier.items_added),
            items_rejected: self.items_rejected.saturating_sub(earlier.items_rejected),
            batches_dispatched: self
                .batches_dispatched
                .saturating_sub(earlier.batches_dispatched),
            items_dispatched: self.items_dispatched.saturating_sub(earlier.items_dispatched),
            handler_failures: self.handler_failures.saturating_sub(earlier.handler_failures),
            largest_batch: self.largest_batch,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    items_added: AtomicU64,
    items_rejected: AtomicU64,
    batches_dispatched: AtomicU64,
    items_dispatched: AtomicU64,
    handler_failures: AtomicU64,
    largest_batch: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_added(&self, count: usize) {
        self.items_added.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self, count: usize) {
        self.items_rejected.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, len: usize) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.items_dispatched.fetch_add(len as u64, Ordering::Relaxed);
        self.largest_batch.fetch_max(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            items_added: self.items_added.load(Ordering::Relaxed),
            items_rejected: self.items_rejected.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            items_dispatched: self.items_dispatched.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            largest_batch: self.largest_batch.load(Ordering::Relaxed),
        }
    }
}
