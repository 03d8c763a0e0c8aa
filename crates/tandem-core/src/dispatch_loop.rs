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

//! The dispatch loop shared by both consumer modes.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::consumer::Consumer;
use crate::error::{FailureHook, HandlerFailure};
use crate::ingress::Ingress;
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::signal::WakeSignal;
use crate::stats::StatsCounters;

/// State shared between the dispatcher handle and its dispatch loop.
#[derive(Debug)]
pub(crate) struct Shared<T> {
    pub(crate) name: String,
    pub(crate) ingress: Ingress<T>,
    pub(crate) signal: WakeSignal,
    pub(crate) lifecycle: LifecycleCell,
    pub(crate) stats: StatsCounters,
    pub(crate) on_failure: FailureHook,
}

impl<T> Shared<T> {
    pub(crate) fn new(name: String, capacity: usize, on_failure: FailureHook) -> Self {
        Self {
            name,
            ingress: Ingress::with_capacity(capacity),
            signal: WakeSignal::new(),
            lifecycle: LifecycleCell::new(),
            stats: StatsCounters::default(),
            on_failure,
        }
    }
}

/// Runs until the ingress is closed and the final batch has been handled.
///
/// `work` is the second of the two containers. It must start out empty and is
/// handed back and forth with the ingress for the whole run.
pub(crate) async fn run<T, C>(shared: Arc<Shared<T>>, mut consumer: C, mut work: Vec<T>)
where
    T: Send,
    C: Consumer<T>,
{
    log::debug!("Dispatcher '{}' loop started.", shared.name);

    loop {
        consumer.wait(&shared.signal).await;

        let closed = shared.ingress.swap(&mut work);

        // A wake can find nothing to do, e.g. the disposal wake.
        if !work.is_empty() {
            dispatch(&shared, &mut consumer, &mut work).await;
            recycle(&shared.name, &mut work);
        }

        if closed {
            break;
        }
    }

    shared.lifecycle.advance(Lifecycle::Terminated);
    log::info!("Dispatcher '{}' terminated.", shared.name);
}

/// Drops the delivered items. A panicking `Drop` on an item is logged and the
/// loop carries on with an empty container.
fn recycle<T>(name: &str, work: &mut Vec<T>) {
    // `truncate` zeroes the length before dropping, so the container is empty
    // even when an item's destructor unwinds.
    if panic::catch_unwind(AssertUnwindSafe(|| work.clear())).is_err() {
        log::error!("Dispatcher '{}' item destructor panicked.", name);
    }
    debug_assert!(work.is_empty());
}

async fn dispatch<T, C>(shared: &Shared<T>, consumer: &mut C, work: &mut Vec<T>)
where
    T: Send,
    C: Consumer<T>,
{
    let batch_len = work.len();
    log::trace!(
        "Dispatcher '{}' handing over a batch of {} item(s).",
        shared.name,
        batch_len
    );

    let outcome = consumer.invoke(work).await;
    shared.stats.record_batch(batch_len);

    if let Err(kind) = outcome {
        shared.stats.record_failure();
        let failure = HandlerFailure {
            dispatcher: &shared.name,
            batch_len,
            kind,
        };
        let hook = &shared.on_failure;
        if panic::catch_unwind(AssertUnwindSafe(|| hook.report(&failure))).is_err() {
            log::error!("Dispatcher '{}' failure hook panicked.", shared.name);
        }
    }
}
