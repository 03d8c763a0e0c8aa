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

//! The public [`BatchDispatcher`] handle.

use std::fmt;
use std::sync::Arc;
use std::thread;

use crate::config::DispatcherConfig;
use crate::consumer::{Blocking, Suspending};
use crate::dispatch_loop::{self, Shared};
use crate::error::DispatchError;
use crate::handler::{AsyncBatchHandler, BatchHandler};
use crate::lifecycle::Lifecycle;
use crate::stats::DispatcherStats;

/// Which kind of worker drives the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// A dedicated OS thread that blocks while idle.
    Blocking,
    /// A tokio task that suspends while idle.
    Suspending,
}

enum Worker {
    Thread(thread::JoinHandle<()>),
    Task(tokio::task::JoinHandle<()>),
}

/// Collects items from any number of producers and hands them to a single
/// handler in batches.
///
/// Items added while the handler is busy accumulate and are delivered together
/// as the next batch. Batches preserve insertion order and are never empty.
/// At most one handler call is in flight at any time.
///
/// Dropping the dispatcher disposes it: items already added are still
/// delivered, but the drop does not wait for that to finish.
///
/// # Examples
///
/// ```
/// use tandem_core::BatchDispatcher;
///
/// let dispatcher = BatchDispatcher::new(|batch: &[u32]| -> anyhow::Result<()> {
///     println!("got {} item(s)", batch.len());
///     Ok(())
/// })?;
///
/// dispatcher.add(1)?;
/// dispatcher.add(2)?;
/// dispatcher.shutdown();
/// # Ok::<(), tandem_core::DispatchError>(())
/// ```
pub struct BatchDispatcher<T> {
    shared: Arc<Shared<T>>,
    mode: DispatchMode,
    worker: Option<Worker>,
}

impl<T: Send + 'static> BatchDispatcher<T> {
    /// Creates a dispatcher whose handler runs on a dedicated thread.
    pub fn new<H: BatchHandler<T>>(handler: H) -> Result<Self, DispatchError> {
        Self::with_config(DispatcherConfig::default(), handler)
    }

    /// Creates a blocking dispatcher with explicit configuration.
    pub fn with_config<H: BatchHandler<T>>(
        config: DispatcherConfig,
        handler: H,
    ) -> Result<Self, DispatchError> {
        let (shared, work) = Self::prepare(config);
        let consumer = Blocking::new(handler);

        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(shared.name.clone())
            .spawn(move || {
                futures::executor::block_on(dispatch_loop::run(loop_shared, consumer, work))
            })?;

        log::info!("Dispatcher '{}' started on a dedicated thread.", shared.name);
        Ok(Self {
            shared,
            mode: DispatchMode::Blocking,
            worker: Some(Worker::Thread(handle)),
        })
    }
}

impl<T: Send + Sync + 'static> BatchDispatcher<T> {
    /// Creates a dispatcher whose handler is awaited from a tokio task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new_async<H: AsyncBatchHandler<T>>(handler: H) -> Result<Self, DispatchError> {
        Self::with_config_async(DispatcherConfig::default(), handler)
    }

    /// Creates a suspending dispatcher with explicit configuration.
    pub fn with_config_async<H: AsyncBatchHandler<T>>(
        config: DispatcherConfig,
        handler: H,
    ) -> Result<Self, DispatchError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
        let (shared, work) = Self::prepare(config);
        let consumer = Suspending::new(handler);

        let handle = runtime.spawn(dispatch_loop::run(Arc::clone(&shared), consumer, work));

        log::info!("Dispatcher '{}' started as an async task.", shared.name);
        Ok(Self {
            shared,
            mode: DispatchMode::Suspending,
            worker: Some(Worker::Task(handle)),
        })
    }
}

impl<T: Send + 'static> BatchDispatcher<T> {
    fn prepare(config: DispatcherConfig) -> (Arc<Shared<T>>, Vec<T>) {
        let shared = Shared::new(config.name, config.initial_capacity, config.on_failure);
        (Arc::new(shared), Vec::with_capacity(config.initial_capacity))
    }

    /// Queues one item for the next batch.
    ///
    /// Never waits for the handler. Fails with [`DispatchError::Disposed`]
    /// once [`dispose`](Self::dispose) has been called.
    pub fn add(&self, item: T) -> Result<(), DispatchError> {
        match self.shared.ingress.push(item) {
            Ok(()) => {
                self.shared.stats.record_added(1);
                self.shared.signal.raise();
                Ok(())
            }
            Err(e) => {
                self.shared.stats.record_rejected(1);
                Err(e)
            }
        }
    }

    /// Queues several items under one lock acquisition.
    ///
    /// Either all items are queued, contiguously and in order, or none are.
    /// The iterator is drained before the lock is taken, so it may itself
    /// call [`add`](Self::add) on this dispatcher.
    pub fn add_all<I>(&self, items: I) -> Result<(), DispatchError>
    where
        I: IntoIterator<Item = T>,
    {
        match self.shared.ingress.extend(items) {
            Ok(0) => Ok(()),
            Ok(count) => {
                self.shared.stats.record_added(count);
                self.shared.signal.raise();
                Ok(())
            }
            Err(e) => {
                self.shared.stats.record_rejected(1);
                Err(e)
            }
        }
    }
}

impl<T> BatchDispatcher<T> {
    /// Requests termination.
    ///
    /// New items are refused from now on. Items added before this call are
    /// delivered in one final pass, after which the loop exits. Does not wait
    /// for that pass; see [`wait_terminated`](Self::wait_terminated).
    ///
    /// Returns `true` only for the call that actually initiated disposal.
    pub fn dispose(&self) -> bool {
        if !self.shared.ingress.close() {
            return false;
        }
        self.shared.lifecycle.advance(Lifecycle::Disposing);
        log::debug!("Dispatcher '{}' disposing.", self.shared.name);
        // Always wake the loop, even with nothing pending, so it sees the close.
        self.shared.signal.raise();
        true
    }

    /// Name given in the [`DispatcherConfig`].
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Which kind of worker runs the dispatch loop.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle.get()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        !self.shared.ingress.is_accepting()
    }

    /// Whether the dispatch loop has exited.
    pub fn is_terminated(&self) -> bool {
        self.lifecycle().is_terminated()
    }

    /// Items waiting for the next batch. Excludes a batch currently being handled.
    pub fn pending(&self) -> usize {
        self.shared.ingress.len()
    }

    /// Snapshot of the dispatcher's counters.
    pub fn stats(&self) -> DispatcherStats {
        self.shared.stats.snapshot()
    }

    /// Blocks the calling thread until the dispatch loop has exited.
    ///
    /// Only returns after [`dispose`](Self::dispose) has been called. Do not
    /// call this from a tokio worker that the loop itself may need; use
    /// [`terminated`](Self::terminated) there instead.
    pub fn wait_terminated(&self) {
        futures::executor::block_on(self.terminated());
    }

    /// Completes once the dispatch loop has exited.
    pub async fn terminated(&self) {
        self.shared.lifecycle.reached(Lifecycle::Terminated).await;
    }

    /// Disposes the dispatcher and blocks until the final batch was handled.
    pub fn shutdown(mut self) {
        self.dispose();
        match self.worker.take() {
            Some(Worker::Thread(handle)) => {
                if handle.join().is_err() {
                    log::error!("Dispatcher '{}' thread panicked.", self.shared.name);
                }
            }
            Some(Worker::Task(_)) | None => self.wait_terminated(),
        }
    }

    /// Disposes the dispatcher and waits until the final batch was handled.
    pub async fn shutdown_async(mut self) {
        self.dispose();
        match self.worker.take() {
            Some(Worker::Task(handle)) => {
                if let Err(e) = handle.await {
                    log::error!("Dispatcher '{}' task failed: {e}", self.shared.name);
                }
            }
            Some(Worker::Thread(_)) | None => self.terminated().await,
        }
    }
}

impl<T> Drop for BatchDispatcher<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> fmt::Debug for BatchDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("name", &self.shared.name)
            .field("mode", &self.mode)
            .field("lifecycle", &self.lifecycle())
            .field("pending", &self.pending())
            .finish()
    }
}
