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

//! Adapters that let one dispatch loop drive either kind of handler.
//!
//! The loop only knows how to `wait` for the signal and how to `invoke` the
//! handler on a batch. [`Blocking`] parks its thread for both; [`Suspending`]
//! yields to the tokio scheduler for both.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::FailureKind;
use crate::handler::{AsyncBatchHandler, BatchHandler};
use crate::signal::WakeSignal;

#[async_trait]
pub(crate) trait Consumer<T: Send>: Send {
    /// Returns once the signal has been raised, consuming it.
    async fn wait(&mut self, signal: &WakeSignal);

    /// Runs the handler on `batch`, catching errors and panics.
    async fn invoke(&mut self, batch: &mut Vec<T>) -> Result<(), FailureKind>;
}

/// Runs a [`BatchHandler`] inline on the dispatch thread.
pub(crate) struct Blocking<T, H> {
    handler: H,
    _items: PhantomData<fn(&[T])>,
}

impl<T, H: BatchHandler<T>> Blocking<T, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _items: PhantomData,
        }
    }
}

#[async_trait]
impl<T, H> Consumer<T> for Blocking<T, H>
where
    T: Send + 'static,
    H: BatchHandler<T>,
{
    async fn wait(&mut self, signal: &WakeSignal) {
        signal.wait_blocking();
    }

    async fn invoke(&mut self, batch: &mut Vec<T>) -> Result<(), FailureKind> {
        let handler = &mut self.handler;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(batch.as_slice()))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FailureKind::Error(e)),
            Err(payload) => Err(FailureKind::from_panic(payload)),
        }
    }
}

/// Awaits an [`AsyncBatchHandler`] from the dispatch task.
pub(crate) struct Suspending<T, H> {
    handler: H,
    _items: PhantomData<fn(&[T])>,
}

impl<T: Send + Sync, H: AsyncBatchHandler<T>> Suspending<T, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _items: PhantomData,
        }
    }
}

#[async_trait]
impl<T, H> Consumer<T> for Suspending<T, H>
where
    T: Send + Sync + 'static,
    H: AsyncBatchHandler<T>,
{
    async fn wait(&mut self, signal: &WakeSignal) {
        signal.wait_async().await;
    }

    async fn invoke(&mut self, batch: &mut Vec<T>) -> Result<(), FailureKind> {
        let call = self.handler.handle(batch.as_slice());
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FailureKind::Error(e)),
            Err(payload) => Err(FailureKind::from_panic(payload)),
        }
    }
}
