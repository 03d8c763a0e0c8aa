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

//! User-facing batch handler traits.
//!
//! A handler only ever borrows a batch. The storage behind the slice is
//! cleared and reused once the call returns.

use async_trait::async_trait;

/// A blocking batch consumer, driven from a dedicated dispatch thread.
///
/// Implemented for any `FnMut(&[T]) -> anyhow::Result<()>` closure.
pub trait BatchHandler<T>: Send + 'static {
    /// Processes one non-empty batch.
    fn handle(&mut self, batch: &[T]) -> anyhow::Result<()>;
}

impl<T, F> BatchHandler<T> for F
where
    F: FnMut(&[T]) -> anyhow::Result<()> + Send + 'static,
{
    fn handle(&mut self, batch: &[T]) -> anyhow::Result<()> {
        self(batch)
    }
}

/// A suspending batch consumer, driven from a tokio task.
///
/// The dispatch loop awaits each call before recycling the batch, so at most
/// one `handle` future exists at a time.
#[async_trait]
pub trait AsyncBatchHandler<T: Send + Sync>: Send + 'static {
    /// Processes one non-empty batch.
    async fn handle(&mut self, batch: &[T]) -> anyhow::Result<()>;
}
