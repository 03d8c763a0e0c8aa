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

//! # Tandem Core
//!
//! A double-buffered batching dispatcher. Any number of producers push items
//! into a [`BatchDispatcher`] while a single handler drains them in batches,
//! one batch at a time, on a dedicated worker thread or on a tokio task.
//!
//! Producers never wait for the handler: an `add` only holds the ingress lock
//! long enough to append. The dispatch loop swaps the input container with its
//! own work container and hands the work container to the handler with no lock
//! held, so new items pile up in the other container while a batch is processed.

#![warn(missing_docs)]

pub mod config;
mod consumer;
mod dispatch_loop;
pub mod dispatcher;
pub mod error;
pub mod handler;
mod ingress;
pub mod lifecycle;
mod signal;
pub mod stats;

pub use config::DispatcherConfig;
pub use dispatcher::{BatchDispatcher, DispatchMode};
pub use error::{DispatchError, FailureHook, FailureKind, HandlerFailure};
pub use handler::{AsyncBatchHandler, BatchHandler};
pub use lifecycle::Lifecycle;
pub use stats::DispatcherStats;
