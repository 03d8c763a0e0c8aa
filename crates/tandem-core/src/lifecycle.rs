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

//! Lifecycle state of a dispatcher.

use serde::Serialize;
use tokio::sync::watch;

/// The lifecycle of a dispatcher. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Lifecycle {
    /// Accepting items and dispatching batches.
    Running,
    /// Disposal was requested; the final flush may still be in progress.
    Disposing,
    /// The dispatch loop has exited. No further handler calls will happen.
    Terminated,
}

impl Lifecycle {
    /// Returns `true` for [`Lifecycle::Terminated`].
    pub fn is_terminated(self) -> bool {
        self == Lifecycle::Terminated
    }
}

/// Monotonic, observable holder for a [`Lifecycle`].
#[derive(Debug)]
pub(crate) struct LifecycleCell {
    tx: watch::Sender<Lifecycle>,
}

impl LifecycleCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(Lifecycle::Running);
        Self { tx }
    }

    pub(crate) fn get(&self) -> Lifecycle {
        *self.tx.borrow()
    }

    /// Moves to `next` unless the state is already at or past it.
    pub(crate) fn advance(&self, next: Lifecycle) -> bool {
        self.tx.send_if_modified(|state| {
            if *state < next {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    pub(crate) async fn reached(&self, target: Lifecycle) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| *state >= target).await;
    }
}
