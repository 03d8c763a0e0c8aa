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

//! The coalescing wake signal between producers and the dispatch loop.
//!
//! Behaves like a binary semaphore capped at one: raising an already raised
//! signal is a no-op, and a waiter consumes the signal exactly once. Blocking
//! waiters park on a condvar; async waiters suspend on a tokio `Notify`.

use std::sync::{Condvar, Mutex, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct WakeSignal {
    raised: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets the signal and wakes the waiter, if any.
    pub(crate) fn raise(&self) {
        *self.raised.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.condvar.notify_one();
        // Stores at most one permit when nobody is waiting yet.
        self.notify.notify_one();
    }

    /// Clears the signal, returning whether it was set.
    pub(crate) fn try_take(&self) -> bool {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *raised, false)
    }

    /// Parks the calling thread until the signal is set, then clears it.
    pub(crate) fn wait_blocking(&self) {
        let guard = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        let mut raised = self
            .condvar
            .wait_while(guard, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *raised = false;
    }

    /// Suspends the calling task until the signal is set, then clears it.
    pub(crate) async fn wait_async(&self) {
        loop {
            if self.try_take() {
                return;
            }
            // A raise between `try_take` and here leaves a permit behind,
            // so this cannot miss it. A stale permit only costs one extra spin.
            self.notify.notified().await;
        }
    }
}
