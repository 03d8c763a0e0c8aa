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

//! Producer-facing side of the double buffer.
//!
//! The ingress owns whichever container currently receives appends. The
//! dispatch loop owns the other one and trades it in with [`Ingress::swap`].
//! The `accepting` flag lives under the same lock so that every accepted item
//! is guaranteed to be ahead of the swap that observes the close.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::DispatchError;

#[derive(Debug)]
struct Slot<T> {
    input: Vec<T>,
    accepting: bool,
}

#[derive(Debug)]
pub(crate) struct Ingress<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Ingress<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slot: Mutex::new(Slot {
                input: Vec::with_capacity(capacity),
                accepting: true,
            }),
        }
    }

    // Only appends and swaps run under this lock; caller code never does,
    // so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, item: T) -> Result<(), DispatchError> {
        let mut slot = self.lock();
        if !slot.accepting {
            return Err(DispatchError::Disposed);
        }
        slot.input.push(item);
        Ok(())
    }

    /// Appends every item, or none of them if the ingress is closed.
    /// Returns how many items were appended.
    ///
    /// The iterator is drained before the lock is taken, so it may panic or
    /// push into this ingress itself without leaving a partial append behind.
    pub(crate) fn extend<I>(&self, items: I) -> Result<usize, DispatchError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut items: Vec<T> = items.into_iter().collect();
        let mut slot = self.lock();
        if !slot.accepting {
            return Err(DispatchError::Disposed);
        }
        let count = items.len();
        slot.input.append(&mut items);
        Ok(count)
    }

    /// Exchanges the input container with `work`.
    ///
    /// `work` must be empty on entry. Returns `true` once the ingress is
    /// closed, meaning no item can follow the ones now in `work`.
    pub(crate) fn swap(&self, work: &mut Vec<T>) -> bool {
        debug_assert!(work.is_empty(), "work container must be recycled empty");
        let mut slot = self.lock();
        std::mem::swap(&mut slot.input, work);
        !slot.accepting
    }

    /// Stops accepting items. Returns `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        std::mem::replace(&mut self.lock().accepting, false)
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.lock().accepting
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().input.len()
    }
}
