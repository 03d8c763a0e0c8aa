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

//! Error types for the dispatcher and the handler failure hook.

use std::fmt;
use std::sync::Arc;

/// Errors surfaced synchronously to callers of the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The dispatcher has been disposed and no longer accepts items.
    #[error("dispatcher has been disposed")]
    Disposed,
    /// The dedicated dispatch thread could not be spawned.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// An async dispatcher was built outside of a tokio runtime.
    #[error("async dispatcher requires a running tokio runtime")]
    NoRuntime,
}

/// How a handler invocation failed.
#[derive(Debug)]
pub enum FailureKind {
    /// The handler returned an error.
    Error(anyhow::Error),
    /// The handler panicked. Holds the panic message when it was a string.
    Panic(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error(e) => write!(f, "handler returned an error: {e:#}"),
            FailureKind::Panic(msg) => write!(f, "handler panicked: {msg}"),
        }
    }
}

impl FailureKind {
    /// Builds a [`FailureKind::Panic`] from a payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        FailureKind::Panic(msg)
    }
}

/// A failed handler invocation, as reported to the [`FailureHook`].
///
/// The batch itself is not included: it is recycled as soon as the hook
/// returns and is never re-delivered.
#[derive(Debug)]
pub struct HandlerFailure<'a> {
    /// Name of the dispatcher that ran the handler.
    pub dispatcher: &'a str,
    /// Number of items in the batch that failed.
    pub batch_len: usize,
    /// What went wrong.
    pub kind: FailureKind,
}

impl fmt::Display for HandlerFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dispatcher '{}' dropped a batch of {} item(s): {}",
            self.dispatcher, self.batch_len, self.kind
        )
    }
}

/// Callback invoked by the dispatch loop whenever the handler fails.
///
/// Failures never stop the loop. The default hook logs them at `warn` level.
#[derive(Clone)]
pub struct FailureHook(Arc<dyn Fn(&HandlerFailure<'_>) + Send + Sync>);

impl FailureHook {
    /// Wraps a closure as a failure hook.
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&HandlerFailure<'_>) + Send + Sync + 'static,
    {
        Self(Arc::new(hook))
    }

    /// A hook that discards failures without logging.
    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    pub(crate) fn report(&self, failure: &HandlerFailure<'_>) {
        (self.0)(failure)
    }
}

impl Default for FailureHook {
    fn default() -> Self {
        Self::new(|failure| log::warn!("{failure}"))
    }
}

impl fmt::Debug for FailureHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FailureHook")
    }
}
