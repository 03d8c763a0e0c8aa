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

//! Construction-time settings for a [`BatchDispatcher`](crate::BatchDispatcher).

use crate::error::{FailureHook, HandlerFailure};

/// Configuration for a batch dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Name used in logs and, for blocking dispatchers, as the worker thread name.
    pub name: String,
    /// Capacity reserved up front in each of the two item containers.
    ///
    /// The containers are reused for the lifetime of the dispatcher, so sizing
    /// this to a typical batch avoids growth in the steady state.
    pub initial_capacity: usize,
    /// Called whenever the handler returns an error or panics.
    pub on_failure: FailureHook,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "tandem-dispatcher".to_string(),
            initial_capacity: 64,
            on_failure: FailureHook::default(),
        }
    }
}

impl DispatcherConfig {
    /// Creates a default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the capacity reserved in each container.
    pub fn with_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Replaces the failure hook.
    pub fn with_failure_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HandlerFailure<'_>) + Send + Sync + 'static,
    {
        self.on_failure = FailureHook::new(hook);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = DispatcherConfig::named("audit-log").with_capacity(512);
        assert_eq!(config.name, "audit-log");
        assert_eq!(config.initial_capacity, 512);

        let default = DispatcherConfig::default();
        assert_eq!(default.name, "tandem-dispatcher");
        assert_eq!(default.initial_capacity, 64);
    }
}
