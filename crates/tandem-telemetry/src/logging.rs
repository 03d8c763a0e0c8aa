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

//! `env_logger` bootstrap shared by binaries and tests.

use env_logger::{Builder, Env};

/// Initialises the global logger, honouring `RUST_LOG` when set.
///
/// `default_filter` applies when `RUST_LOG` is absent, e.g. `"info"` or
/// `"tandem_core=debug,info"`. Calling this twice is harmless; the second
/// call leaves the first logger in place.
pub fn init_logging(default_filter: &str) {
    if Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialised, keeping the existing one.");
    }
}

/// Initialises a logger whose output is captured by the test harness.
pub fn init_test_logging() {
    let _ = Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
